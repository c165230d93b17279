//! Submission ledger.
//!
//! Append-only CSV record of every submission attempt. The column layout is
//! fixed; monitoring and audit tools read rows by position.

#![warn(missing_docs)]

pub mod trait_;
pub mod record;
pub mod csv_ledger;

pub use trait_::{Ledger, LedgerError, Result};
pub use record::{LedgerRow, LedgerSummary, LEDGER_COLUMNS};
pub use csv_ledger::CsvLedger;
