//! Ledger trait abstraction.

use crate::record::LedgerRow;
use async_trait::async_trait;
use epochgate_core::SubmissionAttempt;

/// Error type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding/decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Existing file has a different header
    #[error("ledger header mismatch: found [{}]", .found.join(","))]
    SchemaMismatch {
        /// Header found in the file
        found: Vec<String>,
    },
}

/// Append-only store of submission attempts.
///
/// Rows are never edited once written. A single sequential writer is
/// assumed.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append one finalized attempt.
    async fn append(&self, attempt: &SubmissionAttempt) -> Result<()>;

    /// Read every row, validating the header first.
    async fn read_all(&self) -> Result<Vec<LedgerRow>>;
}
