//! epochgate core data models.
//!
//! Shared types for the schedule, gate, dispatcher and ledger crates: the
//! worker configuration, the narrow chain response schema, eligibility state
//! and the submission attempt record.

#![warn(missing_docs)]

// Identities
mod id;

// Configuration
mod config;
mod error;

// Chain interaction
mod response;
mod eligibility;
mod attempt;

// Re-exports
pub use id::AttemptId;
pub use config::{
    WorkerConfig, ScheduleSettings, ChainConfig, WorkerSettings, TimeoutSettings,
    LedgerSettings, AddressSourceKind,
};
pub use error::ConfigError;
pub use response::{ChainResponse, extract_json, find_bool, find_i64, find_string, value_as_i64};
pub use eligibility::EligibilityStatus;
pub use attempt::{SubmissionAttempt, TransportTier, SubmitOutcome, status};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;

/// Identifier of a topic on the chain.
pub type TopicId = u64;

/// Per-epoch submission slot on the chain.
pub type Nonce = i64;
