//! Submission attempt model.

use crate::id::AttemptId;
use crate::{Nonce, Time, TopicId};
use chrono::SubsecRound;
use serde::{Deserialize, Serialize};

/// One transport strategy in the dispatcher's fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportTier {
    /// In-process chain client
    Native,
    /// Chain client subprocess
    Cli,
    /// HTTP call against the REST endpoint
    Rest,
}

impl TransportTier {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportTier::Native => "native",
            TransportTier::Cli => "cli",
            TransportTier::Rest => "rest",
        }
    }
}

impl std::fmt::Display for TransportTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status strings written to the ledger.
pub mod status {
    /// Accepted by the chain
    pub const SUCCESS: &str = "success";
    /// Chain answered without a transaction hash
    pub const NO_TXHASH: &str = "no_txhash";
    /// No nonce could be resolved; no tier was invoked
    pub const NO_NONCE: &str = "no unfulfilled nonces available";
    /// Every tier failed at the transport level
    pub const ALL_TIERS_FAILED: &str = "all transport tiers failed";
    /// The caller's deadline expired before a tier answered
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
    /// The value is NaN or infinite; no tier was invoked
    pub const INVALID_VALUE: &str = "invalid_value";

    /// Status for an explicit chain rejection.
    pub fn rejected(code: i64, raw_log: Option<&str>) -> String {
        match raw_log {
            Some(log) if !log.is_empty() => format!("rejected(code={}): {}", code, log),
            _ => format!("rejected(code={})", code),
        }
    }
}

/// A single dispatch call, from start to its one ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    /// Log correlation id
    pub id: AttemptId,

    /// Creation time, second precision
    pub timestamp: Time,

    /// Topic submitted to
    pub topic_id: TopicId,

    /// Submitted value
    pub value: f64,

    /// Wallet reference
    pub wallet: String,

    /// Nonce used, once resolved
    pub nonce: Option<Nonce>,

    /// Tier that produced the final answer
    pub tier: Option<TransportTier>,

    /// Transaction hash
    pub tx_hash: Option<String>,

    /// Accepted by the chain
    pub success: bool,

    /// Process exit code (CLI), HTTP status (REST), response code (native), -1 when no tier answered
    pub exit_code: i32,

    /// Human-readable status
    pub status: String,

    /// Filled by later reconciliation
    pub log10_loss: Option<f64>,

    /// Filled by later reconciliation
    pub score: Option<f64>,

    /// Filled by later reconciliation
    pub reward: Option<f64>,
}

impl SubmissionAttempt {
    /// Open an attempt at dispatch start.
    pub fn start(topic_id: TopicId, value: f64, wallet: impl Into<String>, nonce: Option<Nonce>) -> Self {
        Self {
            id: AttemptId::new(),
            timestamp: chrono::Utc::now().trunc_subsecs(0),
            topic_id,
            value,
            wallet: wallet.into(),
            nonce,
            tier: None,
            tx_hash: None,
            success: false,
            exit_code: -1,
            status: String::new(),
            log10_loss: None,
            score: None,
            reward: None,
        }
    }

    /// Close the attempt with the dispatcher's final answer.
    pub fn finalize(
        mut self,
        tier: Option<TransportTier>,
        tx_hash: Option<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        self.success = message == status::SUCCESS && tx_hash.is_some();
        self.tier = tier;
        self.tx_hash = tx_hash;
        self.exit_code = exit_code;
        self.status = message;
        self
    }
}

/// What `submit` hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Accepted by the chain
    pub success: bool,

    /// Transaction hash
    pub tx_hash: Option<String>,

    /// Ledger status string
    pub status: String,

    /// Tier that produced the answer
    pub tier: Option<TransportTier>,

    /// Nonce used
    pub nonce: Option<Nonce>,

    /// Set when the ledger row could not be written
    pub ledger_error: Option<String>,
}

impl SubmitOutcome {
    /// Build from a finalized attempt.
    pub fn from_attempt(attempt: &SubmissionAttempt) -> Self {
        Self {
            success: attempt.success,
            tx_hash: attempt.tx_hash.clone(),
            status: attempt.status.clone(),
            tier: attempt.tier,
            nonce: attempt.nonce,
            ledger_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_truncates_to_seconds() {
        let attempt = SubmissionAttempt::start(67, 0.25, "worker1", None);
        assert_eq!(attempt.timestamp.timestamp_subsec_nanos(), 0);
        assert_eq!(attempt.exit_code, -1);
        assert!(!attempt.success);
    }

    #[test]
    fn test_finalize_success_needs_hash() {
        let attempt = SubmissionAttempt::start(67, 0.25, "worker1", Some(10))
            .finalize(Some(TransportTier::Cli), Some("ABC".into()), 0, status::SUCCESS);
        assert!(attempt.success);

        let attempt = SubmissionAttempt::start(67, 0.25, "worker1", Some(10))
            .finalize(Some(TransportTier::Cli), None, 0, status::NO_TXHASH);
        assert!(!attempt.success);
    }

    #[test]
    fn test_rejected_status() {
        assert_eq!(status::rejected(5, None), "rejected(code=5)");
        assert_eq!(status::rejected(11, Some("out of gas")), "rejected(code=11): out of gas");
    }

    #[test]
    fn test_tier_serde_names() {
        let json = serde_json::to_string(&TransportTier::Rest).unwrap();
        assert_eq!(json, "\"rest\"");
        assert_eq!(TransportTier::Native.to_string(), "native");
    }
}
