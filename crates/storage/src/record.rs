//! Ledger row schema.

use chrono::SecondsFormat;
use epochgate_core::{Nonce, SubmissionAttempt, TopicId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column names, in file order. Changing this is a breaking change for every
/// ledger consumer.
pub const LEDGER_COLUMNS: [&str; 12] = [
    "timestamp",
    "topic_id",
    "value",
    "wallet",
    "nonce",
    "tx_hash",
    "success",
    "exit_code",
    "status",
    "log10_loss",
    "score",
    "reward",
];

/// One ledger row. Field order matches [`LEDGER_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// UTC, ISO-8601, second precision
    pub timestamp: String,
    /// Topic id
    pub topic_id: TopicId,
    /// Submitted value
    pub value: f64,
    /// Wallet reference
    pub wallet: String,
    /// Nonce used, empty when none was resolved
    pub nonce: Option<Nonce>,
    /// Transaction hash, empty on failure
    pub tx_hash: Option<String>,
    /// Accepted by the chain
    pub success: bool,
    /// Exit / process code
    pub exit_code: i32,
    /// Status string
    pub status: String,
    /// Filled by later reconciliation
    pub log10_loss: Option<f64>,
    /// Filled by later reconciliation
    pub score: Option<f64>,
    /// Filled by later reconciliation
    pub reward: Option<f64>,
}

impl LedgerRow {
    /// Project an attempt onto the ledger schema.
    pub fn from_attempt(attempt: &SubmissionAttempt) -> Self {
        Self {
            timestamp: attempt.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            topic_id: attempt.topic_id,
            value: attempt.value,
            wallet: attempt.wallet.clone(),
            nonce: attempt.nonce,
            tx_hash: attempt.tx_hash.clone(),
            success: attempt.success,
            exit_code: attempt.exit_code,
            status: attempt.status.clone(),
            log10_loss: attempt.log10_loss,
            score: attempt.score,
            reward: attempt.reward,
        }
    }
}

/// Aggregate view over a ledger, for audit output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// Total rows
    pub attempts: usize,
    /// Rows with `success = true`
    pub successes: usize,
    /// Failed rows grouped by status
    pub failures_by_status: BTreeMap<String, usize>,
    /// Most recent successful transaction hash
    pub last_tx_hash: Option<String>,
    /// Timestamp of the last row
    pub last_timestamp: Option<String>,
}

impl LedgerSummary {
    /// Summarize rows in file order.
    pub fn from_rows(rows: &[LedgerRow]) -> Self {
        let mut summary = Self::default();
        for row in rows {
            summary.attempts += 1;
            if row.success {
                summary.successes += 1;
                summary.last_tx_hash = row.tx_hash.clone();
            } else {
                *summary.failures_by_status.entry(status_class(&row.status)).or_insert(0) += 1;
            }
            summary.last_timestamp = Some(row.timestamp.clone());
        }
        summary
    }
}

// Detail after the first ':' (chain log, transport error) is not grouped on.
fn status_class(status: &str) -> String {
    status.split_once(':').map_or(status, |(head, _)| head).to_string()
}
