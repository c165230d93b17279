//! Submission eligibility, derived fresh on every gate check.

use crate::Nonce;
use serde::{Deserialize, Serialize};

/// Result of one gate check. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityStatus {
    /// The chain client capability was found
    pub cli_found: bool,

    /// Topic active flag, `None` when unknown
    pub topic_active: Option<bool>,

    /// Worker has an unfulfilled nonce, `None` when unknown
    pub worker_has_nonce: Option<bool>,

    /// Nonce reported by the worker-nonce query
    pub latest_nonce: Option<Nonce>,

    /// Full unfulfilled nonce list (informational)
    pub unfulfilled_nonces: Option<Vec<Nonce>>,

    /// One entry per failed query
    pub errors: Vec<String>,
}

impl EligibilityStatus {
    /// Conjunctive gate: every sub-result must be known and positive.
    pub fn ok_to_submit(&self) -> bool {
        self.cli_found
            && self.topic_active == Some(true)
            && self.worker_has_nonce == Some(true)
            && self.latest_nonce.map_or(true, |n| n >= 0)
    }

    /// Short reason for a closed gate, for logs and CLI output.
    pub fn blocking_reason(&self) -> Option<String> {
        if self.ok_to_submit() {
            return None;
        }
        let reason = if !self.cli_found {
            "chain client not found".to_string()
        } else if self.topic_active != Some(true) {
            format!("topic active = {}", tri_state(self.topic_active))
        } else if self.worker_has_nonce != Some(true) {
            format!("worker has unfulfilled nonce = {}", tri_state(self.worker_has_nonce))
        } else {
            format!("negative nonce {:?}", self.latest_nonce)
        };
        Some(reason)
    }
}

fn tri_state(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "unknown",
    }
}
