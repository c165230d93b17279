//! Transport tier abstraction.

use async_trait::async_trait;
use epochgate_core::{ChainResponse, Nonce, TopicId, TransportTier};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What every tier delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Topic id
    pub topic_id: TopicId,
    /// Resolved nonce
    pub nonce: Nonce,
    /// Value to submit
    pub value: f64,
    /// Signing wallet reference
    pub wallet: String,
}

/// A tier reached the chain and got an answer back.
///
/// The answer may still be a rejection; the dispatcher decides.
#[derive(Debug, Clone, PartialEq)]
pub struct TierResponse {
    /// Tier-specific exit code
    pub exit_code: i32,
    /// Parsed chain answer
    pub response: ChainResponse,
}

/// A tier failed before the chain answered. The dispatcher falls through
/// to the next tier.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The tier's client or endpoint is not configured or not installed
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// No answer in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Subprocess exited non-zero without a chain answer
    #[error("exit code {code}: {stderr}")]
    Process {
        /// Exit code
        code: i32,
        /// Trimmed standard error
        stderr: String,
    },

    /// HTTP status outside 2xx
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Output did not contain a chain answer
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// One way of delivering a worker payload.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which tier this is.
    fn tier(&self) -> TransportTier;

    /// Deliver the payload once.
    async fn submit(&self, request: &SubmitRequest) -> Result<TierResponse, TransportError>;
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
