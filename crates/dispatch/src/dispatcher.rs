//! Tier fallback chain.
//!
//! One `submit` call is one attempt: resolve the nonce, walk the tiers in
//! order until one gets an answer from the chain, then append exactly one
//! ledger row. Transport failures fall through; chain answers are final.

use crate::nonce::resolve_nonce;
use crate::transport::{SubmitRequest, TierResponse, Transport, TransportError};
use epochgate_core::{status, Nonce, SubmissionAttempt, SubmitOutcome, TopicId, TransportTier};
use epochgate_storage::Ledger;
use epochgate_tools::ChainQuery;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Submission dispatcher.
pub struct Dispatcher {
    query: Arc<dyn ChainQuery>,
    ledger: Arc<dyn Ledger>,
    tiers: Vec<Arc<dyn Transport>>,
    in_flight: Mutex<()>,
}

impl Dispatcher {
    /// Create a dispatcher with no tiers.
    pub fn new(query: Arc<dyn ChainQuery>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            query,
            ledger,
            tiers: Vec::new(),
            in_flight: Mutex::new(()),
        }
    }

    /// Append a tier to the fallback chain.
    pub fn with_tier(mut self, tier: Arc<dyn Transport>) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Configured tiers, in order.
    pub fn tiers(&self) -> Vec<TransportTier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    /// Submit one value.
    pub async fn submit(&self, topic_id: TopicId, value: f64, wallet: &str, nonce: Option<Nonce>) -> SubmitOutcome {
        self.submit_before(topic_id, value, wallet, nonce, None).await
    }

    /// Submit one value, giving up once `deadline` passes.
    ///
    /// Calls on the same dispatcher are serialized. The ledger row is written
    /// even when the deadline cut the attempt short.
    pub async fn submit_before(
        &self,
        topic_id: TopicId,
        value: f64,
        wallet: &str,
        nonce: Option<Nonce>,
        deadline: Option<Instant>,
    ) -> SubmitOutcome {
        let _guard = self.in_flight.lock().await;

        let attempt = SubmissionAttempt::start(topic_id, value, wallet, nonce);
        info!("[{}] Submitting {} to topic {} as {}", attempt.id, value, topic_id, wallet);

        let attempt = self.attempt(attempt, deadline).await;

        if attempt.success {
            info!(
                "[{}] Accepted via {}: {}",
                attempt.id,
                attempt.tier.map_or("-", |t| t.as_str()),
                attempt.tx_hash.as_deref().unwrap_or_default()
            );
        } else {
            warn!("[{}] Not accepted: {}", attempt.id, attempt.status);
        }

        let mut outcome = SubmitOutcome::from_attempt(&attempt);
        if let Err(e) = self.ledger.append(&attempt).await {
            error!("[{}] Failed to record attempt in ledger: {}", attempt.id, e);
            outcome.ledger_error = Some(e.to_string());
        }
        outcome
    }

    async fn attempt(&self, mut attempt: SubmissionAttempt, deadline: Option<Instant>) -> SubmissionAttempt {
        if !attempt.value.is_finite() {
            return attempt.finalize(None, None, -1, status::INVALID_VALUE);
        }

        let nonce = match attempt.nonce {
            Some(nonce) => nonce,
            None => match bounded(deadline, resolve_nonce(self.query.as_ref(), attempt.topic_id)).await {
                Some(Some(nonce)) => nonce,
                Some(None) => return attempt.finalize(None, None, -1, status::NO_NONCE),
                None => return attempt.finalize(None, None, -1, status::DEADLINE_EXCEEDED),
            },
        };
        attempt.nonce = Some(nonce);

        let request = SubmitRequest {
            topic_id: attempt.topic_id,
            nonce,
            value: attempt.value,
            wallet: attempt.wallet.clone(),
        };

        let mut last_error: Option<TransportError> = None;
        let mut last_exit_code = -1;

        for tier in &self.tiers {
            debug!("[{}] Trying {} tier (nonce {})", attempt.id, tier.tier(), nonce);

            let result = match bounded(deadline, tier.submit(&request)).await {
                Some(result) => result,
                None => {
                    warn!("[{}] Deadline passed during {} tier", attempt.id, tier.tier());
                    return attempt.finalize(Some(tier.tier()), None, last_exit_code, status::DEADLINE_EXCEEDED);
                }
            };

            match result {
                Ok(answer) => return Self::conclude(attempt, tier.tier(), answer),
                Err(e) => {
                    warn!("[{}] {} tier failed: {}", attempt.id, tier.tier(), e);
                    last_exit_code = match &e {
                        TransportError::Process { code, .. } => *code,
                        TransportError::Http { status, .. } => i32::from(*status),
                        _ => last_exit_code,
                    };
                    last_error = Some(e);
                }
            }
        }

        let message = match last_error {
            Some(e) => format!("{}: {}", status::ALL_TIERS_FAILED, e),
            None => format!("{}: no tiers configured", status::ALL_TIERS_FAILED),
        };
        attempt.finalize(None, None, last_exit_code, message)
    }

    fn conclude(attempt: SubmissionAttempt, tier: TransportTier, answer: TierResponse) -> SubmissionAttempt {
        let TierResponse { exit_code, response } = answer;

        if response.txhash.is_none() {
            return attempt.finalize(Some(tier), None, exit_code, status::NO_TXHASH);
        }
        let message = match response.accepted() {
            true => status::SUCCESS.to_string(),
            false => status::rejected(response.code.unwrap_or_default(), response.raw_log.as_deref()),
        };
        attempt.finalize(Some(tier), response.txhash, exit_code, message)
    }
}

/// Run `fut` until `deadline`. `None` means the deadline won.
async fn bounded<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
