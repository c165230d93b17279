//! Window gate.

use epochgate_core::{EligibilityStatus, TopicId};
use epochgate_tools::ChainQuery;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stateless gate over a chain query capability.
#[derive(Clone)]
pub struct WindowGate {
    query: Arc<dyn ChainQuery>,
    client_name: String,
}

impl WindowGate {
    /// Create a gate. `client_name` only appears in error messages.
    pub fn new(query: Arc<dyn ChainQuery>, client_name: impl Into<String>) -> Self {
        Self {
            query,
            client_name: client_name.into(),
        }
    }

    /// Probe chain state for `worker` on `topic_id`.
    ///
    /// Runs the capability probe, then the topic-active, worker-nonce and
    /// unfulfilled-nonce queries in that order. A missing capability returns
    /// immediately. Any single query failure is recorded in `errors` and
    /// leaves its field unknown; the remaining queries still run.
    pub async fn check_eligibility(&self, topic_id: TopicId, worker: &str) -> EligibilityStatus {
        let mut status = EligibilityStatus::default();

        if !self.query.is_available().await {
            warn!("Chain client {} not available", self.client_name);
            status.errors.push(format!("{} not found", self.client_name));
            return status;
        }
        status.cli_found = true;

        match self.query.topic_active(topic_id).await {
            Ok(active) => status.topic_active = active,
            Err(e) => status.errors.push(format!("topic-active query failed: {}", e)),
        }

        match self.query.worker_nonce(topic_id, worker).await {
            Ok(probe) => {
                status.worker_has_nonce = probe.has_nonce;
                status.latest_nonce = probe.nonce;
            }
            Err(e) => status.errors.push(format!("worker-nonce query failed: {}", e)),
        }

        // Informational; a failure here does not affect the decision.
        match self.query.unfulfilled_nonces(topic_id).await {
            Ok(nonces) => status.unfulfilled_nonces = Some(nonces),
            Err(e) => status.errors.push(format!("unfulfilled-nonces query failed: {}", e)),
        }

        debug!("Eligibility for {} on topic {}: {:?}", worker, topic_id, status);
        match status.blocking_reason() {
            None => info!("Submission window open on topic {} (nonce {:?})", topic_id, status.latest_nonce),
            Some(reason) => info!(
                "Submission window closed on topic {}: {} ({} errors)",
                topic_id,
                reason,
                status.errors.len()
            ),
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use epochgate_core::Nonce;
    use epochgate_tools::{Coin, NonceProbe, QueryError, ToolError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockChain {
        missing: bool,
        active: Option<Result<Option<bool>, ()>>,
        probe: Option<Result<NonceProbe, ()>>,
        nonces: Option<Result<Vec<Nonce>, ()>>,
        calls: AtomicUsize,
    }

    fn failure() -> QueryError {
        QueryError::Tool(ToolError::Timeout(Duration::from_secs(15)))
    }

    #[async_trait]
    impl ChainQuery for MockChain {
        async fn is_available(&self) -> bool {
            !self.missing
        }

        async fn topic_active(&self, _topic_id: TopicId) -> Result<Option<bool>, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.active.clone().unwrap_or(Ok(None)).map_err(|_| failure())
        }

        async fn worker_nonce(&self, _topic_id: TopicId, _worker: &str) -> Result<NonceProbe, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.probe.unwrap_or(Ok(NonceProbe::default())).map_err(|_| failure())
        }

        async fn unfulfilled_nonces(&self, _topic_id: TopicId) -> Result<Vec<Nonce>, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.nonces.clone().unwrap_or(Ok(vec![])).map_err(|_| failure())
        }

        async fn epoch_last_ended(&self, _topic_id: TopicId) -> Result<Option<Nonce>, QueryError> {
            Ok(None)
        }

        async fn balance(&self, _address: &str) -> Result<Vec<Coin>, QueryError> {
            Ok(vec![])
        }
    }

    fn open_chain() -> MockChain {
        MockChain {
            active: Some(Ok(Some(true))),
            probe: Some(Ok(NonceProbe { has_nonce: Some(true), nonce: Some(4320) })),
            nonces: Some(Ok(vec![4320])),
            ..Default::default()
        }
    }

    fn gate(chain: MockChain) -> (WindowGate, Arc<MockChain>) {
        let chain = Arc::new(chain);
        (WindowGate::new(chain.clone(), "allorad"), chain)
    }

    #[tokio::test]
    async fn test_open_window() {
        let (gate, _) = gate(open_chain());
        let status = gate.check_eligibility(67, "allo1w").await;
        assert!(status.ok_to_submit());
        assert_eq!(status.latest_nonce, Some(4320));
        assert_eq!(status.unfulfilled_nonces, Some(vec![4320]));
        assert!(status.errors.is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_short_circuits() {
        let (gate, chain) = gate(MockChain { missing: true, ..open_chain() });
        let status = gate.check_eligibility(67, "allo1w").await;

        assert!(!status.cli_found);
        assert!(!status.ok_to_submit());
        assert_eq!(status.errors, vec!["allorad not found".to_string()]);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_query_leaves_unknown_and_continues() {
        let (gate, chain) = gate(MockChain { active: Some(Err(())), ..open_chain() });
        let status = gate.check_eligibility(67, "allo1w").await;

        assert_eq!(status.topic_active, None);
        assert_eq!(status.worker_has_nonce, Some(true));
        assert_eq!(status.errors.len(), 1);
        assert!(status.errors[0].starts_with("topic-active query failed"));
        assert!(!status.ok_to_submit());
        assert_eq!(chain.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_nonce_list_failure_does_not_block() {
        let (gate, _) = gate(MockChain { nonces: Some(Err(())), ..open_chain() });
        let status = gate.check_eligibility(67, "allo1w").await;

        assert_eq!(status.unfulfilled_nonces, None);
        assert_eq!(status.errors.len(), 1);
        assert!(status.ok_to_submit());
    }

    #[tokio::test]
    async fn test_inactive_topic_blocks() {
        let (gate, _) = gate(MockChain { active: Some(Ok(Some(false))), ..open_chain() });
        let status = gate.check_eligibility(67, "allo1w").await;
        assert!(status.errors.is_empty());
        assert!(!status.ok_to_submit());
    }

    #[tokio::test]
    async fn test_worker_without_nonce_blocks() {
        let probe = NonceProbe { has_nonce: Some(false), nonce: None };
        let (gate, _) = gate(MockChain { probe: Some(Ok(probe)), ..open_chain() });
        assert!(!gate.check_eligibility(67, "allo1w").await.ok_to_submit());
    }
}
