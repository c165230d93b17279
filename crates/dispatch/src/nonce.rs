//! Nonce resolution.

use epochgate_core::{Nonce, TopicId};
use epochgate_tools::ChainQuery;
use tracing::{debug, warn};

/// Pick the nonce to submit against.
///
/// The topic's last-ended epoch marker wins when positive; otherwise the
/// first open worker nonce. `None` when neither query yields one.
pub async fn resolve_nonce(query: &dyn ChainQuery, topic_id: TopicId) -> Option<Nonce> {
    match query.epoch_last_ended(topic_id).await {
        Ok(Some(nonce)) if nonce > 0 => {
            debug!("Using epoch marker {} for topic {}", nonce, topic_id);
            return Some(nonce);
        }
        Ok(_) => {}
        Err(e) => warn!("Epoch marker query failed for topic {}: {}", topic_id, e),
    }

    match query.unfulfilled_nonces(topic_id).await {
        Ok(nonces) => {
            let first = nonces.first().copied();
            if let Some(nonce) = first {
                debug!("Using unfulfilled nonce {} for topic {}", nonce, topic_id);
            }
            first
        }
        Err(e) => {
            warn!("Unfulfilled nonce query failed for topic {}: {}", topic_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use epochgate_tools::{Coin, NonceProbe, QueryError};

    struct Chain {
        epoch: Result<Option<Nonce>, ()>,
        open: Result<Vec<Nonce>, ()>,
    }

    fn failed() -> QueryError {
        QueryError::Parse("boom".into())
    }

    #[async_trait]
    impl ChainQuery for Chain {
        async fn is_available(&self) -> bool {
            true
        }

        async fn topic_active(&self, _topic_id: TopicId) -> Result<Option<bool>, QueryError> {
            Ok(Some(true))
        }

        async fn worker_nonce(&self, _topic_id: TopicId, _worker: &str) -> Result<NonceProbe, QueryError> {
            Ok(NonceProbe::default())
        }

        async fn unfulfilled_nonces(&self, _topic_id: TopicId) -> Result<Vec<Nonce>, QueryError> {
            self.open.clone().map_err(|_| failed())
        }

        async fn epoch_last_ended(&self, _topic_id: TopicId) -> Result<Option<Nonce>, QueryError> {
            self.epoch.map_err(|_| failed())
        }

        async fn balance(&self, _address: &str) -> Result<Vec<Coin>, QueryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_epoch_marker_wins() {
        let chain = Chain { epoch: Ok(Some(4320)), open: Ok(vec![4200]) };
        assert_eq!(resolve_nonce(&chain, 67).await, Some(4320));
    }

    #[tokio::test]
    async fn test_zero_marker_falls_back_to_open_nonce() {
        let chain = Chain { epoch: Ok(Some(0)), open: Ok(vec![4200, 4260]) };
        assert_eq!(resolve_nonce(&chain, 67).await, Some(4200));
    }

    #[tokio::test]
    async fn test_failed_marker_falls_back() {
        let chain = Chain { epoch: Err(()), open: Ok(vec![17]) };
        assert_eq!(resolve_nonce(&chain, 67).await, Some(17));
    }

    #[tokio::test]
    async fn test_nothing_available() {
        let chain = Chain { epoch: Ok(None), open: Ok(Vec::new()) };
        assert_eq!(resolve_nonce(&chain, 67).await, None);

        let chain = Chain { epoch: Err(()), open: Err(()) };
        assert_eq!(resolve_nonce(&chain, 67).await, None);
    }
}
