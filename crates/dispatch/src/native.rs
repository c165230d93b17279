//! Native client tier.

use crate::transport::{SubmitRequest, TierResponse, Transport, TransportError};
use async_trait::async_trait;
use epochgate_core::{ChainResponse, TransportTier};
use std::sync::Arc;
use std::time::Duration;

/// An in-process chain client supplied by the embedding application.
#[async_trait]
pub trait NativeClient: Send + Sync {
    /// Address of the signing key, when the client can tell.
    fn address(&self) -> Option<String>;

    /// Broadcast an insert-worker-payload transaction.
    async fn insert_worker_payload(&self, request: &SubmitRequest) -> Result<ChainResponse, TransportError>;
}

/// Wraps a [`NativeClient`] with the tier timeout.
pub struct NativeTransport {
    client: Arc<dyn NativeClient>,
    timeout: Duration,
}

impl NativeTransport {
    /// Create the tier.
    pub fn new(client: Arc<dyn NativeClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    fn tier(&self) -> TransportTier {
        TransportTier::Native
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<TierResponse, TransportError> {
        let response = tokio::time::timeout(self.timeout, self.client.insert_worker_payload(request))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;

        if response.code.is_none() && response.txhash.is_none() {
            return Err(TransportError::Malformed("native client returned an empty response".into()));
        }

        let exit_code = response
            .code
            .map_or(0, |c| i32::try_from(c).unwrap_or(i32::MAX));
        Ok(TierResponse { exit_code, response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient;

    #[async_trait]
    impl NativeClient for SlowClient {
        fn address(&self) -> Option<String> {
            None
        }

        async fn insert_worker_payload(&self, _request: &SubmitRequest) -> Result<ChainResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(ChainResponse::default())
        }
    }

    struct FixedClient(ChainResponse);

    #[async_trait]
    impl NativeClient for FixedClient {
        fn address(&self) -> Option<String> {
            Some("allo1native".into())
        }

        async fn insert_worker_payload(&self, _request: &SubmitRequest) -> Result<ChainResponse, TransportError> {
            Ok(self.0.clone())
        }
    }

    fn request() -> SubmitRequest {
        SubmitRequest { topic_id: 67, nonce: 4320, value: 0.5, wallet: "worker1".into() }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_transport_error() {
        let tier = NativeTransport::new(Arc::new(SlowClient), Duration::from_millis(50));
        let err = tier.submit(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_response_code_becomes_exit_code() {
        let response = ChainResponse { code: Some(5), txhash: Some("H".into()), ..Default::default() };
        let tier = NativeTransport::new(Arc::new(FixedClient(response)), Duration::from_secs(1));
        let answer = tier.submit(&request()).await.unwrap();
        assert_eq!(answer.exit_code, 5);
        assert_eq!(tier.tier(), TransportTier::Native);
    }

    #[tokio::test]
    async fn test_empty_response_is_malformed() {
        let tier = NativeTransport::new(Arc::new(FixedClient(ChainResponse::default())), Duration::from_secs(1));
        assert!(matches!(tier.submit(&request()).await, Err(TransportError::Malformed(_))));
    }
}
