//! REST tier.
//!
//! Posts the worker payload to the chain's REST endpoint. The endpoint is
//! the last resort in the chain: it needs no local client binary.

use crate::transport::{truncate, SubmitRequest, TierResponse, Transport, TransportError};
use async_trait::async_trait;
use epochgate_core::{ChainResponse, TransportTier};
use reqwest::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// HTTP submission tier.
pub struct RestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl RestTransport {
    /// Create the tier against a REST base URL.
    ///
    /// Fails when the HTTP client cannot be built; a client without the
    /// timeout is never substituted.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Endpoint for a request.
    pub fn endpoint(&self, request: &SubmitRequest) -> String {
        format!(
            "{}/emissions/v1/topics/{}/workers/{}/payloads",
            self.base_url, request.topic_id, request.wallet
        )
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn tier(&self) -> TransportTier {
        TransportTier::Rest
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<TierResponse, TransportError> {
        let url = self.endpoint(request);
        let payload = json!({
            "nonce": request.nonce,
            "value": request.value.to_string(),
        });

        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }

        match ChainResponse::parse_tx(&body) {
            Some(parsed) => Ok(TierResponse {
                exit_code: i32::from(status.as_u16()),
                response: parsed,
            }),
            None => Err(TransportError::Malformed(truncate(&body, 300))),
        }
    }
}

impl RestTransport {
    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Unavailable(format!("{}: {}", self.base_url, err))
        } else {
            TransportError::Other(err.to_string())
        }
    }
}
