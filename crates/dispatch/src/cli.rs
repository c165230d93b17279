//! CLI subprocess tier.
//!
//! Runs `tx emissions insert-worker-payload` through the chain client. The
//! payload argument is the key:value text form `topic_id:<id>,value:<v>`;
//! the nonce travels as `--nonce`.

use crate::transport::{truncate, SubmitRequest, TierResponse, Transport, TransportError};
use async_trait::async_trait;
use epochgate_core::{ChainConfig, ChainResponse, TransportTier};
use epochgate_tools::{Tool, ToolError, ToolInput};
use std::sync::Arc;
use std::time::Duration;

/// Chain client subprocess tier.
pub struct CliTransport {
    tool: Arc<dyn Tool>,
    chain: ChainConfig,
    timeout: Duration,
}

impl CliTransport {
    /// Create the tier.
    pub fn new(tool: Arc<dyn Tool>, chain: ChainConfig, timeout: Duration) -> Self {
        Self { tool, chain, timeout }
    }

    /// Payload text for the request.
    pub fn payload(request: &SubmitRequest) -> String {
        format!("topic_id:{},value:{}", request.topic_id, request.value)
    }

    fn args(&self, request: &SubmitRequest) -> Vec<String> {
        let mut args = vec![
            "tx".to_string(),
            "emissions".into(),
            "insert-worker-payload".into(),
            request.wallet.clone(),
            Self::payload(request),
            "--nonce".into(),
            request.nonce.to_string(),
            "--chain-id".into(),
            self.chain.chain_id.clone(),
            "--node".into(),
            self.chain.node_rpc.clone(),
            "--fees".into(),
            self.chain.fees(),
            "--gas".into(),
            self.chain.gas_limit.to_string(),
            "--keyring-backend".into(),
            self.chain.keyring_backend.clone(),
            "--broadcast-mode".into(),
            "sync".into(),
            "--output".into(),
            "json".into(),
            "--yes".into(),
        ];
        if let Some(home) = &self.chain.home {
            args.extend(["--home".to_string(), home.to_string_lossy().to_string()]);
        }
        args
    }
}

#[async_trait]
impl Transport for CliTransport {
    fn tier(&self) -> TransportTier {
        TransportTier::Cli
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<TierResponse, TransportError> {
        let input = ToolInput::new(self.args(request), self.timeout);
        let output = self.tool.execute(&input).await.map_err(|e| match e {
            ToolError::NotFound(name) => TransportError::Unavailable(format!("{} not found", name)),
            ToolError::Timeout(d) => TransportError::Timeout(d),
            ToolError::Io(e) => TransportError::Other(e.to_string()),
        })?;

        // A chain answer wins over the exit code: the client exits non-zero
        // on check-tx rejections but still prints the tx response.
        let parsed = ChainResponse::parse_tx(&output.stdout).or_else(|| ChainResponse::parse_tx(&output.stderr));
        match parsed {
            Some(response) => Ok(TierResponse {
                exit_code: output.exit_code,
                response,
            }),
            None if !output.success() => Err(TransportError::Process {
                code: output.exit_code,
                stderr: truncate(&output.stderr, 300),
            }),
            None => Err(TransportError::Malformed(truncate(&output.stdout, 300))),
        }
    }
}
