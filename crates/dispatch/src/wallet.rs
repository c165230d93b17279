//! Worker address resolution.
//!
//! The gate needs the worker's on-chain address while the tiers sign with a
//! wallet reference. Sources are tried in order and the first address wins.

use crate::native::NativeClient;
use async_trait::async_trait;
use epochgate_core::ChainConfig;
use epochgate_tools::{keyring_address, Tool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One place an address can come from.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Look the address up. `None` when this source cannot tell.
    async fn address(&self) -> Option<String>;
}

/// Asks the chain client's keyring.
pub struct KeyringAddress {
    tool: Arc<dyn Tool>,
    wallet: String,
    chain: ChainConfig,
    timeout: Duration,
}

impl KeyringAddress {
    /// Create the source.
    pub fn new(tool: Arc<dyn Tool>, wallet: impl Into<String>, chain: ChainConfig, timeout: Duration) -> Self {
        Self {
            tool,
            wallet: wallet.into(),
            chain,
            timeout,
        }
    }
}

#[async_trait]
impl AddressSource for KeyringAddress {
    fn name(&self) -> &str {
        "keyring"
    }

    async fn address(&self) -> Option<String> {
        match keyring_address(
            self.tool.as_ref(),
            &self.wallet,
            &self.chain.keyring_backend,
            self.chain.home.as_ref(),
            self.timeout,
        )
        .await
        {
            Ok(address) => address,
            Err(e) => {
                warn!("Keyring lookup for {} failed: {}", self.wallet, e);
                None
            }
        }
    }
}

/// A fixed address from configuration.
pub struct ConfiguredAddress(Option<String>);

impl ConfiguredAddress {
    /// Create the source. Blank values count as absent.
    pub fn new(address: Option<String>) -> Self {
        Self(address.filter(|a| !a.trim().is_empty()))
    }
}

#[async_trait]
impl AddressSource for ConfiguredAddress {
    fn name(&self) -> &str {
        "configured"
    }

    async fn address(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Asks the native client.
pub struct NativeAddress(Arc<dyn NativeClient>);

impl NativeAddress {
    /// Create the source.
    pub fn new(client: Arc<dyn NativeClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl AddressSource for NativeAddress {
    fn name(&self) -> &str {
        "native"
    }

    async fn address(&self) -> Option<String> {
        self.0.address()
    }
}

/// Ordered list of address sources.
#[derive(Default)]
pub struct AddressResolver {
    sources: Vec<Box<dyn AddressSource>>,
}

impl AddressResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source.
    pub fn with_source(mut self, source: Box<dyn AddressSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Number of configured sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when no source is configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// First address any source yields.
    pub async fn resolve(&self) -> Option<String> {
        for source in &self.sources {
            if let Some(address) = source.address().await {
                debug!("Worker address from {}: {}", source.name(), address);
                return Some(address);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SubmitRequest, TransportError};
    use epochgate_core::ChainResponse;
    use epochgate_tools::{ToolError, ToolInput, ToolOutput};

    struct Keys {
        exit_code: i32,
        stdout: &'static str,
    }

    #[async_trait]
    impl Tool for Keys {
        fn name(&self) -> &str {
            "allorad"
        }

        async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput {
                exit_code: self.exit_code,
                stdout: self.stdout.into(),
                stderr: String::new(),
                duration: Duration::ZERO,
            })
        }

        async fn is_available(&self, _timeout: Duration) -> bool {
            true
        }
    }

    struct Native;

    #[async_trait]
    impl NativeClient for Native {
        fn address(&self) -> Option<String> {
            Some("allo1native".into())
        }

        async fn insert_worker_payload(&self, _request: &SubmitRequest) -> Result<ChainResponse, TransportError> {
            Err(TransportError::Other("unused".into()))
        }
    }

    fn chain() -> ChainConfig {
        serde_json::from_value(serde_json::json!({
            "chain_id": "allora-testnet-1",
            "node_rpc": "http://localhost:26657"
        }))
        .unwrap()
    }

    fn keyring(exit_code: i32, stdout: &'static str) -> Box<dyn AddressSource> {
        Box::new(KeyringAddress::new(
            Arc::new(Keys { exit_code, stdout }),
            "worker1",
            chain(),
            Duration::from_secs(1),
        ))
    }

    #[tokio::test]
    async fn test_first_source_wins() {
        let resolver = AddressResolver::new()
            .with_source(keyring(0, "allo1keyring\n"))
            .with_source(Box::new(ConfiguredAddress::new(Some("allo1backup".into()))));
        assert_eq!(resolver.resolve().await.as_deref(), Some("allo1keyring"));
    }

    #[tokio::test]
    async fn test_falls_through_failed_sources() {
        let resolver = AddressResolver::new()
            .with_source(keyring(1, ""))
            .with_source(Box::new(ConfiguredAddress::new(Some("  ".into()))))
            .with_source(Box::new(NativeAddress::new(Arc::new(Native))));
        assert_eq!(resolver.len(), 3);
        assert_eq!(resolver.resolve().await.as_deref(), Some("allo1native"));
    }

    #[tokio::test]
    async fn test_no_source_yields_none() {
        assert!(AddressResolver::new().resolve().await.is_none());
    }
}
