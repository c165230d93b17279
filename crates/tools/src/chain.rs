//! Read-only chain query surface.
//!
//! [`ChainQuery`] is the capability the gate and the dispatcher's nonce
//! resolution consume. [`CliChainQuery`] implements it on top of the chain
//! client binary. Parsing is defensive: absent or null fields come back as
//! `None`, never as errors.

use crate::r#trait::{Tool, ToolError, ToolInput, ToolOutput};
use async_trait::async_trait;
use epochgate_core::{extract_json, find_bool, find_i64, value_as_i64, ChainConfig, Nonce, TimeoutSettings, TopicId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A single chain read failed.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The client tool could not be run
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// The client exited non-zero
    #[error("exit code {code}: {stderr}")]
    Exit {
        /// Process exit code
        code: i32,
        /// Trimmed standard error
        stderr: String,
    },

    /// The client printed something that is not a JSON document
    #[error("unparseable response: {0}")]
    Parse(String),
}

/// Answer of the worker-nonce query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceProbe {
    /// Worker has an outstanding nonce, `None` when the response is silent
    pub has_nonce: Option<bool>,

    /// Nonce value when the response carries one
    pub nonce: Option<Nonce>,
}

/// A balance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination
    pub denom: String,
    /// Amount, kept as the chain's decimal string
    pub amount: String,
}

/// Chain read capability.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Whether the underlying client is present at all.
    async fn is_available(&self) -> bool;

    /// Topic active flag.
    async fn topic_active(&self, topic_id: TopicId) -> Result<Option<bool>, QueryError>;

    /// Whether `worker` has an unfulfilled nonce on the topic.
    async fn worker_nonce(&self, topic_id: TopicId, worker: &str) -> Result<NonceProbe, QueryError>;

    /// All unfulfilled worker nonces on the topic, in response order.
    async fn unfulfilled_nonces(&self, topic_id: TopicId) -> Result<Vec<Nonce>, QueryError>;

    /// The topic's most recently ended epoch marker.
    async fn epoch_last_ended(&self, topic_id: TopicId) -> Result<Option<Nonce>, QueryError>;

    /// Bank balances of an address.
    async fn balance(&self, address: &str) -> Result<Vec<Coin>, QueryError>;
}

const ACTIVE_KEYS: &[&str] = &["is_active", "active", "topic_active"];
const HAS_NONCE_KEYS: &[&str] = &[
    "can_submit_worker_payload",
    "is_worker_nonce_unfulfilled",
    "has_unfulfilled_nonce",
    "unfulfilled",
];
const NONCE_KEYS: &[&str] = &["nonce", "block_height", "worker_nonce", "latest_nonce", "height"];
const EPOCH_KEYS: &[&str] = &["epoch_last_ended", "epoch_last_ended_height", "last_ended_epoch"];

/// [`ChainQuery`] backed by the chain client binary.
pub struct CliChainQuery {
    tool: Arc<dyn Tool>,
    node_rpc: String,
    home: Option<PathBuf>,
    query_timeout: Duration,
    probe_timeout: Duration,
}

impl CliChainQuery {
    /// Create a query client.
    pub fn new(tool: Arc<dyn Tool>, chain: &ChainConfig, timeouts: &TimeoutSettings) -> Self {
        Self {
            tool,
            node_rpc: chain.node_rpc.clone(),
            home: chain.home.clone(),
            query_timeout: timeouts.query(),
            probe_timeout: timeouts.probe(),
        }
    }

    async fn query(&self, args: &[&str]) -> Result<JsonValue, QueryError> {
        let mut full: Vec<String> = vec!["query".into(), "emissions".into()];
        full.extend(args.iter().map(|a| a.to_string()));
        self.run_json(full).await
    }

    async fn run_json(&self, mut args: Vec<String>) -> Result<JsonValue, QueryError> {
        args.extend(["--node".to_string(), self.node_rpc.clone(), "--output".into(), "json".into()]);
        if let Some(home) = &self.home {
            args.extend(["--home".to_string(), home.to_string_lossy().to_string()]);
        }
        let output = self.tool.execute(&ToolInput::new(args, self.query_timeout)).await?;
        parse_query_output(&output)
    }
}

fn parse_query_output(output: &ToolOutput) -> Result<JsonValue, QueryError> {
    if !output.success() {
        return Err(QueryError::Exit {
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    extract_json(&output.stdout).ok_or_else(|| QueryError::Parse(truncate(&output.stdout, 200)))
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Map a worker-nonce response. A bare boolean or a boolean under one of the
/// accepted keys answers `has_nonce`; a nonce value under one of the nonce
/// keys implies `has_nonce = true` when no boolean is present.
pub fn parse_nonce_probe(value: &JsonValue) -> NonceProbe {
    let has_nonce = find_bool(value, HAS_NONCE_KEYS);
    let nonce = find_i64(value, NONCE_KEYS);
    NonceProbe {
        has_nonce: has_nonce.or(nonce.map(|_| true)),
        nonce,
    }
}

/// Collect nonce values: objects carrying `block_height` or bare integers
/// inside a `nonces` array.
pub fn collect_nonces(value: &JsonValue) -> Vec<Nonce> {
    let mut out = Vec::new();
    collect_into(value, false, &mut out);
    out
}

fn collect_into(value: &JsonValue, in_nonce_list: bool, out: &mut Vec<Nonce>) {
    match value {
        JsonValue::Object(map) => {
            if let Some(height) = map.get("block_height").and_then(value_as_i64) {
                out.push(height);
                return;
            }
            for (key, child) in map {
                collect_into(child, key == "nonces", out);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                match value_as_i64(item) {
                    Some(n) if in_nonce_list => out.push(n),
                    _ => collect_into(item, in_nonce_list, out),
                }
            }
        }
        _ => {}
    }
}

#[async_trait]
impl ChainQuery for CliChainQuery {
    async fn is_available(&self) -> bool {
        self.tool.is_available(self.probe_timeout).await
    }

    async fn topic_active(&self, topic_id: TopicId) -> Result<Option<bool>, QueryError> {
        let value = self.query(&["is-topic-active", &topic_id.to_string()]).await?;
        Ok(find_bool(&value, ACTIVE_KEYS))
    }

    async fn worker_nonce(&self, topic_id: TopicId, worker: &str) -> Result<NonceProbe, QueryError> {
        let value = self
            .query(&["can-submit-worker-payload", &topic_id.to_string(), worker])
            .await?;
        Ok(parse_nonce_probe(&value))
    }

    async fn unfulfilled_nonces(&self, topic_id: TopicId) -> Result<Vec<Nonce>, QueryError> {
        let value = self.query(&["unfulfilled-worker-nonces", &topic_id.to_string()]).await?;
        Ok(collect_nonces(&value))
    }

    async fn epoch_last_ended(&self, topic_id: TopicId) -> Result<Option<Nonce>, QueryError> {
        let value = self.query(&["topic", &topic_id.to_string()]).await?;
        Ok(find_i64(&value, EPOCH_KEYS))
    }

    async fn balance(&self, address: &str) -> Result<Vec<Coin>, QueryError> {
        let value = self
            .run_json(vec!["query".into(), "bank".into(), "balances".into(), address.to_string()])
            .await?;
        let coins = value
            .get("balances")
            .cloned()
            .map(serde_json::from_value::<Vec<Coin>>)
            .transpose()
            .map_err(|e| QueryError::Parse(e.to_string()))?;
        Ok(coins.unwrap_or_default())
    }
}

/// Resolve a keyring entry's address through the client binary.
///
/// `Ok(None)` when the client answers but prints no address.
pub async fn keyring_address(
    tool: &dyn Tool,
    wallet: &str,
    keyring_backend: &str,
    home: Option<&PathBuf>,
    timeout: Duration,
) -> Result<Option<String>, QueryError> {
    let mut args = vec![
        "keys".to_string(),
        "show".into(),
        wallet.to_string(),
        "--address".into(),
        "--keyring-backend".into(),
        keyring_backend.to_string(),
    ];
    if let Some(home) = home {
        args.extend(["--home".to_string(), home.to_string_lossy().to_string()]);
    }
    let output = tool.execute(&ToolInput::new(args, timeout)).await?;
    if !output.success() {
        return Err(QueryError::Exit {
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string))
}
