//! Worker configuration.
//!
//! Built once at process start and handed by reference to the schedule,
//! gate and dispatcher constructors. Nothing below this module reads the
//! process environment.

use crate::attempt::TransportTier;
use crate::error::ConfigError;
use crate::{Time, TopicId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for one worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Competition schedule
    pub schedule: ScheduleSettings,

    /// Chain endpoints and transaction parameters
    pub chain: ChainConfig,

    /// Topic and wallet this worker submits for
    pub worker: WorkerSettings,

    /// Timeouts for queries, submissions and whole cycles
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Submission ledger location
    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl WorkerConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: WorkerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check fields that do not need the schedule engine to validate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.end <= self.schedule.start {
            return Err(ConfigError::InvalidRange {
                start: self.schedule.start.to_rfc3339(),
                end: self.schedule.end.to_rfc3339(),
            });
        }
        if self.chain.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("chain.chain_id is empty".to_string()));
        }
        if self.chain.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("chain.binary is empty".to_string()));
        }
        if self.worker.wallet.trim().is_empty() {
            return Err(ConfigError::Invalid("worker.wallet is empty".to_string()));
        }
        if self.worker.tiers.is_empty() {
            return Err(ConfigError::Invalid("worker.tiers must name at least one tier".to_string()));
        }
        if self.worker.tiers.contains(&TransportTier::Rest) && self.chain.rest_url.is_none() {
            return Err(ConfigError::Invalid("REST tier enabled but chain.rest_url is not set".to_string()));
        }
        Ok(())
    }
}

/// Schedule section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// First instant of the competition
    pub start: Time,

    /// Last instant of the competition
    pub end: Time,

    /// Re-alignment cadence, e.g. `1h`
    #[serde(default = "default_cadence")]
    pub cadence: String,

    /// Train window length in hours
    pub train_span_hours: u64,

    /// Validation window length in hours
    pub validation_span_hours: u64,

    /// Test window length in hours
    pub test_span_hours: u64,
}

fn default_cadence() -> String {
    "1h".to_string()
}

/// Chain endpoints and transaction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain client binary used for queries and the CLI tier
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Chain id passed with every transaction
    pub chain_id: String,

    /// Tendermint RPC endpoint (`--node`)
    pub node_rpc: String,

    /// REST (LCD) endpoint, required by the REST tier
    #[serde(default)]
    pub rest_url: Option<String>,

    /// gRPC endpoint, handed to native clients
    #[serde(default)]
    pub grpc_url: Option<String>,

    /// Fee amount in the smallest denomination
    #[serde(default = "default_fee_amount")]
    pub fee_amount: u64,

    /// Fee denomination
    #[serde(default = "default_fee_denom")]
    pub fee_denom: String,

    /// Gas limit per transaction
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Keyring backend (`os`, `file`, `test`)
    #[serde(default = "default_keyring_backend")]
    pub keyring_backend: String,

    /// Client home directory
    #[serde(default)]
    pub home: Option<PathBuf>,
}

fn default_binary() -> String {
    "allorad".to_string()
}

fn default_fee_amount() -> u64 {
    2_500
}

fn default_fee_denom() -> String {
    "uallo".to_string()
}

fn default_gas_limit() -> u64 {
    250_000
}

fn default_keyring_backend() -> String {
    "test".to_string()
}

impl ChainConfig {
    /// Fee string in `<amount><denom>` form.
    pub fn fees(&self) -> String {
        format!("{}{}", self.fee_amount, self.fee_denom)
    }
}

/// Where a worker address may be resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSourceKind {
    /// Key material held by the chain client's keyring
    Keyring,
    /// `worker.backup_address` from this file
    Configured,
    /// The native client's own `address()`
    Native,
}

/// Topic and wallet this worker submits for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Topic id
    pub topic_id: TopicId,

    /// Keyring name of the signing wallet
    pub wallet: String,

    /// Address used when the keyring cannot resolve one
    #[serde(default)]
    pub backup_address: Option<String>,

    /// Ordered address resolution strategy
    #[serde(default = "default_address_sources")]
    pub address_sources: Vec<AddressSourceKind>,

    /// Ordered transport tiers
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TransportTier>,

    /// External predictor command; window boundaries are appended as flags
    #[serde(default)]
    pub prediction_command: Vec<String>,
}

fn default_address_sources() -> Vec<AddressSourceKind> {
    vec![
        AddressSourceKind::Keyring,
        AddressSourceKind::Configured,
        AddressSourceKind::Native,
    ]
}

fn default_tiers() -> Vec<TransportTier> {
    vec![TransportTier::Native, TransportTier::Cli, TransportTier::Rest]
}

/// Timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Capability probe (client binary present)
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,

    /// Single chain query
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,

    /// Single transport tier invocation
    #[serde(default = "default_submit_secs")]
    pub submit_secs: u64,

    /// Whole gate-then-submit sequence
    #[serde(default = "default_cycle_deadline_secs")]
    pub cycle_deadline_secs: u64,
}

fn default_probe_secs() -> u64 {
    5
}

fn default_query_secs() -> u64 {
    15
}

fn default_submit_secs() -> u64 {
    60
}

fn default_cycle_deadline_secs() -> u64 {
    240
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            query_secs: default_query_secs(),
            submit_secs: default_submit_secs(),
            cycle_deadline_secs: default_cycle_deadline_secs(),
        }
    }
}

impl TimeoutSettings {
    /// Probe timeout.
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    /// Query timeout.
    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    /// Per-tier submission timeout.
    pub fn submit(&self) -> Duration {
        Duration::from_secs(self.submit_secs)
    }

    /// Cycle deadline.
    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }
}

/// Ledger section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// CSV file the ledger appends to
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("submissions.csv")
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}
