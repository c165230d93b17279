//! epochgate CLI - scheduled worker submissions.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use epochgate_core::{AddressSourceKind, Nonce, TransportTier, WorkerConfig};
use epochgate_dispatch::{
    AddressResolver, CliTransport, ConfiguredAddress, Dispatcher, KeyringAddress, RestTransport, Transport,
};
use epochgate_execution::{CommandPredictor, EngineConfig, SubmissionEngine};
use epochgate_gate::WindowGate;
use epochgate_schedule::ScheduleConfig;
use epochgate_storage::{CsvLedger, Ledger, LedgerSummary};
use epochgate_tools::{ChainQuery, CliChainQuery, CommandTool, Tool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "epochgate")]
#[command(about = "Scheduled worker submissions with an eligibility gate and tiered transport", long_about = None)]
struct Cli {
    /// Worker configuration file (JSON)
    #[arg(long, short, default_value = "epochgate.json")]
    config: PathBuf,

    /// Override the ledger path from the configuration
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the aligned windows for an instant
    Windows {
        /// Instant to align (RFC 3339, default now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Run the eligibility gate and show the wallet balance
    Check {
        /// Worker address (default: resolved from the configured sources)
        #[arg(long)]
        address: Option<String>,
    },
    /// Submit one value now
    Submit {
        /// Value to submit
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// Nonce (default: resolved from the chain)
        #[arg(long)]
        nonce: Option<Nonce>,
    },
    /// Run the periodic submission loop
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Summarize the submission ledger
    Ledger {
        /// Also print the last N rows
        #[arg(long, default_value = "0")]
        tail: usize,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = WorkerConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let schedule = ScheduleConfig::from_settings(&config.schedule).context("Invalid schedule")?;
    let ledger_path = cli.ledger.clone().unwrap_or_else(|| config.ledger.path.clone());

    let tool: Arc<dyn Tool> = Arc::new(CommandTool::new(config.chain.binary.clone()));
    let query: Arc<dyn ChainQuery> = Arc::new(CliChainQuery::new(tool.clone(), &config.chain, &config.timeouts));

    match cli.command {
        Commands::Windows { at } => {
            let now = at.unwrap_or_else(Utc::now);
            if !schedule.contains(now) {
                warn!("{} is outside the schedule; windows are clamped", now);
            }
            println!("{}", serde_json::to_string_pretty(&schedule.windows(now))?);
        }
        Commands::Check { address } => {
            let address = match address {
                Some(address) => address,
                None => resolve_address(&build_addresses(&config, tool.clone())).await?,
            };
            let gate = WindowGate::new(query.clone(), config.chain.binary.clone());
            let status = gate.check_eligibility(config.worker.topic_id, &address).await;

            println!("{}", serde_json::to_string_pretty(&status)?);
            match status.blocking_reason() {
                None => println!("ok_to_submit: true"),
                Some(reason) => println!("ok_to_submit: false ({})", reason),
            }

            match query.balance(&address).await {
                Ok(coins) if coins.is_empty() => println!("balance: none"),
                Ok(coins) => {
                    for coin in coins {
                        println!("balance: {} {}", coin.amount, coin.denom);
                    }
                }
                Err(e) => warn!("Balance query failed: {}", e),
            }
        }
        Commands::Submit { value, nonce } => {
            let address = resolve_address(&build_addresses(&config, tool.clone())).await?;
            let gate = WindowGate::new(query.clone(), config.chain.binary.clone());
            let status = gate.check_eligibility(config.worker.topic_id, &address).await;
            if let Some(reason) = status.blocking_reason() {
                bail!("Submission window closed: {}", reason);
            }

            let ledger: Arc<dyn Ledger> = Arc::new(CsvLedger::open(&ledger_path).await?);
            let dispatcher = build_dispatcher(&config, tool, query, ledger);
            let nonce = nonce.or(status.latest_nonce.filter(|n| *n > 0));
            let deadline = tokio::time::Instant::now() + config.timeouts.cycle_deadline();

            let outcome = dispatcher
                .submit_before(config.worker.topic_id, value, &config.worker.wallet, nonce, Some(deadline))
                .await;

            println!("success: {}", outcome.success);
            println!("tx_hash: {}", outcome.tx_hash.as_deref().unwrap_or("-"));
            println!("status: {}", outcome.status);
            if let Some(e) = outcome.ledger_error {
                bail!("Attempt not recorded in {}: {}", ledger_path.display(), e);
            }
            if !outcome.success {
                bail!("Submission failed: {}", outcome.status);
            }
        }
        Commands::Run { cycles } => {
            let Some((program, args)) = config.worker.prediction_command.split_first() else {
                bail!("worker.prediction_command is required for run");
            };
            let predictor = CommandPredictor::new(
                Arc::new(CommandTool::new(program.clone())),
                args.to_vec(),
                config.timeouts.cycle_deadline(),
            );

            let ledger: Arc<dyn Ledger> = Arc::new(CsvLedger::open(&ledger_path).await?);
            let gate = WindowGate::new(query.clone(), config.chain.binary.clone());
            let addresses = build_addresses(&config, tool.clone());
            let dispatcher = build_dispatcher(&config, tool, query, ledger);

            let mut engine = SubmissionEngine::new(
                schedule,
                Arc::new(predictor),
                gate,
                dispatcher,
                config.worker.topic_id,
                config.worker.wallet.clone(),
            )
            .with_addresses(addresses)
            .with_config(EngineConfig {
                max_cycles: cycles,
                cycle_deadline: config.timeouts.cycle_deadline(),
            });

            tokio::select! {
                result = engine.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            info!("Completed {} cycles", engine.cycles());
        }
        Commands::Ledger { tail } => {
            let ledger = CsvLedger::open(&ledger_path).await?;
            let rows = ledger.read_all().await?;
            let summary = LedgerSummary::from_rows(&rows);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            for row in rows.iter().skip(rows.len().saturating_sub(tail)) {
                println!("{}", serde_json::to_string(row)?);
            }
        }
    }

    Ok(())
}

/// Transport tiers in configured order.
///
/// The native tier needs an in-process client, which only embedding
/// applications can supply, so the binary skips it.
fn build_tiers(config: &WorkerConfig, tool: Arc<dyn Tool>) -> Vec<Arc<dyn Transport>> {
    let mut tiers: Vec<Arc<dyn Transport>> = Vec::new();
    for tier in &config.worker.tiers {
        match tier {
            TransportTier::Native => match &config.chain.grpc_url {
                Some(url) => info!("Native tier needs an embedded client for {}; skipping", url),
                None => info!("Native tier needs an embedded client; skipping"),
            },
            TransportTier::Cli => tiers.push(Arc::new(CliTransport::new(
                tool.clone(),
                config.chain.clone(),
                config.timeouts.submit(),
            ))),
            TransportTier::Rest => match &config.chain.rest_url {
                Some(url) => match RestTransport::new(url.clone(), config.timeouts.submit()) {
                    Ok(rest) => tiers.push(Arc::new(rest)),
                    Err(e) => warn!("REST tier disabled: {}", e),
                },
                None => warn!("REST tier enabled without chain.rest_url; skipping"),
            },
        }
    }
    tiers
}

fn build_dispatcher(
    config: &WorkerConfig,
    tool: Arc<dyn Tool>,
    query: Arc<dyn ChainQuery>,
    ledger: Arc<dyn Ledger>,
) -> Dispatcher {
    build_tiers(config, tool)
        .into_iter()
        .fold(Dispatcher::new(query, ledger), |dispatcher, tier| dispatcher.with_tier(tier))
}

fn build_addresses(config: &WorkerConfig, tool: Arc<dyn Tool>) -> AddressResolver {
    let mut resolver = AddressResolver::new();
    for source in &config.worker.address_sources {
        resolver = match source {
            AddressSourceKind::Keyring => resolver.with_source(Box::new(KeyringAddress::new(
                tool.clone(),
                config.worker.wallet.clone(),
                config.chain.clone(),
                config.timeouts.query(),
            ))),
            AddressSourceKind::Configured => {
                resolver.with_source(Box::new(ConfiguredAddress::new(config.worker.backup_address.clone())))
            }
            AddressSourceKind::Native => {
                debug!("Native address source needs an embedded client; skipping");
                resolver
            }
        };
    }
    resolver
}

async fn resolve_address(resolver: &AddressResolver) -> Result<String> {
    match resolver.resolve().await {
        Some(address) => Ok(address),
        None => bail!("No worker address: keyring lookup failed and worker.backup_address is not set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tiers: serde_json::Value, rest_url: Option<&str>) -> WorkerConfig {
        serde_json::from_value(serde_json::json!({
            "schedule": {
                "start": "2025-09-16T13:00:00Z",
                "end": "2025-12-15T13:00:00Z",
                "train_span_hours": 672,
                "validation_span_hours": 168,
                "test_span_hours": 24
            },
            "chain": {
                "chain_id": "allora-testnet-1",
                "node_rpc": "https://rpc.example:443",
                "rest_url": rest_url
            },
            "worker": {
                "topic_id": 67,
                "wallet": "worker1",
                "backup_address": "allo1backup",
                "tiers": tiers
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["epochgate", "--config", "w.json", "submit", "-0.5", "--nonce", "4320"]).unwrap();
        match cli.command {
            Commands::Submit { value, nonce } => {
                assert_eq!(value, -0.5);
                assert_eq!(nonce, Some(4320));
            }
            _ => panic!("expected submit"),
        }

        let cli = Cli::try_parse_from(["epochgate", "windows", "--at", "2025-10-20T05:30:00Z"]).unwrap();
        assert!(matches!(cli.command, Commands::Windows { at: Some(_) }));
    }

    #[test]
    fn test_tiers_follow_config_order_and_skip_native() {
        let tool: Arc<dyn Tool> = Arc::new(CommandTool::new("allorad"));
        let config = config(serde_json::json!(["native", "rest", "cli"]), Some("https://lcd.example"));
        let tiers: Vec<_> = build_tiers(&config, tool).iter().map(|t| t.tier()).collect();
        assert_eq!(tiers, vec![TransportTier::Rest, TransportTier::Cli]);
    }

    #[tokio::test]
    async fn test_configured_address_resolves() {
        let tool: Arc<dyn Tool> = Arc::new(CommandTool::new("epochgate-test-missing-client"));
        let config = config(serde_json::json!(["cli"]), None);
        let resolver = build_addresses(&config, tool);
        assert_eq!(resolver.len(), 2);
        assert_eq!(resolve_address(&resolver).await.unwrap(), "allo1backup");
    }
}
