//! The submission engine - runs the periodic worker loop.

use crate::predictor::Predictor;
use epochgate_core::{SubmitOutcome, Time, TopicId};
use epochgate_dispatch::{AddressResolver, Dispatcher};
use epochgate_gate::WindowGate;
use epochgate_schedule::{ScheduleConfig, WindowSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Configuration for the submission engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Max cycles before stopping (None = until the schedule ends)
    pub max_cycles: Option<usize>,
    /// Bound on one address, gate and submit sequence
    pub cycle_deadline: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            cycle_deadline: Duration::from_secs(240),
        }
    }
}

/// The submission engine.
///
/// Runs one cycle per cadence boundary:
/// ```text
/// Align → Predict → Resolve Address → Gate → Dispatch → Ledger
/// ```
pub struct SubmissionEngine {
    schedule: ScheduleConfig,
    predictor: Arc<dyn Predictor>,
    addresses: AddressResolver,
    gate: WindowGate,
    dispatcher: Dispatcher,
    topic_id: TopicId,
    wallet: String,
    config: EngineConfig,
    cycles_run: usize,
}

impl SubmissionEngine {
    /// Create a new submission engine.
    pub fn new(
        schedule: ScheduleConfig,
        predictor: Arc<dyn Predictor>,
        gate: WindowGate,
        dispatcher: Dispatcher,
        topic_id: TopicId,
        wallet: impl Into<String>,
    ) -> Self {
        Self {
            schedule,
            predictor,
            addresses: AddressResolver::new(),
            gate,
            dispatcher,
            topic_id,
            wallet: wallet.into(),
            config: EngineConfig::default(),
            cycles_run: 0,
        }
    }

    /// Set the worker address sources.
    pub fn with_addresses(mut self, addresses: AddressResolver) -> Self {
        self.addresses = addresses;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one cycle for the instant `now`.
    pub async fn run_cycle(&mut self, now: Time) -> CycleResult {
        self.cycles_run += 1;
        info!("Starting submission cycle {}", self.cycles_run);

        // 1. Schedule
        if !self.schedule.contains(now) {
            info!("{} is outside the schedule", now);
            return CycleResult::OutsideSchedule;
        }
        let windows = self.schedule.windows(now);
        debug!("Windows for cycle: {:?}", windows);

        let deadline = Instant::now() + self.config.cycle_deadline;

        // 2. Predict
        let value = match bounded(deadline, self.predictor.predict(self.topic_id, &windows)).await {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                warn!("Prediction failed: {}", e);
                return CycleResult::PredictionFailed(e.to_string());
            }
            None => return CycleResult::PredictionFailed("cycle deadline exceeded".to_string()),
        };

        // 3. Worker address
        let Some(address) = bounded(deadline, self.addresses.resolve()).await.flatten() else {
            warn!("No worker address could be resolved");
            return CycleResult::NoAddress;
        };

        // 4. Gate
        let Some(eligibility) = bounded(deadline, self.gate.check_eligibility(self.topic_id, &address)).await else {
            return CycleResult::GateClosed("cycle deadline exceeded".to_string());
        };
        if let Some(reason) = eligibility.blocking_reason() {
            return CycleResult::GateClosed(reason);
        }

        // 5. Dispatch
        let nonce = eligibility.latest_nonce.filter(|n| *n > 0);
        let outcome = self
            .dispatcher
            .submit_before(self.topic_id, value, &self.wallet, nonce, Some(deadline))
            .await;

        CycleResult::Submitted { windows, outcome }
    }

    /// Run the engine until the schedule ends or `max_cycles` is reached.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            if let Some(max) = self.config.max_cycles {
                if self.cycles_run >= max {
                    info!("Reached max cycles ({})", max);
                    break;
                }
            }

            let now = chrono::Utc::now();
            if now < self.schedule.start() {
                info!("Schedule starts at {}", self.schedule.start());
                sleep_until(self.schedule.start()).await;
                continue;
            }
            if now > self.schedule.end() {
                info!("Schedule ended at {}", self.schedule.end());
                break;
            }

            match self.run_cycle(now).await {
                CycleResult::Submitted { outcome, .. } if outcome.ledger_error.is_some() => {
                    error!("Ledger write failed: {:?}", outcome.ledger_error);
                }
                CycleResult::Submitted { outcome, .. } => {
                    info!("Cycle finished: {}", outcome.status);
                }
                other => info!("Cycle skipped: {}", other),
            }

            match self.schedule.next_boundary(chrono::Utc::now()) {
                Some(next) => {
                    debug!("Next cycle at {}", next);
                    sleep_until(next).await;
                }
                None => {
                    info!("No further cadence boundaries");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Get cycles run so far.
    pub fn cycles(&self) -> usize {
        self.cycles_run
    }
}

/// Result of a single submission cycle.
#[derive(Debug)]
pub enum CycleResult {
    /// The instant lies outside the schedule
    OutsideSchedule,
    /// Prediction failed; nothing submitted
    PredictionFailed(String),
    /// No worker address source answered
    NoAddress,
    /// Gate refused, with the blocking reason
    GateClosed(String),
    /// The dispatcher ran and recorded an attempt
    Submitted {
        /// Windows the value was predicted for
        windows: WindowSet,
        /// Dispatcher outcome
        outcome: SubmitOutcome,
    },
}

impl std::fmt::Display for CycleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleResult::OutsideSchedule => write!(f, "outside schedule"),
            CycleResult::PredictionFailed(e) => write!(f, "prediction failed: {}", e),
            CycleResult::NoAddress => write!(f, "no worker address"),
            CycleResult::GateClosed(reason) => write!(f, "gate closed: {}", reason),
            CycleResult::Submitted { outcome, .. } => write!(f, "submitted: {}", outcome.status),
        }
    }
}

async fn bounded<F: Future>(deadline: Instant, fut: F) -> Option<F::Output> {
    tokio::time::timeout_at(deadline, fut).await.ok()
}

async fn sleep_until(at: Time) {
    let wait = (at - chrono::Utc::now()).to_std().unwrap_or(Duration::ZERO);
    tokio::time::sleep(wait).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{FixedPredictor, PredictError};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use epochgate_core::{ChainResponse, Nonce, TransportTier};
    use epochgate_dispatch::{ConfiguredAddress, SubmitRequest, TierResponse, Transport, TransportError};
    use epochgate_storage::{CsvLedger, Ledger};
    use epochgate_tools::{ChainQuery, Coin, NonceProbe, QueryError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Chain {
        active: Option<bool>,
    }

    #[async_trait]
    impl ChainQuery for Chain {
        async fn is_available(&self) -> bool {
            true
        }

        async fn topic_active(&self, _topic_id: TopicId) -> Result<Option<bool>, QueryError> {
            Ok(self.active)
        }

        async fn worker_nonce(&self, _topic_id: TopicId, _worker: &str) -> Result<NonceProbe, QueryError> {
            Ok(NonceProbe { has_nonce: Some(true), nonce: Some(4320) })
        }

        async fn unfulfilled_nonces(&self, _topic_id: TopicId) -> Result<Vec<Nonce>, QueryError> {
            Ok(vec![4320])
        }

        async fn epoch_last_ended(&self, _topic_id: TopicId) -> Result<Option<Nonce>, QueryError> {
            Ok(Some(4260))
        }

        async fn balance(&self, _address: &str) -> Result<Vec<Coin>, QueryError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct Accepting {
        calls: AtomicUsize,
        nonces: std::sync::Mutex<Vec<Nonce>>,
    }

    #[async_trait]
    impl Transport for Accepting {
        fn tier(&self) -> TransportTier {
            TransportTier::Cli
        }

        async fn submit(&self, request: &SubmitRequest) -> Result<TierResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.nonces.lock().unwrap().push(request.nonce);
            Ok(TierResponse {
                exit_code: 0,
                response: ChainResponse { code: Some(0), txhash: Some("ABC123".into()), ..Default::default() },
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl Predictor for Failing {
        async fn predict(&self, _topic_id: TopicId, _windows: &WindowSet) -> Result<f64, PredictError> {
            Err(PredictError::Parse("warming up".into()))
        }
    }

    fn schedule() -> ScheduleConfig {
        ScheduleConfig::new(
            Utc.with_ymd_and_hms(2025, 9, 16, 13, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 12, 15, 13, 0, 0).unwrap(),
            chrono::Duration::hours(1),
            chrono::Duration::days(28),
            chrono::Duration::days(7),
            chrono::Duration::days(1),
        )
        .unwrap()
    }

    struct Harness {
        engine: SubmissionEngine,
        tier: Arc<Accepting>,
        ledger: Arc<CsvLedger>,
        _dir: tempfile::TempDir,
    }

    async fn harness(active: Option<bool>, predictor: Arc<dyn Predictor>, address: Option<&str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(CsvLedger::open(dir.path().join("submissions.csv")).await.unwrap());
        let chain: Arc<dyn ChainQuery> = Arc::new(Chain { active });
        let tier = Arc::new(Accepting::default());
        let dispatcher = Dispatcher::new(chain.clone(), ledger.clone()).with_tier(tier.clone());
        let engine = SubmissionEngine::new(
            schedule(),
            predictor,
            WindowGate::new(chain, "allorad"),
            dispatcher,
            67,
            "worker1",
        )
        .with_addresses(
            AddressResolver::new().with_source(Box::new(ConfiguredAddress::new(address.map(str::to_string)))),
        );
        Harness { engine, tier, ledger, _dir: dir }
    }

    #[tokio::test]
    async fn test_cycle_submits_and_records() {
        let mut h = harness(Some(true), Arc::new(FixedPredictor(0.042)), Some("allo1worker")).await;
        let now = Utc.with_ymd_and_hms(2025, 10, 20, 5, 30, 0).unwrap();

        match h.engine.run_cycle(now).await {
            CycleResult::Submitted { windows, outcome } => {
                assert!(outcome.success);
                assert_eq!(outcome.tx_hash.as_deref(), Some("ABC123"));
                assert_eq!(windows.inference_time, Utc.with_ymd_and_hms(2025, 10, 20, 5, 0, 0).unwrap());
            }
            other => panic!("unexpected: {:?}", other),
        }

        // Gate's worker nonce is used as-is
        assert_eq!(*h.tier.nonces.lock().unwrap(), vec![4320]);
        let rows = h.ledger.read_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 0.042);
        assert_eq!(h.engine.cycles(), 1);
    }

    #[tokio::test]
    async fn test_outside_schedule() {
        let mut h = harness(Some(true), Arc::new(FixedPredictor(1.0)), Some("allo1worker")).await;
        let before = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        assert!(matches!(h.engine.run_cycle(before).await, CycleResult::OutsideSchedule));
        assert_eq!(h.tier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gate_closed_records_nothing() {
        let mut h = harness(Some(false), Arc::new(FixedPredictor(1.0)), Some("allo1worker")).await;
        let now = Utc.with_ymd_and_hms(2025, 10, 20, 5, 30, 0).unwrap();

        match h.engine.run_cycle(now).await {
            CycleResult::GateClosed(reason) => assert!(reason.contains("topic")),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(h.tier.calls.load(Ordering::SeqCst), 0);
        assert!(h.ledger.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_topic_state_blocks() {
        let mut h = harness(None, Arc::new(FixedPredictor(1.0)), Some("allo1worker")).await;
        let now = Utc.with_ymd_and_hms(2025, 10, 20, 5, 30, 0).unwrap();
        assert!(matches!(h.engine.run_cycle(now).await, CycleResult::GateClosed(_)));
    }

    #[tokio::test]
    async fn test_no_address() {
        let mut h = harness(Some(true), Arc::new(FixedPredictor(1.0)), None).await;
        let now = Utc.with_ymd_and_hms(2025, 10, 20, 5, 30, 0).unwrap();
        assert!(matches!(h.engine.run_cycle(now).await, CycleResult::NoAddress));
    }

    #[tokio::test]
    async fn test_prediction_failure() {
        let mut h = harness(Some(true), Arc::new(Failing), Some("allo1worker")).await;
        let now = Utc.with_ymd_and_hms(2025, 10, 20, 5, 30, 0).unwrap();
        match h.engine.run_cycle(now).await {
            CycleResult::PredictionFailed(e) => assert!(e.contains("warming up")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_stops_after_schedule_end() {
        let mut h = harness(Some(true), Arc::new(FixedPredictor(1.0)), Some("allo1worker")).await;
        // Fixed schedule ended in 2025
        h.engine.run().await.unwrap();
        assert_eq!(h.engine.cycles(), 0);
    }

    #[tokio::test]
    async fn test_run_honours_max_cycles() {
        let mut h = harness(Some(true), Arc::new(FixedPredictor(1.0)), Some("allo1worker")).await;
        let now = Utc::now();
        h.engine.schedule = ScheduleConfig::new(
            now - chrono::Duration::hours(1),
            now + chrono::Duration::hours(1),
            chrono::Duration::milliseconds(200),
            chrono::Duration::hours(1),
            chrono::Duration::zero(),
            chrono::Duration::zero(),
        )
        .unwrap();
        h.engine.config.max_cycles = Some(2);

        h.engine.run().await.unwrap();

        assert_eq!(h.engine.cycles(), 2);
        assert_eq!(h.ledger.read_all().await.unwrap().len(), 2);
    }
}
