//! Deadlock manager lifecycle.
//!
//! Owns the shared ledger and the traffic task:
//!
//! ```text
//! Idle ──start()──▶ Running ──stop()──▶ ShuttingDown ──task joined──▶ Stopped
//! ```

use crate::config::{ConfigError, ManagerConfig, TrafficConfig};
use crate::handle::LedgerHandle;
use crate::metrics;
use crate::stats::EngineStats;
use crate::traffic::{TrafficGenerator, TrafficReport};
use banker_ledger::{LedgerError, LedgerSnapshot, ResourceLedger};
use banker_types::EngineState;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that prevent an engine from being built or started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger initialisation failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("No tokio runtime available to run the traffic generator")]
    NoRuntime,

    #[error("Engine cannot start from state {0}")]
    InvalidState(EngineState),
}

/// Owner of a resource ledger and its background traffic.
///
/// Cloneable access to the ledger itself goes through [`LedgerHandle`]
/// (see [`DeadlockManager::handle`]). Dropping the manager cancels the traffic
/// task without waiting for it and moves the engine to
/// [`EngineState::Stopped`], so handles that outlive the manager reject
/// further operations. Call [`stop`](Self::stop) to wait for the task.
pub struct DeadlockManager {
    handle: LedgerHandle,
    traffic_config: TrafficConfig,
    traffic_seed: u64,
    cancel: CancellationToken,
    traffic_task: Mutex<Option<JoinHandle<TrafficReport>>>,
}

impl std::fmt::Debug for DeadlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlockManager")
            .field("state", &self.state())
            .field("traffic_config", &self.traffic_config)
            .field("traffic_seed", &self.traffic_seed)
            .finish()
    }
}

impl DeadlockManager {
    /// Build a manager with a randomly initialised ledger.
    pub fn new(config: ManagerConfig) -> Result<Self, StartError> {
        config.validate()?;

        // Without an explicit seed, use current time so each run differs
        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or_default()
        });

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let ledger = ResourceLedger::random(&config.ledger, &mut rng)?;

        info!(
            seed,
            processes = config.ledger.num_processes,
            resources = config.ledger.num_resources,
            "Deadlock manager initialised"
        );

        // Traffic RNG separate from ledger initialisation
        Self::with_ledger(ledger, config.traffic, seed.wrapping_add(1))
    }

    /// Build a manager around an existing ledger.
    pub fn with_ledger(
        ledger: ResourceLedger,
        traffic_config: TrafficConfig,
        traffic_seed: u64,
    ) -> Result<Self, StartError> {
        traffic_config.validate()?;
        metrics::set_engine_state(EngineState::Idle);

        Ok(Self {
            handle: LedgerHandle::new(ledger),
            traffic_config,
            traffic_seed,
            cancel: CancellationToken::new(),
            traffic_task: Mutex::new(None),
        })
    }

    /// Launch the traffic generator on the current tokio runtime.
    ///
    /// Only valid from [`EngineState::Idle`].
    pub fn start(&self) -> Result<(), StartError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StartError::NoRuntime)?;
        let generator = TrafficGenerator::new(
            self.handle.clone(),
            self.traffic_config.clone(),
            self.traffic_seed,
            self.cancel.clone(),
        )?;

        let mut task = self.traffic_task.lock();
        {
            let mut inner = self.handle.shared.inner.lock();
            if inner.state != EngineState::Idle {
                return Err(StartError::InvalidState(inner.state));
            }
            inner.state = EngineState::Running;
        }
        metrics::set_engine_state(EngineState::Running);

        *task = Some(runtime.spawn(generator.run()));

        info!(
            tick_interval_ms = self.traffic_config.tick_interval.as_millis() as u64,
            base_odds = self.traffic_config.base_odds,
            "Deadlock manager started"
        );
        Ok(())
    }

    /// Stop the engine and wait for the traffic task to exit.
    ///
    /// Returns the traffic report, or an empty report if no traffic ran
    /// (engine never started, or already stopped).
    pub async fn stop(&self) -> TrafficReport {
        let previous = {
            let mut inner = self.handle.shared.inner.lock();
            let previous = inner.state;
            match previous {
                EngineState::Running => inner.state = EngineState::ShuttingDown,
                EngineState::Idle => inner.state = EngineState::Stopped,
                EngineState::ShuttingDown | EngineState::Stopped => {}
            }
            previous
        };

        match previous {
            EngineState::Running => {}
            EngineState::Idle => {
                metrics::set_engine_state(EngineState::Stopped);
                info!("Deadlock manager stopped before starting");
                return TrafficReport::default();
            }
            // another caller is already shutting down, or nothing to do
            EngineState::ShuttingDown | EngineState::Stopped => return TrafficReport::default(),
        }

        metrics::set_engine_state(EngineState::ShuttingDown);
        info!("Deadlock manager shutting down");
        self.cancel.cancel();

        let task = self.traffic_task.lock().take();
        let report = match task {
            Some(task) => match task.await {
                Ok(report) => report,
                Err(e) => {
                    warn!(error = %e, "Traffic task did not exit cleanly");
                    TrafficReport::default()
                }
            },
            None => TrafficReport::default(),
        };

        // Task has exited; nobody else holds the lock for long.
        self.handle.shared.inner.lock().state = EngineState::Stopped;
        metrics::set_engine_state(EngineState::Stopped);

        info!(
            ticks = report.ticks,
            requests = report.requests,
            releases = report.releases,
            safety_checks = report.safety_checks,
            recoveries = report.recoveries,
            "Deadlock manager stopped"
        );
        report
    }

    /// Cloneable handle for request/release/check/recover calls.
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> EngineState {
        self.handle.state()
    }

    /// Consistent copy of the ledger for diagnostics.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.handle.snapshot()
    }

    pub fn stats(&self) -> &EngineStats {
        self.handle.stats()
    }
}

impl Drop for DeadlockManager {
    fn drop(&mut self) {
        self.cancel.cancel();

        let mut inner = self.handle.shared.inner.lock();
        if inner.state != EngineState::Stopped {
            debug!(state = %inner.state, "Deadlock manager dropped, stopping engine");
            inner.state = EngineState::Stopped;
            metrics::set_engine_state(EngineState::Stopped);
        }
    }
}
