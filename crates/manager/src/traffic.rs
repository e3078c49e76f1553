//! Background request/release traffic.
//!
//! Stands in for real concurrent consumers of the ledger. Every tick rolls
//! three independent dice (see [`TrafficConfig`]) and then sleeps. The
//! generator only touches the ledger through a [`LedgerHandle`].

use crate::config::{ConfigError, TrafficConfig};
use crate::handle::{LedgerHandle, OperationError};
use banker_types::{ProcessId, RequestOutcome, ResourceId, SafetyVerdict};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Counters from one traffic generator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficReport {
    /// Loop iterations.
    pub ticks: u64,
    /// Requests issued (any outcome).
    pub requests: u64,
    /// Requests granted.
    pub granted: u64,
    /// Requests left pending.
    pub pending: u64,
    /// Requests rejected for exceeding the claim.
    pub rejected: u64,
    /// Single-unit releases issued.
    pub releases: u64,
    /// Safety checks that ran.
    pub safety_checks: u64,
    /// Checks that came back unsafe.
    pub unsafe_verdicts: u64,
    /// Recovery passes that reclaimed a unit.
    pub recoveries: u64,
    /// Checks skipped because another was in flight.
    pub skipped_checks: u64,
}

impl TrafficReport {
    /// Print the report to stdout.
    pub fn print(&self) {
        println!("\n=== Traffic Report ===");
        println!("Ticks:          {}", self.ticks);
        println!(
            "Requests:       {} (granted {}, pending {}, rejected {})",
            self.requests, self.granted, self.pending, self.rejected
        );
        println!("Releases:       {}", self.releases);
        println!(
            "Safety checks:  {} ({} unsafe, {} skipped)",
            self.safety_checks, self.unsafe_verdicts, self.skipped_checks
        );
        println!("Recoveries:     {}", self.recoveries);
    }
}

/// Randomised request/release/check loop over a shared ledger.
pub struct TrafficGenerator {
    handle: LedgerHandle,
    config: TrafficConfig,
    rng: ChaCha8Rng,
    cancel: CancellationToken,
    num_processes: u32,
    num_resources: u32,
    report: TrafficReport,
}

impl TrafficGenerator {
    /// Create a generator. Decisions are reproducible for a given seed.
    pub fn new(
        handle: LedgerHandle,
        config: TrafficConfig,
        seed: u64,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (num_processes, num_resources) = handle.dimensions();
        Ok(Self {
            handle,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            cancel,
            num_processes: num_processes as u32,
            num_resources: num_resources as u32,
            report: TrafficReport::default(),
        })
    }

    /// Run until the cancellation token fires.
    ///
    /// Cancellation is observed between ticks, never in the middle of one.
    pub async fn run(mut self) -> TrafficReport {
        info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            base_odds = self.config.base_odds,
            "Starting traffic generator"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.tick();

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }

        debug!(ticks = self.report.ticks, "Traffic generator exiting");
        self.report
    }

    /// One iteration: roll for a request, a release and a safety check.
    pub fn tick(&mut self) {
        self.report.ticks += 1;
        let odds = self.config.base_odds;
        trace!(tick = self.report.ticks, "Traffic tick");

        if self.rng.gen_ratio(1, odds) {
            self.issue_request();
        }
        if self.rng.gen_ratio(1, 2 * odds) {
            self.issue_release();
        }
        if self.rng.gen_ratio(1, 3 * odds) {
            self.run_safety_check();
        }
    }

    /// Report accumulated so far.
    pub fn report(&self) -> &TrafficReport {
        &self.report
    }

    fn issue_request(&mut self) {
        let process = ProcessId(self.rng.gen_range(0..self.num_processes));
        let resource = ResourceId(self.rng.gen_range(0..self.num_resources));
        let amount = self.rng.gen_range(1..=self.config.max_request_amount);
        self.report.requests += 1;

        match self.handle.request(process, resource, amount) {
            Ok(RequestOutcome::Granted) => self.report.granted += 1,
            Ok(RequestOutcome::Pending) => self.report.pending += 1,
            Err(e) if e.is_claim_exceeded() => {
                trace!(%process, %resource, amount, "Generated request exceeds claim");
                self.report.rejected += 1;
            }
            Err(e) => debug!(error = %e, "Request failed"),
        }
    }

    fn issue_release(&mut self) {
        match self.handle.release_random_held(&mut self.rng) {
            Ok(Some((process, resource))) => {
                self.report.releases += 1;
                trace!(%process, %resource, "Released one unit");
            }
            Ok(None) => trace!("Nothing held, skipping release"),
            Err(e) => debug!(error = %e, "Release failed"),
        }
    }

    fn run_safety_check(&mut self) {
        match self.handle.check_safety() {
            Ok(SafetyVerdict::Safe(sequence)) => {
                self.report.safety_checks += 1;
                trace!(sequence = ?sequence, "Ledger safe");
            }
            Ok(SafetyVerdict::Unsafe(unfinished)) => {
                self.report.safety_checks += 1;
                self.report.unsafe_verdicts += 1;
                warn!(unfinished = ?unfinished, "Potential deadlock, running recovery");

                match self.handle.recover() {
                    Ok(outcome) if outcome.is_reclaimed() => {
                        self.report.recoveries += 1;
                        debug!(outcome = ?outcome, "Recovery reclaimed a unit");
                    }
                    Ok(outcome) => debug!(outcome = ?outcome, "Recovery had nothing to reclaim"),
                    Err(e) => debug!(error = %e, "Recovery failed"),
                }
            }
            Err(OperationError::AlreadyRunning) => self.report.skipped_checks += 1,
            Err(e) => debug!(error = %e, "Safety check failed"),
        }
    }
}
