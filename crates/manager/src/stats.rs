//! In-process operation counters.

use crate::metrics;
use banker_ledger::LedgerError;
use banker_types::{RecoveryOutcome, RequestOutcome, SafetyVerdict, Units};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for every ledger operation, shared by all handles of a manager.
///
/// Each update is mirrored to the Prometheus metrics.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Requests that were granted.
    pub requests_granted: AtomicU64,
    /// Requests recorded as pending.
    pub requests_pending: AtomicU64,
    /// Requests rejected for exceeding the maximum claim.
    pub requests_claim_exceeded: AtomicU64,
    /// Requests rejected for bad indices or a zero amount.
    pub requests_invalid: AtomicU64,
    /// Units returned by releases.
    pub units_released: AtomicU64,
    /// Releases that asked for more than was held.
    pub releases_clamped: AtomicU64,
    /// Safety checks that found a safe sequence.
    pub checks_safe: AtomicU64,
    /// Safety checks that found no safe sequence.
    pub checks_unsafe: AtomicU64,
    /// Safety checks refused because another was in flight.
    pub checks_skipped: AtomicU64,
    /// Recovery passes that reclaimed a unit.
    pub units_reclaimed: AtomicU64,
    /// Recovery passes that reclaimed nothing.
    pub recovery_noops: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_request(&self, result: &Result<RequestOutcome, LedgerError>) {
        match result {
            Ok(outcome) => {
                let counter = match outcome {
                    RequestOutcome::Granted => &self.requests_granted,
                    RequestOutcome::Pending => &self.requests_pending,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                metrics::record_request(*outcome);
            }
            Err(LedgerError::ClaimExceeded { .. }) => {
                self.requests_claim_exceeded.fetch_add(1, Ordering::Relaxed);
                metrics::record_request_rejected("claim_exceeded");
            }
            Err(_) => {
                self.requests_invalid.fetch_add(1, Ordering::Relaxed);
                metrics::record_request_rejected("invalid");
            }
        }
    }

    pub(crate) fn record_release(&self, released: Units, clamped: bool) {
        self.units_released
            .fetch_add(u64::from(released), Ordering::Relaxed);
        if clamped {
            self.releases_clamped.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_release(released, clamped);
    }

    pub(crate) fn record_safety_check(&self, verdict: &SafetyVerdict, latency_secs: f64) {
        let counter = match verdict {
            SafetyVerdict::Safe(_) => &self.checks_safe,
            SafetyVerdict::Unsafe(_) => &self.checks_unsafe,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_safety_check(verdict, latency_secs);
    }

    pub(crate) fn record_safety_check_skipped(&self) {
        self.checks_skipped.fetch_add(1, Ordering::Relaxed);
        metrics::record_safety_check_skipped();
    }

    pub(crate) fn record_recovery(&self, outcome: &RecoveryOutcome) {
        let counter = match outcome {
            RecoveryOutcome::Reclaimed { .. } => &self.units_reclaimed,
            RecoveryOutcome::NoOp { .. } => &self.recovery_noops,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_recovery(outcome);
    }

    /// Total safety checks that ran to completion.
    pub fn checks_completed(&self) -> u64 {
        self.checks_safe.load(Ordering::Relaxed) + self.checks_unsafe.load(Ordering::Relaxed)
    }

    /// Fraction of completed checks that were unsafe.
    pub fn unsafe_ratio(&self) -> f64 {
        let completed = self.checks_completed();
        if completed > 0 {
            self.checks_unsafe.load(Ordering::Relaxed) as f64 / completed as f64
        } else {
            0.0
        }
    }

    /// Print the counters to stdout.
    pub fn print(&self) {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        println!("\n=== Engine Stats ===");
        println!(
            "Requests:   granted {} | pending {} | claim exceeded {} | invalid {}",
            load(&self.requests_granted),
            load(&self.requests_pending),
            load(&self.requests_claim_exceeded),
            load(&self.requests_invalid),
        );
        println!(
            "Releases:   {} units | {} clamped",
            load(&self.units_released),
            load(&self.releases_clamped),
        );
        println!(
            "Checks:     safe {} | unsafe {} | skipped {} | unsafe ratio {:.2}",
            load(&self.checks_safe),
            load(&self.checks_unsafe),
            load(&self.checks_skipped),
            self.unsafe_ratio(),
        );
        println!(
            "Recoveries: reclaimed {} | no-op {}",
            load(&self.units_reclaimed),
            load(&self.recovery_noops),
        );
    }
}
