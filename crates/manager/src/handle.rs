//! Shared ledger state and the handle every caller goes through.

use crate::stats::EngineStats;
use banker_ledger::{recover, LedgerError, LedgerSnapshot, ResourceLedger, SafetyChecker};
use banker_types::{
    EngineState, ProcessId, RecoveryOutcome, RequestOutcome, ResourceId, SafetyVerdict, Units,
};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Errors from ledger operations made through a [`LedgerHandle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("Ledger rejected the operation: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Safety check already in progress")]
    AlreadyRunning,

    #[error("Engine is stopped")]
    Stopped,
}

impl OperationError {
    /// Whether this is a request over the process's maximum claim.
    pub fn is_claim_exceeded(&self) -> bool {
        matches!(self, OperationError::Ledger(LedgerError::ClaimExceeded { .. }))
    }
}

/// Everything guarded by the ledger lock.
pub(crate) struct Inner {
    pub(crate) state: EngineState,
    pub(crate) ledger: ResourceLedger,
    pub(crate) checker: SafetyChecker,
}

impl Inner {
    fn ensure_accepting(&self) -> Result<(), OperationError> {
        if self.state.accepts_operations() {
            Ok(())
        } else {
            Err(OperationError::Stopped)
        }
    }
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    /// Set while a safety check is in flight, including while it waits for
    /// the lock.
    pub(crate) check_active: AtomicBool,
    pub(crate) stats: EngineStats,
}

/// Claims the in-progress flag for one safety check.
struct CheckGuard<'a>(&'a AtomicBool);

impl<'a> CheckGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cloneable access to a manager's ledger.
///
/// All operations take one exclusive lock over the whole ledger, so they
/// are linearizable. The handle can be shared freely across threads and
/// tasks; the traffic generator uses one too.
#[derive(Clone)]
pub struct LedgerHandle {
    pub(crate) shared: Arc<Shared>,
}

impl std::fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("state", &self.state())
            .field("check_active", &self.shared.check_active.load(Ordering::Relaxed))
            .finish()
    }
}

impl LedgerHandle {
    pub(crate) fn new(ledger: ResourceLedger) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: EngineState::Idle,
                    ledger,
                    checker: SafetyChecker::new(),
                }),
                check_active: AtomicBool::new(false),
                stats: EngineStats::default(),
            }),
        }
    }

    /// Request `amount` units of `resource` for `process`.
    ///
    /// Never blocks waiting for units: an unsatisfiable request returns
    /// [`RequestOutcome::Pending`] immediately.
    pub fn request(
        &self,
        process: ProcessId,
        resource: ResourceId,
        amount: Units,
    ) -> Result<RequestOutcome, OperationError> {
        let result = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_accepting()?;
            inner.ledger.request(process, resource, amount)
        };

        self.shared.stats.record_request(&result);
        Ok(result?)
    }

    /// Release up to `amount` units; returns how many were released.
    pub fn release(
        &self,
        process: ProcessId,
        resource: ResourceId,
        amount: Units,
    ) -> Result<Units, OperationError> {
        let released = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_accepting()?;
            inner.ledger.release(process, resource, amount)?
        };

        self.shared.stats.record_release(released, released < amount);
        Ok(released)
    }

    /// Release one unit from a `(process, resource)` pair chosen uniformly
    /// among those holding units.
    ///
    /// The choice and the release happen under the same lock, so the chosen
    /// pair always has a unit to give back. Returns `None` when nothing is
    /// held.
    pub fn release_random_held<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<Option<(ProcessId, ResourceId)>, OperationError> {
        let (process, resource, released) = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_accepting()?;
            let held = inner.ledger.held_units();
            let Some(&(process, resource)) = held.choose(rng) else {
                return Ok(None);
            };
            let released = inner.ledger.release(process, resource, 1)?;
            (process, resource, released)
        };

        self.shared.stats.record_release(released, released < 1);
        Ok(Some((process, resource)))
    }

    /// Run the Banker's algorithm over the current ledger.
    ///
    /// Not reentrant: if another check is in flight this returns
    /// [`OperationError::AlreadyRunning`] at once instead of waiting.
    pub fn check_safety(&self) -> Result<SafetyVerdict, OperationError> {
        let Some(_guard) = CheckGuard::try_acquire(&self.shared.check_active) else {
            debug!("Safety check already running, skipping");
            self.shared.stats.record_safety_check_skipped();
            return Err(OperationError::AlreadyRunning);
        };

        let (verdict, elapsed) = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_accepting()?;
            let started = Instant::now();
            let Inner {
                ledger, checker, ..
            } = &mut *inner;
            let verdict = checker.check(ledger);
            (verdict, started.elapsed())
        };

        if let SafetyVerdict::Unsafe(unfinished) = &verdict {
            warn!(unfinished = ?unfinished, "Unsafe state detected");
        }
        self.shared
            .stats
            .record_safety_check(&verdict, elapsed.as_secs_f64());
        Ok(verdict)
    }

    /// Reclaim one unit from the first process the last check could not
    /// finish.
    ///
    /// Does not re-check safety. Call [`check_safety`](Self::check_safety)
    /// again afterwards; several passes may be needed.
    pub fn recover(&self) -> Result<RecoveryOutcome, OperationError> {
        let outcome = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_accepting()?;
            let Inner {
                ledger, checker, ..
            } = &mut *inner;
            match checker.last_finish() {
                Some(finish) => recover(ledger, finish),
                None => {
                    trace!("Recovery requested before any safety check");
                    RecoveryOutcome::NoOp { victim: None }
                }
            }
        };

        self.shared.stats.record_recovery(&outcome);
        Ok(outcome)
    }

    /// Consistent copy of the ledger. Available in every state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.shared.inner.lock().ledger.snapshot()
    }

    /// Every `(process, resource)` pair currently holding units.
    pub fn held_units(&self) -> Result<Vec<(ProcessId, ResourceId)>, OperationError> {
        let inner = self.shared.inner.lock();
        inner.ensure_accepting()?;
        Ok(inner.ledger.held_units())
    }

    /// `(processes, resources)` of the ledger.
    pub fn dimensions(&self) -> (usize, usize) {
        let inner = self.shared.inner.lock();
        (inner.ledger.num_processes(), inner.ledger.num_resources())
    }

    pub fn state(&self) -> EngineState {
        self.shared.inner.lock().state
    }

    pub fn stats(&self) -> &EngineStats {
        &self.shared.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::thread;
    use std::time::Duration;

    const P0: ProcessId = ProcessId(0);
    const P1: ProcessId = ProcessId(1);
    const R0: ResourceId = ResourceId(0);

    fn handle(total: Vec<Units>, claims: Vec<Vec<Units>>) -> LedgerHandle {
        LedgerHandle::new(ResourceLedger::from_parts(total, claims).unwrap())
    }

    #[test]
    fn test_concurrent_check_fails_fast() {
        let handle = handle(vec![3], vec![vec![2], vec![2]]);

        // Hold the ledger lock so the first check parks inside its critical
        // section with the in-progress flag set.
        let lock = handle.shared.inner.lock();

        let first = {
            let handle = handle.clone();
            thread::spawn(move || handle.check_safety())
        };
        while !handle.shared.check_active.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(handle.check_safety(), Err(OperationError::AlreadyRunning));
        assert_eq!(handle.stats().checks_skipped.load(Ordering::Relaxed), 1);

        drop(lock);
        let verdict = first.join().unwrap().unwrap();
        assert_eq!(verdict, SafetyVerdict::Safe(vec![P0, P1]));

        // flag released once the first check is done
        assert!(handle.check_safety().is_ok());
    }

    #[test]
    fn test_stopped_rejects_operations() {
        let handle = handle(vec![3], vec![vec![2], vec![2]]);
        handle.request(P0, R0, 1).unwrap();
        handle.shared.inner.lock().state = EngineState::Stopped;

        assert_eq!(handle.request(P0, R0, 1), Err(OperationError::Stopped));
        assert_eq!(handle.release(P0, R0, 1), Err(OperationError::Stopped));
        assert_eq!(handle.check_safety(), Err(OperationError::Stopped));
        assert_eq!(handle.recover(), Err(OperationError::Stopped));
        assert_eq!(handle.held_units(), Err(OperationError::Stopped));

        // a stopped check must still release the in-progress flag
        assert!(!handle.shared.check_active.load(Ordering::Acquire));

        // diagnostics still readable
        assert_eq!(handle.snapshot().allocation[0][0], 1);
    }

    #[test]
    fn test_recover_before_any_check_is_noop() {
        let handle = handle(vec![2], vec![vec![2], vec![2]]);
        handle.request(P0, R0, 1).unwrap();

        assert_eq!(handle.recover(), Ok(RecoveryOutcome::NoOp { victim: None }));
        assert_eq!(handle.snapshot().available, vec![1]);
    }

    #[test]
    fn test_release_random_held_only_picks_held_pairs() {
        let handle = handle(vec![3, 2], vec![vec![2, 0], vec![0, 2]]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        assert_eq!(handle.release_random_held(&mut rng), Ok(None));

        handle.request(P0, R0, 2).unwrap();
        handle.request(P1, ResourceId(1), 1).unwrap();

        let mut released = Vec::new();
        while let Some(pair) = handle.release_random_held(&mut rng).unwrap() {
            released.push(pair);
        }
        released.sort();
        assert_eq!(released, vec![(P0, R0), (P0, R0), (P1, ResourceId(1))]);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.available, vec![3, 2]);
        assert_eq!(handle.stats().units_released.load(Ordering::Relaxed), 3);
        assert_eq!(handle.stats().releases_clamped.load(Ordering::Relaxed), 0);

        handle.shared.inner.lock().state = EngineState::Stopped;
        assert_eq!(
            handle.release_random_held(&mut rng),
            Err(OperationError::Stopped)
        );
    }

    #[test]
    fn test_stats_follow_operations() {
        let handle = handle(vec![3], vec![vec![2], vec![2]]);

        handle.request(P0, R0, 2).unwrap();
        handle.request(P1, R0, 2).unwrap();
        assert!(handle.request(P0, R0, 1).unwrap_err().is_claim_exceeded());
        assert!(handle.request(ProcessId(9), R0, 1).is_err());
        assert_eq!(handle.release(P0, R0, 3), Ok(2));
        handle.check_safety().unwrap();

        let stats = handle.stats();
        assert_eq!(stats.requests_granted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.requests_pending.load(Ordering::Relaxed), 1);
        assert_eq!(stats.requests_claim_exceeded.load(Ordering::Relaxed), 1);
        assert_eq!(stats.requests_invalid.load(Ordering::Relaxed), 1);
        assert_eq!(stats.units_released.load(Ordering::Relaxed), 2);
        assert_eq!(stats.releases_clamped.load(Ordering::Relaxed), 1);
        assert_eq!(stats.checks_completed(), 1);
    }
}
