//! Incremental deadlock recovery.
//!
//! One call reclaims at most one unit: the first resource (lowest index) held
//! by the first process (lowest index) that the last safety check could not
//! finish. Recovery does not re-check safety; callers run the checker again
//! on their own schedule, and several passes may be needed.

use crate::ledger::ResourceLedger;
use banker_types::{ProcessId, RecoveryOutcome, ResourceId};
use tracing::{debug, info};

/// Reclaim one unit from the first unfinished process in `finish`.
///
/// `finish` is the flag vector of the most recent safety check. If the
/// victim holds nothing the call is a no-op for this cycle.
pub fn recover(ledger: &mut ResourceLedger, finish: &[bool]) -> RecoveryOutcome {
    let Some(victim) = finish
        .iter()
        .take(ledger.num_processes())
        .position(|done| !done)
    else {
        debug!("No unfinished process, nothing to recover");
        return RecoveryOutcome::NoOp { victim: None };
    };
    let process = ProcessId(victim as u32);

    let Some(r) = ledger.allocation[victim].iter().position(|&held| held > 0) else {
        debug!(%process, "Recovery victim holds no units");
        return RecoveryOutcome::NoOp {
            victim: Some(process),
        };
    };
    let resource = ResourceId(r as u32);

    ledger.reclaim_unit(victim, r);
    info!(
        %process,
        %resource,
        available = ledger.available[r],
        "Reclaimed one unit to break deadlock"
    );

    RecoveryOutcome::Reclaimed { process, resource }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SafetyChecker;
    use banker_types::SafetyVerdict;

    const P0: ProcessId = ProcessId(0);
    const P1: ProcessId = ProcessId(1);
    const R0: ResourceId = ResourceId(0);
    const R1: ResourceId = ResourceId(1);

    /// Two processes each holding one of two units, each claiming both.
    fn mutual_wait() -> ResourceLedger {
        let mut ledger = ResourceLedger::from_parts(vec![2], vec![vec![2], vec![2]]).unwrap();
        ledger.request(P0, R0, 1).unwrap();
        ledger.request(P1, R0, 1).unwrap();
        ledger.request(P0, R0, 1).unwrap();
        ledger.request(P1, R0, 1).unwrap();
        ledger
    }

    #[test]
    fn test_reclaims_from_first_unfinished() {
        let mut ledger = mutual_wait();
        let mut checker = SafetyChecker::new();
        assert!(!checker.check(&ledger).is_safe());

        let before = ledger.clone();
        let outcome = recover(&mut ledger, checker.last_finish().unwrap());
        assert_eq!(
            outcome,
            RecoveryOutcome::Reclaimed {
                process: P0,
                resource: R0
            }
        );
        assert_eq!(ledger.allocation(P0, R0), before.allocation(P0, R0) - 1);
        assert_eq!(ledger.available(R0), before.available(R0) + 1);
        assert_eq!(ledger.allocation(P1, R0), before.allocation(P1, R0));
        assert_eq!(ledger.pending_request(P0, R0), before.pending_request(P0, R0));
        assert!(ledger.is_conserved());

        // P1 can now take the freed unit and finish, after which P0 can too
        assert_eq!(
            checker.check(&ledger),
            SafetyVerdict::Safe(vec![P1, P0])
        );
    }

    #[test]
    fn test_recovery_may_need_several_passes() {
        // P0 holds R0 (which nobody waits on) and one R1; P1 holds one R1.
        let mut ledger =
            ResourceLedger::from_parts(vec![1, 2], vec![vec![1, 2], vec![0, 2]]).unwrap();
        ledger.request(P0, R0, 1).unwrap();
        ledger.request(P0, R1, 1).unwrap();
        ledger.request(P1, R1, 1).unwrap();

        let mut checker = SafetyChecker::new();
        assert!(!checker.check(&ledger).is_safe());

        // first pass takes R0 from P0, which does not help
        assert_eq!(
            recover(&mut ledger, checker.last_finish().unwrap()),
            RecoveryOutcome::Reclaimed {
                process: P0,
                resource: R0
            }
        );
        assert_eq!(
            checker.check(&ledger),
            SafetyVerdict::Unsafe([P0, P1].into_iter().collect())
        );

        // second pass takes R1 from P0
        assert_eq!(
            recover(&mut ledger, checker.last_finish().unwrap()),
            RecoveryOutcome::Reclaimed {
                process: P0,
                resource: R1
            }
        );
        assert_eq!(checker.check(&ledger), SafetyVerdict::Safe(vec![P1, P0]));
        assert!(ledger.is_conserved());
    }

    #[test]
    fn test_victim_holding_nothing_is_noop() {
        // P0 holds nothing but cannot finish; P1 and P2 deadlock on R0.
        let mut ledger =
            ResourceLedger::from_parts(vec![2], vec![vec![2], vec![2], vec![2]]).unwrap();
        ledger.request(ProcessId(1), R0, 1).unwrap();
        ledger.request(ProcessId(2), R0, 1).unwrap();

        let mut checker = SafetyChecker::new();
        assert!(!checker.check(&ledger).is_safe());

        let before = ledger.clone();
        let outcome = recover(&mut ledger, checker.last_finish().unwrap());
        assert_eq!(outcome, RecoveryOutcome::NoOp { victim: Some(P0) });
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_all_finished_is_noop() {
        let mut ledger = ResourceLedger::from_parts(vec![2], vec![vec![1]]).unwrap();
        ledger.request(P0, R0, 1).unwrap();
        let before = ledger.clone();

        assert_eq!(
            recover(&mut ledger, &[true]),
            RecoveryOutcome::NoOp { victim: None }
        );
        assert_eq!(recover(&mut ledger, &[]), RecoveryOutcome::NoOp { victim: None });
        assert_eq!(ledger, before);
    }
}
