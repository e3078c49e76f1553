//! Concurrent callers and the background traffic task.
//!
//! Verifies that the single ledger lock keeps the conservation invariant
//! intact under contention, and that shutdown waits for the traffic task.

use banker_manager::{
    DeadlockManager, EngineState, ManagerConfig, OperationError, ProcessId, ResourceId,
    TrafficConfig,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

fn busy_config(seed: u64) -> ManagerConfig {
    ManagerConfig::default().with_seed(seed).with_traffic(
        TrafficConfig::default()
            .with_tick_interval(Duration::from_millis(1))
            .with_base_odds(1),
    )
}

#[test]
fn test_threads_preserve_conservation() {
    let manager = DeadlockManager::new(busy_config(9)).unwrap();

    let workers: Vec<_> = (0..8u64)
        .map(|worker| {
            let handle = manager.handle();
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(worker);
                let mut skipped = 0u64;
                for _ in 0..2_000 {
                    let process = ProcessId(rng.gen_range(0..4));
                    let resource = ResourceId(rng.gen_range(0..4));
                    match rng.gen_range(0..4) {
                        0 | 1 => {
                            let _ = handle.request(process, resource, rng.gen_range(1..=2));
                        }
                        2 => {
                            handle.release(process, resource, 1).unwrap();
                        }
                        _ => match handle.check_safety() {
                            Ok(verdict) if !verdict.is_safe() => {
                                handle.recover().unwrap();
                            }
                            Ok(_) => {}
                            Err(OperationError::AlreadyRunning) => skipped += 1,
                            Err(e) => panic!("unexpected error: {e}"),
                        },
                    }
                }
                skipped
            })
        })
        .collect();

    let mut skipped = 0;
    for worker in workers {
        skipped += worker.join().unwrap();
    }

    let snapshot = manager.snapshot();
    assert!(snapshot.is_conserved());
    assert_eq!(
        manager.stats().checks_skipped.load(Ordering::Relaxed),
        skipped
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_traffic_runs_alongside_callers() {
    let manager = DeadlockManager::new(busy_config(21)).unwrap();
    manager.start().unwrap();
    assert_eq!(manager.state(), EngineState::Running);

    let handle = manager.handle();
    let caller = tokio::task::spawn_blocking(move || {
        for i in 0..500u32 {
            let process = ProcessId(i % 4);
            let resource = ResourceId((i / 4) % 4);
            let _ = handle.request(process, resource, 1);
            let _ = handle.release(process, resource, 1);
            let _ = handle.check_safety();
            assert!(handle.snapshot().is_conserved());
        }
    });
    caller.await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = manager.stop().await;

    assert_eq!(manager.state(), EngineState::Stopped);
    assert!(report.ticks > 0);
    assert!(report.requests > 0);
    assert!(manager.snapshot().is_conserved());

    // no ledger operations after shutdown
    let handle = manager.handle();
    assert_eq!(
        handle.request(ProcessId(0), ResourceId(0), 1),
        Err(OperationError::Stopped)
    );
}

#[tokio::test]
async fn test_drop_cancels_traffic() {
    let manager = DeadlockManager::new(busy_config(4)).unwrap();
    manager.start().unwrap();
    let handle = manager.handle();

    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(manager);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let requests = |handle: &banker_manager::LedgerHandle| {
        let stats = handle.stats();
        stats.requests_granted.load(Ordering::Relaxed)
            + stats.requests_pending.load(Ordering::Relaxed)
            + stats.requests_claim_exceeded.load(Ordering::Relaxed)
    };
    let settled = requests(&handle);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(requests(&handle), settled);

    // the engine stopped with the manager
    assert_eq!(handle.state(), EngineState::Stopped);
    assert_eq!(
        handle.request(ProcessId(0), ResourceId(0), 1),
        Err(OperationError::Stopped)
    );
}
