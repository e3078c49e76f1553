//! Concurrent deadlock manager.
//!
//! Wraps the synchronous ledger from `banker-ledger` with a single coarse
//! lock, a lifecycle, and a background traffic task:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DeadlockManager                        │
//! │                                                              │
//! │   TrafficGenerator (tokio task)      other callers           │
//! │            │                              │                  │
//! │            └──────────┬───────────────────┘                  │
//! │                       ▼                                      │
//! │                 LedgerHandle (Clone)                         │
//! │   request / release / check_safety / recover / snapshot      │
//! │                       │                                      │
//! │                       ▼                                      │
//! │   Mutex { EngineState, ResourceLedger, SafetyChecker }       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every ledger-touching operation takes the same lock, so operations are
//! linearizable and a safety check always sees a consistent ledger.
//!
//! # Example
//!
//! ```no_run
//! use banker_manager::{DeadlockManager, ManagerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DeadlockManager::new(ManagerConfig::default().with_seed(42))?;
//! manager.start()?;
//!
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!
//! let report = manager.stop().await;
//! println!("{} ticks, {} recoveries", report.ticks, report.recoveries);
//! # Ok(())
//! # }
//! ```

mod config;
mod handle;
mod manager;
pub mod metrics;
mod stats;
mod traffic;

pub use config::{ConfigError, ManagerConfig, TrafficConfig};
pub use handle::{LedgerHandle, OperationError};
pub use manager::{DeadlockManager, StartError};
pub use stats::EngineStats;
pub use traffic::{TrafficGenerator, TrafficReport};

pub use banker_ledger::{LedgerConfig, LedgerError, LedgerSnapshot, ResourceLedger};
pub use banker_types::{
    EngineState, ProcessId, RecoveryOutcome, RequestOutcome, ResourceId, SafetyVerdict, Units,
};
