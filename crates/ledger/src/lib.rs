//! Deadlock detection core.
//!
//! This crate implements the resource ledger, the Banker's-algorithm safety
//! checker and the incremental recovery policy as pure, synchronous state.
//! It performs no I/O and takes no locks: callers that share a ledger
//! between threads serialize access themselves (see `banker-manager`).
//!
//! # Model
//!
//! A fixed set of `P` simulated processes holds units of `R` resource
//! classes. The ledger tracks four matrices:
//!
//! ```text
//! allocation[p][r]   units of r held by p        0 <= allocation <= max_claim
//! max_claim[p][r]    most units of r p may hold  fixed at construction
//! available[r]       units of r not held         available + Σ allocation == total
//! request[p][r]      last unsatisfied request    cleared on grant
//! ```
//!
//! # Components
//!
//! - [`ResourceLedger`] - Matrices plus the request/release allocator operations
//! - [`SafetyChecker`] - Banker's algorithm over a ledger, deterministic scan order
//! - [`recover`] - Reclaims one unit from the first unfinished process
//! - [`LedgerConfig`] - Dimensions and ranges for randomized initialisation
//! - [`LedgerSnapshot`] - Serializable copy of the ledger for diagnostics

mod config;
mod ledger;
mod recovery;
mod safety;
mod snapshot;

pub use config::{ConfigError, LedgerConfig};
pub use ledger::{LedgerError, ResourceLedger};
pub use recovery::recover;
pub use safety::SafetyChecker;
pub use snapshot::LedgerSnapshot;
