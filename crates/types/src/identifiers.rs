//! Simulated process and resource class identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Count of interchangeable resource units.
///
/// Every ledger quantity (allocation, claim, availability, totals) is a
/// non-negative integer of this width.
pub type Units = u32;

/// Simulated process identifier, an index in `[0, P)`.
///
/// Not an OS process: it has no lifecycle beyond the ledger rows indexed by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Row index into the ledger matrices.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Resource class identifier, an index in `[0, R)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Column index into the ledger matrices.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}
