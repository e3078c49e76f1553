//! Non-error outcomes of ledger operations.
//!
//! None of these are failures: a pending request, an unsafe verdict and a
//! no-op recovery are all ordinary results every caller must handle.

use crate::{ProcessId, ResourceId};
use serde::Serialize;
use std::collections::BTreeSet;

/// Result of a request that did not violate the caller's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Units moved from `available` into the process's allocation.
    Granted,
    /// Not enough units available. The amount is recorded as the process's
    /// unsatisfied request and is not retried automatically.
    Pending,
}

impl RequestOutcome {
    /// Returns a string representation for metrics/logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Granted => "granted",
            RequestOutcome::Pending => "pending",
        }
    }
}

/// Verdict of a Banker's-algorithm safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyVerdict {
    /// Every process can finish; the finishing order found by the scan.
    Safe(Vec<ProcessId>),
    /// No safe order exists; the processes that could not be shown to finish.
    Unsafe(BTreeSet<ProcessId>),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe(_))
    }

    /// Safe sequence, if the state is safe.
    pub fn safe_sequence(&self) -> Option<&[ProcessId]> {
        match self {
            SafetyVerdict::Safe(sequence) => Some(sequence),
            SafetyVerdict::Unsafe(_) => None,
        }
    }

    /// Returns a string representation for metrics/logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyVerdict::Safe(_) => "safe",
            SafetyVerdict::Unsafe(_) => "unsafe",
        }
    }
}

/// What a single recovery pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// One unit of `resource` was taken back from `process`.
    Reclaimed {
        process: ProcessId,
        resource: ResourceId,
    },
    /// Nothing was reclaimed. `victim` is the first unfinished process if
    /// there was one (it held no units), `None` if every process finished
    /// or no check had been recorded.
    NoOp { victim: Option<ProcessId> },
}

impl RecoveryOutcome {
    pub fn is_reclaimed(&self) -> bool {
        matches!(self, RecoveryOutcome::Reclaimed { .. })
    }

    /// Returns a string representation for metrics/logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryOutcome::Reclaimed { .. } => "reclaimed",
            RecoveryOutcome::NoOp { .. } => "noop",
        }
    }
}
