//! Banker's-algorithm safety check.
//!
//! Given a ledger, decides whether some order exists in which every process
//! can obtain its remaining claim, finish, and return what it holds.
//!
//! # Algorithm
//!
//! ```text
//! work   = available
//! finish = [false; P]
//! loop:
//!     p = first unfinished process (lowest index) with
//!         max_claim[p][r] - allocation[p][r] <= work[r] for every r
//!     if none: break
//!     finish[p] = true; work += allocation[p]; sequence.push(p)
//! safe iff every finish[p]
//! ```
//!
//! Each pass restarts from process 0, so the sequence is a deterministic
//! function of the ledger.

use crate::ledger::ResourceLedger;
use banker_types::{ProcessId, SafetyVerdict, Units};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Runs safety checks, owning the `work`/`finish` scratch space.
///
/// The scratch is reset at the start of every check. The `finish` vector of
/// the most recent check is kept for the recovery policy.
#[derive(Debug, Clone, Default)]
pub struct SafetyChecker {
    work: Vec<Units>,
    finish: Vec<bool>,
    checked: bool,
}

impl SafetyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the Banker's algorithm over `ledger`.
    pub fn check(&mut self, ledger: &ResourceLedger) -> SafetyVerdict {
        let num_processes = ledger.num_processes();

        self.work.clear();
        self.work.extend_from_slice(&ledger.available);
        self.finish.clear();
        self.finish.resize(num_processes, false);
        self.checked = true;

        let mut sequence = Vec::with_capacity(num_processes);
        while let Some(p) =
            (0..num_processes).find(|&p| !self.finish[p] && self.can_finish(ledger, p))
        {
            self.finish[p] = true;
            for (work, held) in self.work.iter_mut().zip(&ledger.allocation[p]) {
                *work += held;
            }
            sequence.push(ProcessId(p as u32));
            trace!(process = p, work = ?self.work, "Process can finish");
        }

        if sequence.len() == num_processes {
            debug!(sequence = ?sequence, "Ledger is safe");
            SafetyVerdict::Safe(sequence)
        } else {
            let unfinished: BTreeSet<ProcessId> = self
                .finish
                .iter()
                .enumerate()
                .filter(|(_, done)| !**done)
                .map(|(p, _)| ProcessId(p as u32))
                .collect();
            debug!(unfinished = ?unfinished, work = ?self.work, "Ledger is unsafe");
            SafetyVerdict::Unsafe(unfinished)
        }
    }

    /// Whether `p`'s remaining need fits in the current `work` vector.
    fn can_finish(&self, ledger: &ResourceLedger, p: usize) -> bool {
        ledger.max_claim[p]
            .iter()
            .zip(&ledger.allocation[p])
            .zip(&self.work)
            .all(|((claim, held), work)| claim - held <= *work)
    }

    /// `finish` flags of the most recent check, `None` before the first one.
    pub fn last_finish(&self) -> Option<&[bool]> {
        self.checked.then_some(self.finish.as_slice())
    }
}
