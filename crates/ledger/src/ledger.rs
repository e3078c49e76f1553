//! Resource ledger and allocator operations.
//!
//! The ledger is the single piece of mutable state in the deadlock core.
//! Only [`ResourceLedger::request`], [`ResourceLedger::release`] and the
//! recovery policy mutate `allocation` and `available`, and each of them
//! preserves `available[r] + Σ_p allocation[p][r] == total_units[r]`.

use crate::config::{ConfigError, LedgerConfig};
use crate::snapshot::LedgerSnapshot;
use banker_types::{ProcessId, RequestOutcome, ResourceId, Units};
use rand::Rng;
use tracing::{debug, trace, warn};

/// Allocation, claim, availability and pending-request matrices for a fixed
/// set of processes and resource classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLedger {
    /// `allocation[p][r]`: units of `r` held by `p`.
    pub(crate) allocation: Vec<Vec<Units>>,
    /// `max_claim[p][r]`: immutable after construction.
    pub(crate) max_claim: Vec<Vec<Units>>,
    /// `available[r]`: units of `r` not held by anyone.
    pub(crate) available: Vec<Units>,
    /// `request[p][r]`: last unsatisfied request, 0 once granted.
    pub(crate) request: Vec<Vec<Units>>,
    /// Conserved total per resource class.
    pub(crate) total_units: Vec<Units>,
}

impl ResourceLedger {
    /// Build a ledger with explicit totals and maximum claims.
    ///
    /// Nothing is allocated: `available` starts equal to `total_units`.
    /// `max_claim` has one row per process and one column per resource.
    pub fn from_parts(
        total_units: Vec<Units>,
        max_claim: Vec<Vec<Units>>,
    ) -> Result<Self, LedgerError> {
        let num_resources = total_units.len();
        let num_processes = max_claim.len();

        if num_processes == 0 {
            return Err(ConfigError::NoProcesses.into());
        }
        if num_resources == 0 {
            return Err(ConfigError::NoResources.into());
        }
        if u32::try_from(num_processes).is_err() {
            return Err(ConfigError::TooManyProcesses(num_processes).into());
        }
        if u32::try_from(num_resources).is_err() {
            return Err(ConfigError::TooManyResources(num_resources).into());
        }

        for (p, row) in max_claim.iter().enumerate() {
            if row.len() != num_resources {
                return Err(LedgerError::DimensionMismatch {
                    process: ProcessId(p as u32),
                    expected: num_resources,
                    found: row.len(),
                });
            }
            for (r, (&claim, &total)) in row.iter().zip(&total_units).enumerate() {
                if claim > total {
                    return Err(LedgerError::ClaimExceedsTotal {
                        process: ProcessId(p as u32),
                        resource: ResourceId(r as u32),
                        claim,
                        total,
                    });
                }
            }
        }

        Ok(Self {
            allocation: vec![vec![0; num_resources]; num_processes],
            available: total_units.clone(),
            request: vec![vec![0; num_resources]; num_processes],
            max_claim,
            total_units,
        })
    }

    /// Build a ledger with totals and claims drawn from the configured ranges.
    pub fn random<R: Rng>(config: &LedgerConfig, rng: &mut R) -> Result<Self, LedgerError> {
        config.validate()?;

        let total_units: Vec<Units> = (0..config.num_resources)
            .map(|_| rng.gen_range(config.min_total_units..=config.max_total_units))
            .collect();
        let max_claim: Vec<Vec<Units>> = (0..config.num_processes)
            .map(|_| {
                (0..config.num_resources)
                    .map(|_| rng.gen_range(0..=config.max_claim_limit))
                    .collect()
            })
            .collect();

        debug!(
            processes = config.num_processes,
            resources = config.num_resources,
            totals = ?total_units,
            "Initialised random resource ledger"
        );

        Self::from_parts(total_units, max_claim)
    }

    /// Request `amount` units of `resource` for `process`.
    ///
    /// - Exceeding the maximum claim fails with [`LedgerError::ClaimExceeded`]
    ///   and leaves the ledger untouched.
    /// - If fewer than `amount` units are available the amount is recorded as
    ///   the process's pending request and [`RequestOutcome::Pending`] is
    ///   returned. Nothing is allocated.
    /// - Otherwise the units move from `available` to `allocation` and any
    ///   pending request for the pair is cleared.
    pub fn request(
        &mut self,
        process: ProcessId,
        resource: ResourceId,
        amount: Units,
    ) -> Result<RequestOutcome, LedgerError> {
        let (p, r) = self.indices(process, resource)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let held = self.allocation[p][r];
        let max_claim = self.max_claim[p][r];
        if held.checked_add(amount).map_or(true, |total| total > max_claim) {
            trace!(%process, %resource, held, amount, max_claim, "Request exceeds claim");
            return Err(LedgerError::ClaimExceeded {
                process,
                resource,
                held,
                requested: amount,
                max_claim,
            });
        }

        if amount > self.available[r] {
            self.request[p][r] = amount;
            debug!(
                %process,
                %resource,
                amount,
                available = self.available[r],
                "Request pending"
            );
            return Ok(RequestOutcome::Pending);
        }

        self.allocation[p][r] += amount;
        self.available[r] -= amount;
        self.request[p][r] = 0;
        debug!(
            %process,
            %resource,
            amount,
            available = self.available[r],
            "Request granted"
        );
        Ok(RequestOutcome::Granted)
    }

    /// Release up to `amount` units of `resource` held by `process`.
    ///
    /// Releasing more than is held is clamped to the held amount. Returns the
    /// number of units actually returned to `available`.
    pub fn release(
        &mut self,
        process: ProcessId,
        resource: ResourceId,
        amount: Units,
    ) -> Result<Units, LedgerError> {
        let (p, r) = self.indices(process, resource)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let held = self.allocation[p][r];
        let released = if amount > held {
            warn!(
                %process,
                %resource,
                requested = amount,
                held,
                "Release exceeds held units, clamping"
            );
            held
        } else {
            amount
        };

        self.allocation[p][r] -= released;
        self.available[r] += released;

        if released > 0 {
            debug!(
                %process,
                %resource,
                released,
                available = self.available[r],
                "Units released"
            );
        }
        Ok(released)
    }

    /// Take one unit of `resource` back from `process`.
    ///
    /// Used only by the recovery policy. Returns false if nothing is held.
    pub(crate) fn reclaim_unit(&mut self, p: usize, r: usize) -> bool {
        if self.allocation[p][r] == 0 {
            return false;
        }
        self.allocation[p][r] -= 1;
        self.available[r] += 1;
        true
    }

    fn indices(
        &self,
        process: ProcessId,
        resource: ResourceId,
    ) -> Result<(usize, usize), LedgerError> {
        let p = process.index();
        let r = resource.index();
        if p >= self.num_processes() {
            return Err(LedgerError::ProcessOutOfRange {
                process,
                num_processes: self.num_processes(),
            });
        }
        if r >= self.num_resources() {
            return Err(LedgerError::ResourceOutOfRange {
                resource,
                num_resources: self.num_resources(),
            });
        }
        Ok((p, r))
    }

    pub fn num_processes(&self) -> usize {
        self.allocation.len()
    }

    pub fn num_resources(&self) -> usize {
        self.total_units.len()
    }

    /// All process identifiers in index order.
    pub fn processes(&self) -> impl Iterator<Item = ProcessId> {
        (0..self.num_processes() as u32).map(ProcessId)
    }

    /// All resource identifiers in index order.
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> {
        (0..self.num_resources() as u32).map(ResourceId)
    }

    /// Units of `resource` held by `process`.
    ///
    /// # Panics
    ///
    /// Panics if either identifier is out of range.
    pub fn allocation(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.allocation[process.index()][resource.index()]
    }

    /// Declared maximum claim of `process` on `resource`.
    ///
    /// # Panics
    ///
    /// Panics if either identifier is out of range.
    pub fn max_claim(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.max_claim[process.index()][resource.index()]
    }

    /// Units the process may still request before reaching its claim.
    pub fn remaining_need(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.max_claim(process, resource) - self.allocation(process, resource)
    }

    /// Last unsatisfied request of `process` for `resource` (0 if none).
    pub fn pending_request(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.request[process.index()][resource.index()]
    }

    pub fn available(&self, resource: ResourceId) -> Units {
        self.available[resource.index()]
    }

    pub fn total_units(&self, resource: ResourceId) -> Units {
        self.total_units[resource.index()]
    }

    /// Every `(process, resource)` pair with at least one unit held, in
    /// process-then-resource order.
    pub fn held_units(&self) -> Vec<(ProcessId, ResourceId)> {
        let mut held = Vec::new();
        for (p, row) in self.allocation.iter().enumerate() {
            for (r, &units) in row.iter().enumerate() {
                if units > 0 {
                    held.push((ProcessId(p as u32), ResourceId(r as u32)));
                }
            }
        }
        held
    }

    /// Recorded unsatisfied requests as `(process, resource, amount)`.
    pub fn waiting(&self) -> Vec<(ProcessId, ResourceId, Units)> {
        let mut waiting = Vec::new();
        for (p, row) in self.request.iter().enumerate() {
            for (r, &amount) in row.iter().enumerate() {
                if amount > 0 {
                    waiting.push((ProcessId(p as u32), ResourceId(r as u32), amount));
                }
            }
        }
        waiting
    }

    /// Whether the conservation and claim invariants hold.
    pub fn is_conserved(&self) -> bool {
        let claims_respected = self
            .allocation
            .iter()
            .zip(&self.max_claim)
            .all(|(held, claim)| held.iter().zip(claim).all(|(h, c)| h <= c));

        let totals_conserved = (0..self.num_resources()).all(|r| {
            let allocated: u64 = self.allocation.iter().map(|row| u64::from(row[r])).sum();
            u64::from(self.available[r]) + allocated == u64::from(self.total_units[r])
        });

        claims_respected && totals_conserved
    }

    /// Copy of every matrix for read-only diagnostics.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            total_units: self.total_units.clone(),
            available: self.available.clone(),
            allocation: self.allocation.clone(),
            max_claim: self.max_claim.clone(),
            request: self.request.clone(),
        }
    }
}

/// Errors from ledger construction and allocator operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Request by {process} for {requested} of {resource} exceeds claim ({held} held, max {max_claim})")]
    ClaimExceeded {
        process: ProcessId,
        resource: ResourceId,
        held: Units,
        requested: Units,
        max_claim: Units,
    },

    #[error("Process {process} out of range (ledger has {num_processes} processes)")]
    ProcessOutOfRange {
        process: ProcessId,
        num_processes: usize,
    },

    #[error("Resource {resource} out of range (ledger has {num_resources} resources)")]
    ResourceOutOfRange {
        resource: ResourceId,
        num_resources: usize,
    },

    #[error("Amount must be greater than 0")]
    ZeroAmount,

    #[error("Claim row for {process} has {found} entries, expected {expected}")]
    DimensionMismatch {
        process: ProcessId,
        expected: usize,
        found: usize,
    },

    #[error("Claim of {process} on {resource} ({claim}) exceeds its total ({total})")]
    ClaimExceedsTotal {
        process: ProcessId,
        resource: ResourceId,
        claim: Units,
        total: Units,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
