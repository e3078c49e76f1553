//! Read-only copy of a ledger for diagnostics.

use banker_types::{ProcessId, ResourceId, Units};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time copy of every ledger matrix.
///
/// Taken under the same lock as mutations, so it is never torn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Conserved total per resource class.
    pub total_units: Vec<Units>,
    /// Units not held by any process.
    pub available: Vec<Units>,
    /// `allocation[p][r]`.
    pub allocation: Vec<Vec<Units>>,
    /// `max_claim[p][r]`.
    pub max_claim: Vec<Vec<Units>>,
    /// `request[p][r]`, last unsatisfied request.
    pub request: Vec<Vec<Units>>,
}

impl LedgerSnapshot {
    /// Total units held by all processes, per resource class.
    pub fn allocated(&self) -> Vec<Units> {
        (0..self.total_units.len())
            .map(|r| self.allocation.iter().map(|row| row[r]).sum())
            .collect()
    }

    /// Units held by `process` across all resource classes.
    pub fn held_by(&self, process: ProcessId) -> Units {
        self.allocation
            .get(process.index())
            .map(|row| row.iter().sum())
            .unwrap_or(0)
    }

    /// Whether `available + allocated == total` for every resource and no
    /// allocation exceeds its claim.
    pub fn is_conserved(&self) -> bool {
        let totals_conserved = self
            .allocated()
            .iter()
            .zip(&self.available)
            .zip(&self.total_units)
            .all(|((allocated, available), total)| {
                u64::from(*allocated) + u64::from(*available) == u64::from(*total)
            });
        let claims_respected = self
            .allocation
            .iter()
            .zip(&self.max_claim)
            .all(|(held, claim)| held.iter().zip(claim).all(|(h, c)| h <= c));
        totals_conserved && claims_respected
    }

    /// Units of `resource` held by `process`, 0 if out of range.
    pub fn allocation_of(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.allocation
            .get(process.index())
            .and_then(|row| row.get(resource.index()))
            .copied()
            .unwrap_or(0)
    }
}

impl fmt::Display for LedgerSnapshot {
    /// Renders a table of `held/claim` per process, with pending requests in
    /// brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}", "")?;
        for r in 0..self.total_units.len() {
            write!(f, "{:>10}", ResourceId(r as u32).to_string())?;
        }
        writeln!(f)?;

        write!(f, "{:<10}", "total")?;
        for total in &self.total_units {
            write!(f, "{:>10}", total)?;
        }
        writeln!(f)?;

        write!(f, "{:<10}", "available")?;
        for available in &self.available {
            write!(f, "{:>10}", available)?;
        }
        writeln!(f)?;

        for (p, row) in self.allocation.iter().enumerate() {
            write!(f, "{:<10}", ProcessId(p as u32).to_string())?;
            for (r, held) in row.iter().enumerate() {
                let claim = self.max_claim[p][r];
                let pending = self.request[p][r];
                let cell = if pending > 0 {
                    format!("{held}/{claim}[{pending}]")
                } else {
                    format!("{held}/{claim}")
                };
                write!(f, "{:>10}", cell)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ResourceLedger;
    use banker_types::{ProcessId, ResourceId};

    #[test]
    fn test_snapshot_reflects_ledger() {
        let mut ledger =
            ResourceLedger::from_parts(vec![3, 2], vec![vec![2, 1], vec![2, 2]]).unwrap();
        ledger.request(ProcessId(0), ResourceId(0), 2).unwrap();
        ledger.request(ProcessId(1), ResourceId(0), 2).unwrap();
        ledger.request(ProcessId(1), ResourceId(1), 1).unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.available, vec![1, 1]);
        assert_eq!(snapshot.allocated(), vec![2, 1]);
        assert_eq!(snapshot.held_by(ProcessId(1)), 1);
        assert_eq!(snapshot.request[1][0], 2);
        assert_eq!(snapshot.allocation_of(ProcessId(5), ResourceId(0)), 0);
        assert!(snapshot.is_conserved());

        let table = snapshot.to_string();
        assert!(table.contains("2/2"));
        assert!(table.contains("0/2[2]"));
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let ledger = ResourceLedger::from_parts(vec![4], vec![vec![1]]).unwrap();
        let snapshot = ledger.snapshot();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["total_units"], serde_json::json!([4]));
        assert_eq!(json["max_claim"], serde_json::json!([[1]]));

        let back: crate::LedgerSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
