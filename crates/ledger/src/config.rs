//! Configuration for randomized ledger initialisation.

use banker_types::Units;

/// Dimensions of the ledger and the ranges its initial values are drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Number of simulated processes (`P`).
    pub num_processes: usize,
    /// Number of resource classes (`R`).
    pub num_resources: usize,
    /// Smallest total unit count a resource class may be given.
    pub min_total_units: Units,
    /// Largest total unit count a resource class may be given.
    pub max_total_units: Units,
    /// Largest maximum claim a process may declare on one resource class.
    /// Claims are drawn from `0..=max_claim_limit`.
    pub max_claim_limit: Units,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            num_processes: 4,
            num_resources: 4,
            min_total_units: 3,
            max_total_units: 5,
            max_claim_limit: 2,
        }
    }
}

impl LedgerConfig {
    /// Create a configuration with the given dimensions and default ranges.
    pub fn new(num_processes: usize, num_resources: usize) -> Self {
        Self {
            num_processes,
            num_resources,
            ..Default::default()
        }
    }

    /// Set the range total units are drawn from.
    pub fn with_total_units(mut self, min: Units, max: Units) -> Self {
        self.min_total_units = min;
        self.max_total_units = max;
        self
    }

    /// Set the upper bound on per-resource maximum claims.
    pub fn with_max_claim_limit(mut self, limit: Units) -> Self {
        self.max_claim_limit = limit;
        self
    }

    /// Validate the configuration.
    ///
    /// A valid configuration always yields a ledger whose fresh state is safe:
    /// no claim can exceed the smallest possible total.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_processes == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if self.num_resources == 0 {
            return Err(ConfigError::NoResources);
        }
        if u32::try_from(self.num_processes).is_err() {
            return Err(ConfigError::TooManyProcesses(self.num_processes));
        }
        if u32::try_from(self.num_resources).is_err() {
            return Err(ConfigError::TooManyResources(self.num_resources));
        }
        if self.min_total_units == 0 {
            return Err(ConfigError::EmptyResource);
        }
        if self.min_total_units > self.max_total_units {
            return Err(ConfigError::InvertedTotals {
                min: self.min_total_units,
                max: self.max_total_units,
            });
        }
        if self.max_claim_limit > self.min_total_units {
            return Err(ConfigError::ClaimLimitTooLarge {
                limit: self.max_claim_limit,
                min_total: self.min_total_units,
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Number of processes must be greater than 0")]
    NoProcesses,

    #[error("Number of resources must be greater than 0")]
    NoResources,

    #[error("Too many processes: {0}")]
    TooManyProcesses(usize),

    #[error("Too many resources: {0}")]
    TooManyResources(usize),

    #[error("Every resource class needs at least one unit")]
    EmptyResource,

    #[error("Minimum total units ({min}) exceeds maximum ({max})")]
    InvertedTotals { min: Units, max: Units },

    #[error("Claim limit {limit} exceeds the smallest resource total {min_total}")]
    ClaimLimitTooLarge { limit: Units, min_total: Units },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(LedgerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_claims_larger_than_totals() {
        let config = LedgerConfig::default()
            .with_total_units(2, 5)
            .with_max_claim_limit(3);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ClaimLimitTooLarge {
                limit: 3,
                min_total: 2
            })
        );
    }

    #[test]
    fn test_rejects_empty_dimensions() {
        assert_eq!(
            LedgerConfig::new(0, 4).validate(),
            Err(ConfigError::NoProcesses)
        );
        assert_eq!(
            LedgerConfig::new(4, 0).validate(),
            Err(ConfigError::NoResources)
        );
    }

    #[test]
    fn test_rejects_inverted_totals() {
        let config = LedgerConfig::default()
            .with_total_units(5, 3)
            .with_max_claim_limit(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedTotals { min: 5, max: 3 })
        ));
    }
}
