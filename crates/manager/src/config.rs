//! Configuration types for the deadlock manager.

use banker_ledger::LedgerConfig;
use banker_types::Units;
use std::time::Duration;

/// Pacing and odds of the background traffic generator.
///
/// Each tick the generator independently:
/// - issues a request with probability `1 / base_odds`
/// - releases one held unit with probability `1 / (2 * base_odds)`
/// - runs a safety check (and recovery if unsafe) with probability
///   `1 / (3 * base_odds)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrafficConfig {
    /// Sleep between ticks.
    pub tick_interval: Duration,

    /// `k1` in the odds above.
    pub base_odds: u32,

    /// Requests ask for `1..=max_request_amount` units.
    pub max_request_amount: Units,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            base_odds: 15,
            max_request_amount: 2,
        }
    }
}

impl TrafficConfig {
    /// Set the sleep between ticks.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the base odds `k1`.
    pub fn with_base_odds(mut self, odds: u32) -> Self {
        self.base_odds = odds;
        self
    }

    /// Set the largest amount a single request asks for.
    pub fn with_max_request_amount(mut self, amount: Units) -> Self {
        self.max_request_amount = amount;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.base_odds == 0 || self.base_odds.checked_mul(3).is_none() {
            return Err(ConfigError::InvalidOdds(self.base_odds));
        }
        if self.max_request_amount == 0 {
            return Err(ConfigError::ZeroRequestAmount);
        }
        Ok(())
    }
}

/// Configuration for a [`DeadlockManager`](crate::DeadlockManager).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Ledger dimensions and initialisation ranges.
    pub ledger: LedgerConfig,

    /// Background traffic settings.
    pub traffic: TrafficConfig,

    /// Seed for ledger initialisation and traffic decisions.
    /// `None` seeds from the wall clock.
    pub seed: Option<u64>,
}

impl ManagerConfig {
    /// Create a configuration with the given dimensions and default ranges.
    pub fn new(num_processes: usize, num_resources: usize) -> Self {
        Self {
            ledger: LedgerConfig::new(num_processes, num_resources),
            ..Default::default()
        }
    }

    /// Set the ledger configuration.
    pub fn with_ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }

    /// Set the traffic configuration.
    pub fn with_traffic(mut self, traffic: TrafficConfig) -> Self {
        self.traffic = traffic;
        self
    }

    /// Set a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        self.traffic.validate()
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Ledger configuration: {0}")]
    Ledger(#[from] banker_ledger::ConfigError),

    #[error("Tick interval must be greater than 0")]
    ZeroTickInterval,

    #[error("Base odds must be between 1 and u32::MAX / 3, got {0}")]
    InvalidOdds(u32),

    #[error("Maximum request amount must be greater than 0")]
    ZeroRequestAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(ManagerConfig::default().validate(), Ok(()));
        assert_eq!(ManagerConfig::default().traffic.base_odds, 15);
        assert_eq!(ManagerConfig::default().ledger.num_processes, 4);
    }

    #[test]
    fn test_traffic_validation() {
        let config = TrafficConfig::default().with_tick_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickInterval));

        let config = TrafficConfig::default().with_base_odds(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidOdds(0)));

        let config = TrafficConfig::default().with_base_odds(u32::MAX);
        assert_eq!(config.validate(), Err(ConfigError::InvalidOdds(u32::MAX)));

        let config = TrafficConfig::default().with_max_request_amount(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRequestAmount));
    }

    #[test]
    fn test_ledger_errors_propagate() {
        let config = ManagerConfig::new(0, 4);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Ledger(banker_ledger::ConfigError::NoProcesses))
        );
    }
}
