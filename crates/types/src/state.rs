//! Engine lifecycle state.

use serde::Serialize;
use std::fmt;

/// Lifecycle of a deadlock manager.
///
/// ```text
/// Idle ──start──▶ Running ──stop──▶ ShuttingDown ──task exited──▶ Stopped
///   └──────────────────stop───────────────────────────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Ledger built, traffic task not launched.
    #[default]
    Idle,
    /// Traffic task running.
    Running,
    /// Stop requested, waiting for the traffic task to exit.
    ShuttingDown,
    /// Terminal. No ledger operations are accepted.
    Stopped,
}

impl EngineState {
    /// Returns a string representation for metrics/logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::ShuttingDown => "shutting_down",
            EngineState::Stopped => "stopped",
        }
    }

    /// Numeric code for the state gauge.
    pub fn as_gauge(&self) -> f64 {
        match self {
            EngineState::Idle => 0.0,
            EngineState::Running => 1.0,
            EngineState::ShuttingDown => 2.0,
            EngineState::Stopped => 3.0,
        }
    }

    /// Whether ledger operations are still accepted.
    pub fn accepts_operations(&self) -> bool {
        !matches!(self, EngineState::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
