//! Iteration and wall-clock limits for a run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Upper bounds on a single run. Immutable once the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBudget {
    /// Maximum number of steps the scratchpad may hold
    pub max_iterations: usize,
    /// Maximum wall-clock time, checked before each reasoning call
    pub max_duration: Duration,
}

impl Default for RunBudget {
    fn default() -> Self {
        Self {
            max_iterations: 12,
            max_duration: Duration::from_secs(300),
        }
    }
}

impl RunBudget {
    /// Create a budget
    pub fn new(max_iterations: usize, max_duration: Duration) -> Self {
        Self {
            max_iterations,
            max_duration,
        }
    }

    /// Report which dimension is spent, if any.
    ///
    /// The iteration count is checked first so that a zero-iteration budget
    /// is reported as such regardless of timing.
    pub fn check(&self, elapsed: Duration, steps_taken: usize) -> Option<BudgetExhaustion> {
        if steps_taken >= self.max_iterations {
            Some(BudgetExhaustion::Iterations)
        } else if elapsed >= self.max_duration {
            Some(BudgetExhaustion::Duration)
        } else {
            None
        }
    }
}

/// The budget dimension that ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetExhaustion {
    /// `max_iterations` steps were recorded
    Iterations,
    /// `max_duration` elapsed
    Duration,
}

impl fmt::Display for BudgetExhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iterations => f.write_str("iteration limit"),
            Self::Duration => f.write_str("time limit"),
        }
    }
}
