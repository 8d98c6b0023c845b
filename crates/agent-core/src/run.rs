//! Outcome of a research run

use crate::{BudgetExhaustion, Error, Scratchpad};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The backend produced a final answer
    Completed,
    /// The budget ran out; the answer was assembled from observations
    Truncated,
    /// The reasoning backend failed
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Truncated => f.write_str("truncated"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Backend answer (completed) or synthesized report (truncated)
    pub final_answer: Option<String>,
    /// Steps taken, in order
    pub steps: Scratchpad,
    /// How the run ended
    pub status: RunStatus,
    /// Which budget dimension ran out, for truncated runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhausted: Option<BudgetExhaustion>,
    /// Backend error text, for failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Wall-clock time spent in the loop
    pub elapsed: Duration,
}

impl RunResult {
    /// Run ended with an answer from the backend
    pub fn completed(answer: impl Into<String>, steps: Scratchpad, elapsed: Duration) -> Self {
        Self {
            final_answer: Some(answer.into()),
            steps,
            status: RunStatus::Completed,
            exhausted: None,
            failure: None,
            elapsed,
        }
    }

    /// Run stopped on budget; `synthesized` is the mechanically assembled report
    pub fn truncated(
        synthesized: impl Into<String>,
        steps: Scratchpad,
        exhausted: BudgetExhaustion,
        elapsed: Duration,
    ) -> Self {
        Self {
            final_answer: Some(synthesized.into()),
            steps,
            status: RunStatus::Truncated,
            exhausted: Some(exhausted),
            failure: None,
            elapsed,
        }
    }

    /// Reasoning backend failed; steps gathered so far are kept
    pub fn failed(failure: impl Into<String>, steps: Scratchpad, elapsed: Duration) -> Self {
        Self {
            final_answer: None,
            steps,
            status: RunStatus::Failed,
            exhausted: None,
            failure: Some(failure.into()),
            elapsed,
        }
    }

    /// The final answer, if the run produced one
    pub fn answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Convert a failed run into its error, passing other runs through
    pub fn into_result(self) -> crate::Result<Self> {
        match self.status {
            RunStatus::Failed => Err(Error::ReasoningBackend(
                self.failure.unwrap_or_else(|| "unknown failure".to_string()),
            )),
            _ => Ok(self),
        }
    }
}
