//! Final report handed to the publisher

use crate::{RunResult, RunStatus};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Where a report's body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    /// Written by the reasoning backend
    Completed,
    /// Assembled from observations after the budget ran out
    Reconstructed,
}

/// A markdown report ready to be persisted or rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Markdown body
    pub body: String,
    /// Local generation time, also used for the file name
    pub generated_at: DateTime<Local>,
    /// Provenance of the body
    pub source: ReportSource,
}

impl Report {
    /// Create a report stamped with the current local time
    pub fn new(body: impl Into<String>, source: ReportSource) -> Self {
        Self::with_timestamp(body, source, Local::now())
    }

    /// Create a report with an explicit timestamp
    pub fn with_timestamp(
        body: impl Into<String>,
        source: ReportSource,
        generated_at: DateTime<Local>,
    ) -> Self {
        Self {
            body: body.into(),
            generated_at,
            source,
        }
    }

    /// Build the report for a finished run. Failed runs have none.
    pub fn from_run(run: &RunResult) -> Option<Self> {
        let source = match run.status {
            RunStatus::Completed => ReportSource::Completed,
            RunStatus::Truncated => ReportSource::Reconstructed,
            RunStatus::Failed => return None,
        };
        run.answer().map(|body| Self::new(body, source))
    }

    /// Whether the body was assembled mechanically
    pub fn is_reconstructed(&self) -> bool {
        self.source == ReportSource::Reconstructed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BudgetExhaustion, Scratchpad};
    use std::time::Duration;

    #[test]
    fn test_from_completed_run() {
        let run = RunResult::completed("## Outlook", Scratchpad::new(), Duration::ZERO);
        let report = Report::from_run(&run).unwrap();
        assert_eq!(report.body, "## Outlook");
        assert_eq!(report.source, ReportSource::Completed);
        assert!(!report.is_reconstructed());
    }

    #[test]
    fn test_from_truncated_run() {
        let run = RunResult::truncated(
            "partial",
            Scratchpad::new(),
            BudgetExhaustion::Iterations,
            Duration::ZERO,
        );
        let report = Report::from_run(&run).unwrap();
        assert!(report.is_reconstructed());
    }

    #[test]
    fn test_failed_run_has_no_report() {
        let run = RunResult::failed("timeout", Scratchpad::new(), Duration::ZERO);
        assert!(Report::from_run(&run).is_none());
    }
}
