//! Report persistence
//!
//! Reports are written as UTF-8 markdown named `{prefix}YYYYMMDD_HHMMSS.md`
//! using the report's local generation time.

use crate::error::Result;
use agent_core::Report;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name prefix for deep research reports
pub const DEEP_RESEARCH_PREFIX: &str = "deep_research_";

/// File name prefix for standard briefings
pub const BRIEFING_PREFIX: &str = "ai_analysis_";

/// Destination for finished reports
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Persist the report, returning where it went if anywhere
    async fn publish(&self, report: &Report) -> Result<Option<PathBuf>>;
}

/// Writes reports into a directory, creating it when missing
#[derive(Debug, Clone)]
pub struct FileReportPublisher {
    dir: PathBuf,
    prefix: String,
}

impl FileReportPublisher {
    /// Publisher for deep research reports
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEEP_RESEARCH_PREFIX.to_string(),
        }
    }

    /// Use another file name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the report would be written to
    pub fn path_for(&self, report: &Report) -> PathBuf {
        self.dir.join(format!(
            "{}{}.md",
            self.prefix,
            report.generated_at.format("%Y%m%d_%H%M%S")
        ))
    }
}

#[async_trait]
impl ReportPublisher for FileReportPublisher {
    async fn publish(&self, report: &Report) -> Result<Option<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(report);
        tokio::fs::write(&path, report.body.as_bytes()).await?;
        info!(
            path = %path.display(),
            bytes = report.body.len(),
            reconstructed = report.is_reconstructed(),
            "Report saved"
        );
        Ok(Some(path))
    }
}

/// Publisher used when no output directory is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardPublisher;

#[async_trait]
impl ReportPublisher for DiscardPublisher {
    async fn publish(&self, report: &Report) -> Result<Option<PathBuf>> {
        debug!(bytes = report.body.len(), "No report directory configured, not saving");
        Ok(None)
    }
}

/// Read a persisted report back
pub async fn read_report(path: impl AsRef<Path>) -> Result<String> {
    Ok(tokio::fs::read_to_string(path).await?)
}
