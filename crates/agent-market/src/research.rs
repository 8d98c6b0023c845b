//! Deep research service
//!
//! Wires the reasoning backend, the research tools and a report publisher
//! into one [`AgentLoop`] that can be run to completion or streamed.

use crate::api::MarketDataSource;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::report::{DiscardPublisher, FileReportPublisher, ReportPublisher};
use crate::tools::{ToolLimits, build_registry_with};
use crate::watchlist::FundWatchlist;
use agent_core::{Report, RunResult, Scratchpad};
use agent_llm::providers::OpenAIProvider;
use agent_runtime::{AgentLoop, LoopObserver, NoOpObserver, RelayHandle, StreamRelay};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Research task used when the caller does not supply one
pub const DEFAULT_TASK: &str = "Produce today's market research report for a fund investor. \
Cover the global index picture, the strongest and weakest sectors with their capital flows, \
gold and precious metals, turnover and intraday momentum of the Shanghai Composite, relevant \
news, and what it all means for the funds on the watchlist. End with concrete risks to watch.";

/// Result of a finished deep research run
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    /// The report, written by the backend or reconstructed
    pub report: Report,
    /// Where the report was saved, if a directory is configured
    pub saved_to: Option<PathBuf>,
    /// The underlying run
    pub run: RunResult,
}

/// Budgeted research agent with report persistence
pub struct DeepResearch {
    agent: Arc<AgentLoop>,
    publisher: Arc<dyn ReportPublisher>,
}

impl DeepResearch {
    pub fn new(agent: Arc<AgentLoop>, publisher: Arc<dyn ReportPublisher>) -> Self {
        Self { agent, publisher }
    }

    /// Build from configuration with an OpenAI-compatible backend
    pub fn from_config(
        config: &MarketConfig,
        source: Arc<dyn MarketDataSource>,
        watchlist: Arc<FundWatchlist>,
    ) -> Result<Self> {
        let llm_config = config.llm_config().ok_or_else(|| {
            MarketError::Config("LLM_API_KEY is not set, deep research is unavailable".to_string())
        })?;
        let provider = OpenAIProvider::with_config(llm_config)?;
        let registry = build_registry_with(source, watchlist, ToolLimits::from_config(config))?;

        let agent = AgentLoop::builder()
            .provider(Arc::new(provider))
            .tools(Arc::new(registry))
            .model(config.llm_model.clone())
            .budget(config.budget())
            .build()?;

        let publisher: Arc<dyn ReportPublisher> = match &config.report_dir {
            Some(dir) => Arc::new(FileReportPublisher::new(dir)),
            None => Arc::new(DiscardPublisher),
        };

        Ok(Self::new(Arc::new(agent), publisher))
    }

    pub fn agent(&self) -> &Arc<AgentLoop> {
        &self.agent
    }

    /// Run `task` to the end and publish the report
    pub async fn run(&self, task: &str) -> Result<ResearchOutcome> {
        self.run_with_observer(task, &NoOpObserver).await
    }

    /// Run `task` with progress callbacks and publish the report.
    ///
    /// A backend failure is returned as [`MarketError::Reasoning`]; budget
    /// exhaustion still yields a reconstructed report.
    pub async fn run_with_observer(
        &self,
        task: &str,
        observer: &dyn LoopObserver,
    ) -> Result<ResearchOutcome> {
        let run = self.agent.run_with_observer(task, observer).await.into_result()?;
        let report = Report::from_run(&run)
            .ok_or_else(|| MarketError::Reasoning("run ended without a report".to_string()))?;
        let saved_to = self.publisher.publish(&report).await?;

        info!(
            status = %run.status,
            steps = run.steps.len(),
            elapsed_ms = run.elapsed.as_millis() as u64,
            saved = saved_to.is_some(),
            "Deep research finished"
        );
        Ok(ResearchOutcome {
            report,
            saved_to,
            run,
        })
    }

    /// Stream `task` through a relay; the report is published once the run
    /// ends, even if the consumer has gone away.
    pub fn stream(&self, task: impl Into<String>) -> RelayHandle {
        let (events, run) = StreamRelay::new(Arc::clone(&self.agent))
            .start(task)
            .into_parts();
        let publisher = Arc::clone(&self.publisher);

        let run = tokio::spawn(async move {
            let result = match run.await {
                Ok(result) => result,
                Err(err) => {
                    error!(error = %err, "Research task aborted");
                    return RunResult::failed(
                        format!("research task aborted: {err}"),
                        Scratchpad::new(),
                        Duration::ZERO,
                    );
                }
            };

            if let Some(report) = Report::from_run(&result) {
                if let Err(err) = publisher.publish(&report).await {
                    error!(error = %err, "Failed to save streamed report");
                }
            }
            result
        });

        RelayHandle::new(events, run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, scripted_backend};
    use agent_core::{ReportSource, RunBudget, RunStatus};
    use agent_llm::LLMError;
    use agent_runtime::RelayEvent;
    use agent_tools::ToolRegistry;

    fn agent(backend: MockBackend, max_iterations: usize) -> Arc<AgentLoop> {
        let tools = ToolRegistry::builder()
            .register_fn("gold_prices", "Gold prices", None, |_input: String| async move {
                Ok("2024-03-01: China Gold 650.00, Chow Tai Fook 655.00".to_string())
            })
            .build()
            .unwrap();
        Arc::new(
            AgentLoop::builder()
                .provider(Arc::new(backend))
                .tools(Arc::new(tools))
                .budget(RunBudget::new(max_iterations, Duration::from_secs(60)))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_run_saves_completed_report() {
        let dir = tempfile::tempdir().unwrap();
        let backend = scripted_backend(&[
            "Thought: check gold\nAction: gold_prices\nAction Input: {}",
            "Thought: done\nFinal Answer: ## Gold\n\nGold is firm.",
        ]);
        let research = DeepResearch::new(
            agent(backend, 5),
            Arc::new(FileReportPublisher::new(dir.path())),
        );

        let outcome = research.run("How is gold doing?").await.unwrap();
        assert_eq!(outcome.run.status, RunStatus::Completed);
        assert_eq!(outcome.report.source, ReportSource::Completed);
        assert_eq!(outcome.report.body, "## Gold\n\nGold is firm.");

        let saved = outcome.saved_to.unwrap();
        assert!(saved.starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "## Gold\n\nGold is firm.");
    }

    #[tokio::test]
    async fn test_run_reconstructs_on_budget() {
        let backend = scripted_backend(&["Thought: check gold\nAction: gold_prices\nAction Input: {}"]);
        let research = DeepResearch::new(agent(backend, 1), Arc::new(DiscardPublisher));

        let outcome = research.run("How is gold doing?").await.unwrap();
        assert_eq!(outcome.run.status, RunStatus::Truncated);
        assert!(outcome.report.is_reconstructed());
        assert!(outcome.report.body.contains("China Gold 650.00"));
        assert!(outcome.saved_to.is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_reasoning_error() {
        let mut backend = MockBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Err(LLMError::RequestFailed("connection reset".to_string())));
        backend.expect_name().return_const("mock".to_string());
        let research = DeepResearch::new(agent(backend, 5), Arc::new(DiscardPublisher));

        let err = research.run("anything").await.unwrap_err();
        assert!(matches!(err, MarketError::Reasoning(ref msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_stream_persists_after_done() {
        let dir = tempfile::tempdir().unwrap();
        let backend = scripted_backend(&["Final Answer: Markets are calm."]);
        let research = DeepResearch::new(
            agent(backend, 3),
            Arc::new(FileReportPublisher::new(dir.path())),
        );

        let (events, run) = research.stream("Quick take").collect().await;
        assert_eq!(
            events.last(),
            Some(&RelayEvent::Done {
                status: RunStatus::Completed
            })
        );
        assert_eq!(run.unwrap().status, RunStatus::Completed);

        let saved: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(saved.len(), 1);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = MarketConfig::default();
        let source: Arc<dyn MarketDataSource> = Arc::new(crate::api::MockMarketDataSource::new());
        let err = DeepResearch::from_config(&config, source, Arc::new(FundWatchlist::new()))
            .err()
            .unwrap();
        assert!(matches!(err, MarketError::Config(_)));
    }
}
