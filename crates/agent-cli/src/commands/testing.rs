//! Deep research wired to a backend that answers at once

use agent_core::RunBudget;
use agent_llm::{CompletionRequest, CompletionResponse, LLMProvider};
use agent_market::{
    DeepResearch, FundWatchlist, HttpMarketClient, MarketConfig, MarketDataSource, ReportPublisher,
    build_registry,
};
use agent_runtime::AgentLoop;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const ANSWER: &str = "Markets are calm.";

/// Answers immediately
pub struct AnsweringBackend;

#[async_trait]
impl LLMProvider for AnsweringBackend {
    async fn complete(&self, _request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        Ok(CompletionResponse::text(format!("Final Answer: {ANSWER}")))
    }

    fn name(&self) -> &str {
        "answering"
    }
}

pub fn research(publisher: Arc<dyn ReportPublisher>) -> DeepResearch {
    let source: Arc<dyn MarketDataSource> =
        Arc::new(HttpMarketClient::new(&MarketConfig::default()).unwrap());
    let registry = build_registry(source, Arc::new(FundWatchlist::new())).unwrap();
    let agent = AgentLoop::builder()
        .provider(Arc::new(AnsweringBackend))
        .tools(Arc::new(registry))
        .budget(RunBudget::new(3, Duration::from_secs(30)))
        .build()
        .unwrap();
    DeepResearch::new(Arc::new(agent), publisher)
}
