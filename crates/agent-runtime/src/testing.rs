//! Scripted backend, tools and observer shared by the unit tests

use crate::LoopObserver;
use agent_core::Step;
use agent_llm::{CompletionRequest, CompletionResponse, LLMError, LLMProvider};
use agent_tools::{ToolError, ToolRegistry};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Replays canned outputs in order, then repeats `fallback`
pub struct ScriptedProvider {
    script: Mutex<VecDeque<String>>,
    fallback: String,
    fail_with: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: &[&str], fallback: &str) -> Self {
        Self {
            script: Mutex::new(script.iter().map(ToString::to_string).collect()),
            fallback: fallback.to_string(),
            fail_with: None,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replays `script`, then fails every further call with `error`
    pub fn failing_after(script: &[&str], error: &str) -> Self {
        let mut provider = Self::new(script, "");
        provider.fail_with = Some(error.to_string());
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.fail_with) {
            (Some(text), _) => Ok(CompletionResponse::text(text)),
            (None, Some(error)) => Err(LLMError::RequestFailed(error.clone())),
            (None, None) => Ok(CompletionResponse::text(self.fallback.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// `lookup` answers with a canned sentence; `broken` always fails
pub fn registry() -> ToolRegistry {
    ToolRegistry::builder()
        .register_fn(
            "lookup",
            "Look up recent market data for a query",
            Some("query"),
            |query: String| async move { Ok(format!("result for {query}: prices up 1.2% this week")) },
        )
        .register_fn(
            "broken",
            "Always unavailable",
            None,
            |_input: String| async move { Err(ToolError::Unavailable("upstream timeout".to_string())) },
        )
        .build()
        .unwrap()
}

/// Records every callback as `kind:detail`
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoopObserver for RecordingObserver {
    async fn on_status(&self, message: &str) {
        self.events.lock().unwrap().push(format!("status:{message}"));
    }

    async fn on_tool_call(&self, tools: &[String]) {
        self.events
            .lock()
            .unwrap()
            .push(format!("tool:{}", tools.join(",")));
    }

    async fn on_step(&self, step: &Step) {
        self.events
            .lock()
            .unwrap()
            .push(format!("step:{}", step.action));
    }
}
