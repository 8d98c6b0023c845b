//! Budgeted ReAct loop
//!
//! The AgentLoop drives one research run:
//! 1. THINK: check the budget, then ask the backend for one step
//! 2. ACT: resolve the requested tool
//! 3. OBSERVE: invoke it and append the step to the scratchpad
//! 4. Repeat until a final answer, budget exhaustion or backend failure

use crate::parser::{ParseError, ParsedOutput, parse_output};
use crate::prompt::{DEFAULT_INSTRUCTIONS, STOP_SEQUENCE, render_system_prompt, render_user_prompt};
use crate::synthesizer::ResultSynthesizer;
use agent_core::{Error, Result, RunBudget, RunResult, Scratchpad, Step, StepKind};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use agent_tools::{InvocationOutcome, ToolRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Action recorded for steps that answer malformed backend output
pub const INVALID_FORMAT_ACTION: &str = "invalid_format";

const PREVIEW_CHARS: usize = 300;

/// Receives lifecycle callbacks while a run progresses
///
/// Implement this trait to stream progress to a client. Every method
/// defaults to a no-op.
#[async_trait]
pub trait LoopObserver: Send + Sync {
    /// Progress message on THINK entry and at budget milestones
    async fn on_status(&self, _message: &str) {}

    /// A tool is about to be invoked
    async fn on_tool_call(&self, _tools: &[String]) {}

    /// A step was appended to the scratchpad
    async fn on_step(&self, _step: &Step) {}
}

/// Observer that ignores every event
pub struct NoOpObserver;

#[async_trait]
impl LoopObserver for NoOpObserver {}

/// Configuration for a research loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Model to use
    pub model: String,

    /// Role instructions at the top of the system prompt
    pub instructions: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,

    /// Iteration and wall-clock limits applied to every run
    pub budget: RunBudget,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_tokens: 2000,
            temperature: Some(0.7),
            budget: RunBudget::default(),
        }
    }
}

/// Drives Thought → Action → Observation cycles under a [`RunBudget`].
///
/// One loop instance can serve many concurrent runs; each run owns its own
/// scratchpad and clock, and the tool registry is only read.
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    config: LoopConfig,
    system_prompt: String,
    synthesizer: ResultSynthesizer,
}

impl AgentLoop {
    /// Create a loop, rendering the system prompt once
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        config: LoopConfig,
    ) -> Result<Self> {
        let system_prompt = render_system_prompt(&config.instructions, &tools.specs())?;
        Ok(Self {
            provider,
            tools,
            config,
            system_prompt,
            synthesizer: ResultSynthesizer::default(),
        })
    }

    /// Create a builder
    pub fn builder() -> AgentLoopBuilder {
        AgentLoopBuilder::default()
    }

    /// Replace the fallback synthesizer
    pub fn with_synthesizer(mut self, synthesizer: ResultSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Loop configuration
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Tools available to the backend
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Rendered system prompt
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run the loop for `task` without observing it
    pub async fn run(&self, task: &str) -> RunResult {
        self.run_with_observer(task, &NoOpObserver).await
    }

    /// Run the loop for `task`, reporting progress to `observer`.
    ///
    /// Never returns an error: a backend failure ends the run with
    /// [`agent_core::RunStatus::Failed`], keeping the steps gathered so far.
    pub async fn run_with_observer(&self, task: &str, observer: &dyn LoopObserver) -> RunResult {
        let span = info_span!("research_run", run_id = %Uuid::new_v4());
        self.drive(task, observer).instrument(span).await
    }

    async fn drive(&self, task: &str, observer: &dyn LoopObserver) -> RunResult {
        let budget = self.config.budget;
        let started = Instant::now();
        let mut scratchpad = Scratchpad::new();

        info!(
            max_iterations = budget.max_iterations,
            max_duration_secs = budget.max_duration.as_secs(),
            tool_count = self.tools.len(),
            "Research run started"
        );

        loop {
            // The budget gate precedes every backend call.
            if let Some(exhausted) = budget.check(started.elapsed(), scratchpad.len()) {
                warn!(
                    steps = scratchpad.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    %exhausted,
                    "Budget exhausted, synthesizing report"
                );
                observer
                    .on_status(&format!(
                        "Budget exhausted ({exhausted}), assembling report from {} steps",
                        scratchpad.len()
                    ))
                    .await;
                let report = self.synthesizer.synthesize(&scratchpad);
                return RunResult::truncated(report, scratchpad, exhausted, started.elapsed());
            }

            let iteration = scratchpad.len() + 1;
            if budget.max_iterations >= 4 && scratchpad.len() == budget.max_iterations / 2 {
                observer.on_status("Half of the iteration budget used").await;
            }
            observer
                .on_status(&format!(
                    "Thinking (step {iteration} of {})",
                    budget.max_iterations
                ))
                .await;
            info!(
                iteration,
                max_iterations = budget.max_iterations,
                "Agent iteration started"
            );

            let request = self.build_request(task, &scratchpad);
            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(err) => {
                    error!(iteration, error = %err, "Reasoning backend failed");
                    let failure = Error::ReasoningBackend(err.to_string());
                    return RunResult::failed(failure.to_string(), scratchpad, started.elapsed());
                }
            };

            let output = response.message.text();
            debug!(
                iteration,
                output_tokens = response.usage.output_tokens,
                output_preview = %preview(output),
                "Backend step received"
            );

            let step = match parse_output(output) {
                Ok(ParsedOutput::Finish { answer, .. }) => {
                    info!(
                        iteration,
                        steps = scratchpad.len(),
                        answer_len = answer.len(),
                        "Final answer received"
                    );
                    return RunResult::completed(answer, scratchpad, started.elapsed());
                }
                Ok(ParsedOutput::Action {
                    thought,
                    tool,
                    input,
                }) => {
                    observer.on_tool_call(std::slice::from_ref(&tool)).await;
                    info!(iteration, tool_name = %tool, input_preview = %preview(&input), "Executing tool");

                    let invocation = self.tools.invoke(&tool, &input).await;
                    let kind = match invocation.outcome {
                        InvocationOutcome::UnknownTool => StepKind::UnknownTool,
                        InvocationOutcome::Success | InvocationOutcome::Failed => StepKind::ToolCall,
                    };
                    Step::new(kind, tool, input, invocation.observation).with_thought(thought)
                }
                Err(err) => {
                    warn!(iteration, error = %err, "Malformed backend output");
                    Step::new(
                        StepKind::Corrective,
                        INVALID_FORMAT_ACTION,
                        preview(output),
                        corrective_observation(err),
                    )
                }
            };

            observer.on_step(&step).await;
            scratchpad.push(step);
        }
    }

    fn build_request(&self, task: &str, scratchpad: &Scratchpad) -> CompletionRequest {
        CompletionRequest::builder(&self.config.model)
            .system(self.system_prompt.clone())
            .add_message(Message::user(render_user_prompt(task, scratchpad)))
            .max_tokens(self.config.max_tokens)
            .maybe_temperature(self.config.temperature)
            .stop_sequences(vec![STOP_SEQUENCE.to_string()])
            .build()
    }
}

fn corrective_observation(err: ParseError) -> String {
    format!(
        "Could not parse your last step ({err}). Follow the format: either an `Action:` line \
         followed by an `Action Input:` line, or a single `Final Answer:` with the report."
    )
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Builder for [`AgentLoop`]
#[derive(Default)]
pub struct AgentLoopBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tools: Option<Arc<ToolRegistry>>,
    config: LoopConfig,
    synthesizer: Option<ResultSynthesizer>,
}

impl AgentLoopBuilder {
    /// Set the reasoning backend
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the role instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = instructions.into();
        self
    }

    /// Set the run budget
    pub fn budget(mut self, budget: RunBudget) -> Self {
        self.config.budget = budget;
        self
    }

    /// Set max tokens per completion
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the fallback synthesizer
    pub fn synthesizer(mut self, synthesizer: ResultSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Build the loop
    pub fn build(self) -> Result<AgentLoop> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("reasoning backend not set".to_string()))?;
        let tools = self
            .tools
            .ok_or_else(|| Error::InitializationFailed("tool registry not set".to_string()))?;

        let agent = AgentLoop::new(provider, tools, self.config)?;
        Ok(match self.synthesizer {
            Some(synthesizer) => agent.with_synthesizer(synthesizer),
            None => agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesizer::PLACEHOLDER;
    use crate::testing::{ScriptedProvider, RecordingObserver, registry};
    use agent_core::RunStatus;
    use std::time::Duration;

    fn agent(provider: Arc<ScriptedProvider>, budget: RunBudget) -> AgentLoop {
        AgentLoop::builder()
            .provider(provider)
            .tools(Arc::new(registry()))
            .budget(budget)
            .build()
            .unwrap()
    }

    fn budget(iterations: usize) -> RunBudget {
        RunBudget::new(iterations, Duration::from_secs(30))
    }

    #[test]
    fn test_builder_requires_provider() {
        let result = AgentLoop::builder().tools(Arc::new(registry())).build();
        assert!(matches!(result, Err(Error::InitializationFailed(_))));
    }

    #[test]
    fn test_system_prompt_mentions_tools() {
        let agent = agent(Arc::new(ScriptedProvider::new(&[], "")), budget(3));
        assert!(agent.system_prompt().contains("- lookup:"));
        assert!(agent.system_prompt().contains("- broken:"));
    }

    #[tokio::test]
    async fn test_tool_then_final_answer() {
        let provider = Arc::new(ScriptedProvider::new(
            &[
                "Thought: look it up\nAction: lookup\nAction Input: {\"query\": \"gold\"}",
                "Thought: I now know the final answer\nFinal Answer: Gold is firm.",
            ],
            "",
        ));
        let result = agent(Arc::clone(&provider), budget(5)).run("How is gold?").await;

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.answer(), Some("Gold is firm."));
        assert_eq!(result.steps.len(), 1);

        let step = &result.steps.steps()[0];
        assert_eq!(step.kind, StepKind::ToolCall);
        assert_eq!(step.action, "lookup");
        assert_eq!(step.observation(), "result for gold: prices up 1.2% this week");
        assert_eq!(step.thought.as_deref(), Some("look it up"));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_second_request_carries_transcript_and_stop_sequence() {
        let provider = Arc::new(ScriptedProvider::new(
            &["Action: lookup\nAction Input: oil", "Final Answer: done"],
            "",
        ));
        agent(Arc::clone(&provider), budget(5)).run("task").await;

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let second = requests[1].messages[0].text();
        assert!(second.starts_with("Question: task\nAction: lookup\nAction Input: oil\nObservation: result for oil"));
        assert!(second.ends_with("Thought:"));
        assert_eq!(
            requests[1].stop_sequences.as_deref(),
            Some(&[STOP_SEQUENCE.to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recoverable() {
        let provider = Arc::new(ScriptedProvider::new(
            &["Action: weather\nAction Input: Paris", "Final Answer: no weather here"],
            "",
        ));
        let result = agent(provider, budget(5)).run("task").await;

        assert_eq!(result.status, RunStatus::Completed);
        let step = &result.steps.steps()[0];
        assert_eq!(step.kind, StepKind::UnknownTool);
        assert!(step.observation().contains("weather is not a valid tool"));
    }

    #[tokio::test]
    async fn test_backend_failure_is_surfaced() {
        let provider = Arc::new(ScriptedProvider::failing_after(
            &["Action: lookup\nAction Input: gold"],
            "HTTP 502 bad gateway",
        ));
        let result = agent(provider, budget(5)).run("task").await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.answer().is_none());
        assert_eq!(result.steps.len(), 1);
        assert!(result.failure.as_deref().unwrap().contains("HTTP 502"));
        assert!(matches!(
            result.into_result(),
            Err(Error::ReasoningBackend(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_budget_never_calls_backend() {
        let provider = Arc::new(ScriptedProvider::new(&[], "Final Answer: unused"));
        let result = agent(Arc::clone(&provider), budget(0)).run("task").await;

        assert_eq!(result.status, RunStatus::Truncated);
        assert_eq!(result.answer(), Some(PLACEHOLDER));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_deadline_stops_loop_before_next_call() {
        let provider = Arc::new(
            ScriptedProvider::new(&[], "Action: lookup\nAction Input: x")
                .with_delay(Duration::from_millis(40)),
        );
        let budget = RunBudget::new(100, Duration::from_millis(100));
        let result = agent(Arc::clone(&provider), budget).run("task").await;

        assert_eq!(result.status, RunStatus::Truncated);
        assert_eq!(result.exhausted, Some(agent_core::BudgetExhaustion::Duration));
        assert!(!result.steps.is_empty());
        assert!(result.steps.len() < 100);
        // No backend call once the deadline has passed.
        assert_eq!(provider.calls(), result.steps.len());
        assert!(result.answer().unwrap().contains("result for x"));
    }

    #[tokio::test]
    async fn test_observer_sees_lifecycle() {
        let provider = Arc::new(ScriptedProvider::new(
            &["Action: lookup\nAction Input: a", "Action: lookup\nAction Input: b"],
            "Final Answer: ok",
        ));
        let observer = RecordingObserver::default();
        agent(provider, budget(4))
            .run_with_observer("task", &observer)
            .await;

        let events = observer.events();
        assert_eq!(
            events,
            [
                "status:Thinking (step 1 of 4)",
                "tool:lookup",
                "step:lookup",
                "status:Thinking (step 2 of 4)",
                "tool:lookup",
                "step:lookup",
                "status:Half of the iteration budget used",
                "status:Thinking (step 3 of 4)",
            ]
        );
    }
}
