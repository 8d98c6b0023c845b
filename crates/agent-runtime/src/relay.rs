//! Push-channel relay for loop progress
//!
//! The relay runs an [`AgentLoop`] on its own task and forwards lifecycle
//! events to the consumer through a bounded channel. Transports encode each event with
//! [`encode_sse`] or [`RelayEvent::to_sse`].

use crate::agent_loop::{AgentLoop, LoopObserver};
use agent_core::{RunResult, RunStatus, Step};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default queue depth between the loop and its consumer
pub const DEFAULT_CAPACITY: usize = 64;

/// Events pushed to a relay consumer, in chronological order.
///
/// Exactly one of `done` or `error` ends every stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Progress message
    Status { message: String },

    /// Tools about to be invoked
    ToolCall { tools: Vec<String> },

    /// A slice of the final answer
    Content { content: String },

    /// The run finished with a report
    Done { status: RunStatus },

    /// The reasoning backend failed
    Error { message: String },
}

impl RelayEvent {
    /// Event name as it appears in the `type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::ToolCall { .. } => "tool_call",
            Self::Content { .. } => "content",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// JSON payload of the event. Never empty: an encoding failure becomes
    /// an `error` object.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({ "type": "error", "message": format!("encoding failed: {err}") })
                .to_string()
        })
    }

    /// Encode as one SSE frame
    pub fn to_sse(&self) -> String {
        encode_sse(self)
    }
}

/// Encode an event as `data: <JSON>\n\n`
pub fn encode_sse(event: &RelayEvent) -> String {
    format!("data: {}\n\n", event.to_json())
}

/// Runs research loops and relays their progress
pub struct StreamRelay {
    agent: Arc<AgentLoop>,
    capacity: usize,
}

impl StreamRelay {
    /// Create a relay with the default channel capacity
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self {
            agent,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Set the channel capacity (at least 1)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Start a run for `task` on a new task.
    ///
    /// The run never waits on the consumer: events are queued and a separate
    /// forwarder feeds the bounded channel. Dropping or stalling the receiver
    /// does not cancel or delay the run, and the run handle resolves as soon
    /// as the loop stops.
    pub fn start(&self, task: impl Into<String>) -> RelayHandle {
        let (tx, rx) = mpsc::channel(self.capacity);
        let (queue, pending) = mpsc::unbounded_channel();
        tokio::spawn(forward(pending, tx));

        let agent = Arc::clone(&self.agent);
        let task = task.into();
        let run = tokio::spawn(async move {
            let observer = ChannelObserver { queue };
            let result = agent.run_with_observer(&task, &observer).await;
            observer.finish(&result);
            result
        });

        RelayHandle { events: rx, run }
    }
}

/// Move queued events into the consumer channel in order. Status events are
/// dropped when the channel is full; everything else waits for room.
async fn forward(mut pending: mpsc::UnboundedReceiver<RelayEvent>, tx: mpsc::Sender<RelayEvent>) {
    while let Some(event) = pending.recv().await {
        let delivered = if matches!(event, RelayEvent::Status { .. }) {
            match tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("Relay queue full, status dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        } else {
            tx.send(event).await.is_ok()
        };

        if !delivered {
            debug!("Relay consumer disconnected");
            return;
        }
    }
}

/// Consumer side of a started relay
pub struct RelayHandle {
    events: mpsc::Receiver<RelayEvent>,
    run: JoinHandle<RunResult>,
}

impl RelayHandle {
    /// Reassemble a handle, e.g. after wrapping the run with follow-up work
    pub fn new(events: mpsc::Receiver<RelayEvent>, run: JoinHandle<RunResult>) -> Self {
        Self { events, run }
    }

    /// Next event, or `None` once the stream has ended
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        self.events.recv().await
    }

    /// Split into the event receiver and the run handle
    pub fn into_parts(self) -> (mpsc::Receiver<RelayEvent>, JoinHandle<RunResult>) {
        (self.events, self.run)
    }

    /// Drain every event, then wait for the run
    pub async fn collect(mut self) -> (Vec<RelayEvent>, Option<RunResult>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        (events, self.run.await.ok())
    }
}

struct ChannelObserver {
    queue: mpsc::UnboundedSender<RelayEvent>,
}

impl ChannelObserver {
    fn push(&self, event: RelayEvent) {
        // The forwarder is gone once the consumer left; the run carries on.
        self.queue.send(event).ok();
    }

    fn finish(&self, result: &RunResult) {
        if result.status == RunStatus::Failed {
            let message = result
                .failure
                .clone()
                .unwrap_or_else(|| "research run failed".to_string());
            self.push(RelayEvent::Error { message });
            return;
        }

        let answer = result.answer().unwrap_or_default();
        for chunk in chunk_answer(answer) {
            self.push(RelayEvent::Content {
                content: chunk.to_string(),
            });
        }
        self.push(RelayEvent::Done {
            status: result.status,
        });
        info!(status = %result.status, steps = result.steps.len(), "Relay finished");
    }
}

#[async_trait]
impl LoopObserver for ChannelObserver {
    async fn on_status(&self, message: &str) {
        self.push(RelayEvent::Status {
            message: message.to_string(),
        });
    }

    async fn on_tool_call(&self, tools: &[String]) {
        self.push(RelayEvent::ToolCall {
            tools: tools.to_vec(),
        });
    }

    async fn on_step(&self, _step: &Step) {}
}

/// Split an answer on paragraph boundaries; the chunks concatenate back to
/// the input.
fn chunk_answer(answer: &str) -> impl Iterator<Item = &str> {
    answer.split_inclusive("\n\n").filter(|chunk| !chunk.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, registry};
    use agent_core::RunBudget;
    use std::time::Duration;

    fn relay(provider: ScriptedProvider, iterations: usize) -> StreamRelay {
        let agent = AgentLoop::builder()
            .provider(Arc::new(provider))
            .tools(Arc::new(registry()))
            .budget(RunBudget::new(iterations, Duration::from_secs(30)))
            .build()
            .unwrap();
        StreamRelay::new(Arc::new(agent))
    }

    #[test]
    fn test_sse_encoding() {
        let event = RelayEvent::Done {
            status: RunStatus::Completed,
        };
        assert_eq!(
            event.to_sse(),
            "data: {\"type\":\"done\",\"status\":\"completed\"}\n\n"
        );

        let event = RelayEvent::ToolCall {
            tools: vec!["gold_prices".to_string()],
        };
        assert_eq!(
            encode_sse(&event),
            "data: {\"type\":\"tool_call\",\"tools\":[\"gold_prices\"]}\n\n"
        );
        assert_eq!(event.to_json(), r#"{"type":"tool_call","tools":["gold_prices"]}"#);
    }

    #[test]
    fn test_chunks_restore_answer() {
        let answer = "# Title\n\nFirst paragraph.\n\nSecond one.";
        let chunks: Vec<&str> = chunk_answer(answer).collect();
        assert_eq!(chunks, ["# Title\n\n", "First paragraph.\n\n", "Second one."]);
        assert_eq!(chunks.concat(), answer);

        assert_eq!(chunk_answer("single").collect::<Vec<_>>(), ["single"]);
        assert_eq!(chunk_answer("").count(), 0);
    }

    #[tokio::test]
    async fn test_event_order_for_completed_run() {
        let provider = ScriptedProvider::new(
            &[
                "Action: lookup\nAction Input: gold",
                "Final Answer: Gold is firm.\n\nSilver lags.",
            ],
            "",
        );
        let (events, result) = relay(provider, 5).start("metals").collect().await;

        let types: Vec<&str> = events.iter().map(RelayEvent::event_type).collect();
        assert_eq!(
            types,
            ["status", "tool_call", "status", "content", "content", "done"]
        );
        assert_eq!(
            events[1],
            RelayEvent::ToolCall {
                tools: vec!["lookup".to_string()]
            }
        );
        assert_eq!(
            events.last(),
            Some(&RelayEvent::Done {
                status: RunStatus::Completed
            })
        );
        assert_eq!(result.unwrap().status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_run_ends_with_error() {
        let provider = ScriptedProvider::failing_after(&[], "connection reset");
        let (events, result) = relay(provider, 5).start("task").collect().await;

        let last = events.last().unwrap();
        assert!(last.is_terminal());
        assert!(matches!(last, RelayEvent::Error { message } if message.contains("connection reset")));
        assert!(!events.iter().any(|e| matches!(e, RelayEvent::Content { .. } | RelayEvent::Done { .. })));
        assert_eq!(result.unwrap().status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_truncated_run_streams_synthesized_report() {
        let provider = ScriptedProvider::new(&[], "Action: lookup\nAction Input: copper");
        let (events, result) = relay(provider, 2).start("task").collect().await;
        let result = result.unwrap();

        assert_eq!(result.status, RunStatus::Truncated);
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                RelayEvent::Content { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(Some(streamed.as_str()), result.answer());
        assert_eq!(
            events.last(),
            Some(&RelayEvent::Done {
                status: RunStatus::Truncated
            })
        );
    }

    #[tokio::test]
    async fn test_status_dropped_when_queue_full() {
        let provider = ScriptedProvider::new(&[], "Action: lookup\nAction Input: x");
        let relay = relay(provider, 6).with_capacity(1);
        let (mut rx, run) = relay.start("task").into_parts();

        // Let the run fill the queue before draining it.
        let result = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        })
        .await
        .unwrap();

        let tool_calls = result
            .iter()
            .filter(|e| matches!(e, RelayEvent::ToolCall { .. }))
            .count();
        assert_eq!(tool_calls, 6);
        assert!(result.last().unwrap().is_terminal());
        assert_eq!(run.await.unwrap().status, RunStatus::Truncated);
    }

    #[tokio::test]
    async fn test_consumer_disconnect_does_not_cancel_run() {
        let provider = ScriptedProvider::new(&[], "Action: lookup\nAction Input: x")
            .with_delay(Duration::from_millis(5));
        let (mut rx, run) = relay(provider, 3).start("task").into_parts();

        let mut statuses = 0;
        while statuses < 2 {
            match rx.recv().await {
                Some(RelayEvent::Status { .. }) => statuses += 1,
                Some(_) => {}
                None => break,
            }
        }
        drop(rx);

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.status, RunStatus::Truncated);
        assert_eq!(result.steps.len(), 3);
    }

    #[tokio::test]
    async fn test_stalled_consumer_does_not_hold_run() {
        let answer = (1..=10)
            .map(|i| format!("Paragraph {i}."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let script = format!("Final Answer: {answer}");
        let provider = ScriptedProvider::new(&[script.as_str()], "");
        let (mut rx, run) = relay(provider, 3).with_capacity(1).start("task").into_parts();

        // The receiver stays open but is never read.
        let result = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run finished while the consumer stalled")
            .unwrap();
        assert_eq!(result.status, RunStatus::Completed);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let content = events
            .iter()
            .filter(|e| matches!(e, RelayEvent::Content { .. }))
            .count();
        assert_eq!(content, 10);
        assert_eq!(
            events.last(),
            Some(&RelayEvent::Done {
                status: RunStatus::Completed
            })
        );
    }
}
