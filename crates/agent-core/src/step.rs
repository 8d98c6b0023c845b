//! A single Thought → Action → Observation cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observation text recorded when a tool produced nothing at all.
pub const EMPTY_OBSERVATION: &str = "(no data returned)";

/// What produced a step's observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A registered tool ran (successfully or not)
    ToolCall,
    /// The backend named a tool that is not registered
    UnknownTool,
    /// The backend output could not be parsed; the observation tells it how to recover
    Corrective,
}

/// One iteration of the research loop.
///
/// The observation is never empty: it holds either the tool output or an
/// error string describing why there is no output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StepRecord")]
pub struct Step {
    /// What produced the observation
    pub kind: StepKind,
    /// Free-text reasoning the backend emitted before acting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    /// Tool name requested by the backend
    pub action: String,
    /// Raw argument text as emitted by the backend
    pub action_input: String,
    observation: String,
    /// When the observation was recorded
    pub timestamp: DateTime<Utc>,
}

impl Step {
    /// Create a step stamped with the current time
    pub fn new(
        kind: StepKind,
        action: impl Into<String>,
        action_input: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            thought: None,
            action: action.into(),
            action_input: action_input.into(),
            observation: non_empty_observation(observation.into()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the reasoning that led to this step
    pub fn with_thought(mut self, thought: Option<String>) -> Self {
        self.thought = thought.filter(|t| !t.trim().is_empty());
        self
    }

    /// The recorded observation
    pub fn observation(&self) -> &str {
        &self.observation
    }

    /// Whether this step carries data from a registered tool
    pub fn is_tool_call(&self) -> bool {
        self.kind == StepKind::ToolCall
    }
}

fn non_empty_observation(observation: String) -> String {
    if observation.trim().is_empty() {
        EMPTY_OBSERVATION.to_string()
    } else {
        observation
    }
}

/// Wire form of a [`Step`]; deserialized steps get the same normalization
/// as [`Step::new`].
#[derive(Deserialize)]
struct StepRecord {
    kind: StepKind,
    #[serde(default)]
    thought: Option<String>,
    action: String,
    #[serde(default)]
    action_input: String,
    #[serde(default)]
    observation: String,
    timestamp: DateTime<Utc>,
}

impl From<StepRecord> for Step {
    fn from(record: StepRecord) -> Self {
        Self {
            kind: record.kind,
            thought: record.thought.filter(|t| !t.trim().is_empty()),
            action: record.action,
            action_input: record.action_input,
            observation: non_empty_observation(record.observation),
            timestamp: record.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_observation_is_replaced() {
        let step = Step::new(StepKind::ToolCall, "news_flash", "5", "   ");
        assert_eq!(step.observation(), EMPTY_OBSERVATION);
    }

    #[test]
    fn test_blank_thought_is_dropped() {
        let step = Step::new(StepKind::ToolCall, "market_indices", "", "SSE 3100.5 (+0.4%)")
            .with_thought(Some("  ".to_string()));
        assert!(step.thought.is_none());

        let step = step.with_thought(Some("check indices first".to_string()));
        assert_eq!(step.thought.as_deref(), Some("check indices first"));
    }

    #[test]
    fn test_step_serializes_kind_in_snake_case() {
        let step = Step::new(StepKind::UnknownTool, "weather", "", "weather is not a valid tool");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["kind"], "unknown_tool");
        assert_eq!(json["observation"], "weather is not a valid tool");
        assert!(json.get("thought").is_none());
    }

    #[test]
    fn test_deserialized_step_keeps_observation_non_empty() {
        let json = r#"{
            "kind": "tool_call",
            "thought": " ",
            "action": "gold_prices",
            "action_input": "",
            "observation": "  ",
            "timestamp": "2024-03-01T07:04:05Z"
        }"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.observation(), EMPTY_OBSERVATION);
        assert!(step.thought.is_none());

        let round_trip: Step = serde_json::from_value(serde_json::to_value(&step).unwrap()).unwrap();
        assert_eq!(round_trip, step);
    }
}
