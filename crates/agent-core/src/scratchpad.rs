//! Append-only record of the steps taken during one run

use crate::Step;
use serde::{Deserialize, Serialize};

/// Ordered steps of a single run.
///
/// Steps can only be appended; a run owns its scratchpad exclusively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scratchpad {
    steps: Vec<Step>,
}

impl Scratchpad {
    /// Create an empty scratchpad
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step has been recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Recorded steps in chronological order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Iterate over the steps in chronological order
    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// The most recent step
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Render the steps as a ReAct transcript, ready to be followed by
    /// the next `Thought:` cue.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            if let Some(thought) = &step.thought {
                out.push_str(&format!("Thought: {thought}\n"));
            }
            out.push_str(&format!(
                "Action: {}\nAction Input: {}\nObservation: {}\n",
                step.action,
                step.action_input,
                step.observation()
            ));
        }
        out
    }
}

impl<'a> IntoIterator for &'a Scratchpad {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StepKind;

    #[test]
    fn test_push_preserves_order() {
        let mut pad = Scratchpad::new();
        assert!(pad.is_empty());

        pad.push(Step::new(StepKind::ToolCall, "market_indices", "", "first"));
        pad.push(Step::new(StepKind::ToolCall, "news_flash", "3", "second"));

        assert_eq!(pad.len(), 2);
        let actions: Vec<_> = pad.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(actions, ["market_indices", "news_flash"]);
        assert_eq!(pad.last().map(Step::observation), Some("second"));
    }

    #[test]
    fn test_transcript_format() {
        let mut pad = Scratchpad::new();
        pad.push(
            Step::new(StepKind::ToolCall, "news_flash", "{\"count\": 3}", "1. rates unchanged")
                .with_thought(Some("Look at the news".to_string())),
        );
        pad.push(Step::new(StepKind::ToolCall, "gold_prices", "", "2024-05-01 720.5"));

        let transcript = pad.transcript();
        assert_eq!(
            transcript,
            "Thought: Look at the news\n\
             Action: news_flash\n\
             Action Input: {\"count\": 3}\n\
             Observation: 1. rates unchanged\n\
             Action: gold_prices\n\
             Action Input: \n\
             Observation: 2024-05-01 720.5\n"
        );
    }
}
