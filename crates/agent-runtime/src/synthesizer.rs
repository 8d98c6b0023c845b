//! Fallback report assembly for budget-truncated runs

use agent_core::Scratchpad;

/// Emitted when no observation is worth reporting
pub const PLACEHOLDER: &str = "Agent stopped due to iteration limit or time limit.";

/// Appended to every reconstructed report
pub const DISCLAIMER: &str = "> This report was assembled from partial data because the \
research budget ran out before the analysis was finished. It is provided for reference \
only and is not investment advice.";

/// Observations shorter than this are treated as noise
pub const DEFAULT_MIN_OBSERVATION_CHARS: usize = 20;

const TITLE: &str = "# Research notes (partial)";

/// Builds a best-effort report from the observations of a truncated run.
///
/// `synthesize` is a pure function of the scratchpad and never fails.
#[derive(Debug, Clone)]
pub struct ResultSynthesizer {
    min_observation_chars: usize,
}

impl Default for ResultSynthesizer {
    fn default() -> Self {
        Self {
            min_observation_chars: DEFAULT_MIN_OBSERVATION_CHARS,
        }
    }
}

impl ResultSynthesizer {
    /// Create a synthesizer with the default length threshold
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the minimum observation length
    pub fn with_min_observation_chars(mut self, chars: usize) -> Self {
        self.min_observation_chars = chars;
        self
    }

    /// Assemble the report: tool observations in order, labeled by tool,
    /// followed by the disclaimer.
    pub fn synthesize(&self, scratchpad: &Scratchpad) -> String {
        let sections: Vec<String> = scratchpad
            .iter()
            .filter(|step| step.is_tool_call())
            .filter(|step| step.observation().trim().chars().count() >= self.min_observation_chars)
            .map(|step| format!("## {}\n\n{}", step.action, step.observation().trim()))
            .collect();

        if sections.is_empty() {
            return PLACEHOLDER.to_string();
        }

        format!("{TITLE}\n\n{}\n\n---\n\n{DISCLAIMER}\n", sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{Step, StepKind};

    fn pad() -> Scratchpad {
        let mut pad = Scratchpad::new();
        pad.push(Step::new(
            StepKind::ToolCall,
            "market_indices",
            "",
            "Shanghai Composite 3120.45 (+0.52%)\nHang Seng 17650.10 (-0.31%)",
        ));
        pad.push(Step::new(StepKind::ToolCall, "gold_prices", "", "failed: 503"));
        pad.push(Step::new(
            StepKind::Corrective,
            "invalid_format",
            "blah",
            "Could not parse your last step (empty output).",
        ));
        pad.push(Step::new(
            StepKind::ToolCall,
            "news_flash",
            "3",
            "1. 09:31 Central bank keeps LPR unchanged",
        ));
        pad
    }

    #[test]
    fn test_empty_scratchpad_yields_placeholder() {
        assert_eq!(ResultSynthesizer::new().synthesize(&Scratchpad::new()), PLACEHOLDER);
    }

    #[test]
    fn test_sections_in_order_with_disclaimer() {
        let report = ResultSynthesizer::new().synthesize(&pad());

        assert!(report.starts_with(TITLE));
        let indices = report.find("## market_indices").unwrap();
        let news = report.find("## news_flash").unwrap();
        assert!(indices < news);
        assert!(report.trim_end().ends_with("not investment advice."));
    }

    #[test]
    fn test_short_and_bookkeeping_observations_are_skipped() {
        let report = ResultSynthesizer::new().synthesize(&pad());
        assert!(!report.contains("gold_prices"));
        assert!(!report.contains("Could not parse"));
    }

    #[test]
    fn test_only_noise_yields_placeholder() {
        let mut pad = Scratchpad::new();
        pad.push(Step::new(StepKind::ToolCall, "gold_prices", "", "failed: 503"));
        assert_eq!(ResultSynthesizer::new().synthesize(&pad), PLACEHOLDER);
    }

    #[test]
    fn test_pure_function() {
        let synthesizer = ResultSynthesizer::new();
        let pad = pad();
        assert_eq!(synthesizer.synthesize(&pad), synthesizer.synthesize(&pad.clone()));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let report = ResultSynthesizer::new()
            .with_min_observation_chars(5)
            .synthesize(&pad());
        assert!(report.contains("## gold_prices\n\nfailed: 503"));
    }
}
