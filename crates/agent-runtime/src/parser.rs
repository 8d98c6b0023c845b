//! Parser for ReAct-formatted backend output
//!
//! The backend answers with either
//!
//! ```text
//! Thought: ...
//! Action: <tool name>
//! Action Input: <argument>
//! ```
//!
//! or a `Final Answer:` block. Anything else is malformed.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[ \t]*(.*?)\s*Action\s*\d*\s*Input\s*\d*\s*:[ \t]*(.*)")
        .expect("static action pattern")
});

static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").expect("static action pattern"));

// Markers that end an action input when the backend keeps talking.
const INPUT_TERMINATORS: [&str; 4] = ["\nObservation", "\nThought:", "\nAction:", "\nFinal Answer:"];

/// A well-formed backend reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOutput {
    /// Request to run exactly one tool
    Action {
        /// Reasoning preceding the action
        thought: Option<String>,
        /// Tool name
        tool: String,
        /// Raw tool argument
        input: String,
    },
    /// The backend is done
    Finish {
        /// Reasoning preceding the answer
        thought: Option<String>,
        /// Final answer text
        answer: String,
    },
}

/// Why a backend reply could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace
    #[error("empty output")]
    Empty,
    /// Neither an action nor a final answer
    #[error("no `Action:` or `Final Answer:` found")]
    MissingAction,
    /// An action without its input line
    #[error("`Action:` given without `Action Input:`")]
    MissingActionInput,
    /// A final answer with no text
    #[error("`Final Answer:` is empty")]
    EmptyFinalAnswer,
    /// Both a final answer and an action
    #[error("both a final answer and an action were given")]
    Ambiguous,
}

/// Parse one backend reply
pub fn parse_output(text: &str) -> Result<ParsedOutput, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let final_at = text.find(FINAL_ANSWER_MARKER);

    if let Some(caps) = ACTION_RE.captures(text) {
        if final_at.is_some() {
            return Err(ParseError::Ambiguous);
        }

        let tool = clean_tool_name(caps.get(1).map_or("", |m| m.as_str()));
        if tool.is_empty() {
            return Err(ParseError::MissingAction);
        }
        let input = clean_input(caps.get(2).map_or("", |m| m.as_str()));
        let start = caps.get(0).map_or(0, |m| m.start());

        return Ok(ParsedOutput::Action {
            thought: clean_thought(&text[..start]),
            tool,
            input,
        });
    }

    if let Some(at) = final_at {
        let answer = text[at + FINAL_ANSWER_MARKER.len()..].trim();
        if answer.is_empty() {
            return Err(ParseError::EmptyFinalAnswer);
        }
        return Ok(ParsedOutput::Finish {
            thought: clean_thought(&text[..at]),
            answer: answer.to_string(),
        });
    }

    if ACTION_ONLY_RE.is_match(text) {
        Err(ParseError::MissingActionInput)
    } else {
        Err(ParseError::MissingAction)
    }
}

fn clean_tool_name(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| matches!(c, '`' | '*' | '"' | '\''))
        .trim()
        .to_string()
}

fn clean_input(raw: &str) -> String {
    let end = INPUT_TERMINATORS
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min()
        .unwrap_or(raw.len());
    let input = raw[..end].trim();

    match input.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(unquoted) if !unquoted.contains('"') => unquoted.to_string(),
        _ => input.to_string(),
    }
}

fn clean_thought(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("Thought:").unwrap_or(raw).trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_with_thought() {
        let out = "I should check the indices first.\nAction: market_indices\nAction Input: none";
        assert_eq!(
            parse_output(out).unwrap(),
            ParsedOutput::Action {
                thought: Some("I should check the indices first.".to_string()),
                tool: "market_indices".to_string(),
                input: "none".to_string(),
            }
        );
    }

    #[test]
    fn test_action_with_json_input_and_thought_label() {
        let out = "Thought: need news\nAction: news_flash\nAction Input: {\"count\": 5}";
        match parse_output(out).unwrap() {
            ParsedOutput::Action {
                thought,
                tool,
                input,
            } => {
                assert_eq!(thought.as_deref(), Some("need news"));
                assert_eq!(tool, "news_flash");
                assert_eq!(input, "{\"count\": 5}");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_action_input_stops_at_hallucinated_observation() {
        let out = "Action: search_news\nAction Input: \"semiconductor\"\nObservation: made up\nThought: more";
        match parse_output(out).unwrap() {
            ParsedOutput::Action { input, .. } => assert_eq!(input, "semiconductor"),
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_only_first_action_is_taken() {
        let out = "Action: gold_prices\nAction Input: \nAction: news_flash\nAction Input: 3";
        match parse_output(out).unwrap() {
            ParsedOutput::Action { tool, input, .. } => {
                assert_eq!(tool, "gold_prices");
                assert_eq!(input, "");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_name_markup_is_stripped() {
        let out = "Action: `sector_flows`\nAction Input: 5";
        match parse_output(out).unwrap() {
            ParsedOutput::Action { tool, .. } => assert_eq!(tool, "sector_flows"),
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_final_answer() {
        let out = "I now know the final answer\nFinal Answer: ## Market\n\nCalm session.";
        assert_eq!(
            parse_output(out).unwrap(),
            ParsedOutput::Finish {
                thought: Some("I now know the final answer".to_string()),
                answer: "## Market\n\nCalm session.".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_outputs() {
        assert_eq!(parse_output("   \n"), Err(ParseError::Empty));
        assert_eq!(
            parse_output("I think the market is up."),
            Err(ParseError::MissingAction)
        );
        assert_eq!(
            parse_output("Action: news_flash"),
            Err(ParseError::MissingActionInput)
        );
        assert_eq!(
            parse_output("Final Answer:   "),
            Err(ParseError::EmptyFinalAnswer)
        );
        assert_eq!(
            parse_output("Action: news_flash\nAction Input: 3\nFinal Answer: done"),
            Err(ParseError::Ambiguous)
        );
        assert_eq!(
            parse_output("Action: \nAction Input: 3"),
            Err(ParseError::MissingAction)
        );
    }
}
