//! ReAct prompt rendering

use agent_core::{Error, Result, Scratchpad};
use agent_tools::ToolSpec;
use minijinja::{Environment, context};
use serde::Serialize;

/// Stop sequence that keeps the backend from inventing observations
pub const STOP_SEQUENCE: &str = "\nObservation:";

/// Default role instructions placed at the top of the system prompt
pub const DEFAULT_INSTRUCTIONS: &str = "You are a senior market research analyst. \
Investigate the question step by step with the tools below, one tool call at a time, \
then write a structured markdown report with headings, key figures and a risk section.";

const REACT_TEMPLATE: &str = r"{{ instructions }}

You have access to the following tools:
{%- for tool in tools %}
- {{ tool.name }}: {{ tool.description }}
{%- endfor %}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, exactly one of [{{ tool_names }}]
Action Input: the input to the action, a plain value or a JSON object
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Call exactly one tool per step and never write the Observation yourself.";

#[derive(Serialize)]
struct ToolLine<'a> {
    name: &'a str,
    description: &'a str,
}

/// Render the system prompt listing every tool
pub fn render_system_prompt(instructions: &str, tools: &[ToolSpec]) -> Result<String> {
    let lines: Vec<ToolLine<'_>> = tools
        .iter()
        .map(|t| ToolLine {
            name: &t.name,
            description: &t.description,
        })
        .collect();
    let tool_names = tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut env = Environment::new();
    env.add_template("react", REACT_TEMPLATE)
        .map_err(|e| Error::InitializationFailed(format!("invalid prompt template: {e}")))?;
    let template = env
        .get_template("react")
        .map_err(|e| Error::InitializationFailed(e.to_string()))?;

    template
        .render(context! {
            instructions => instructions,
            tools => lines,
            tool_names => tool_names,
        })
        .map_err(|e| Error::InitializationFailed(format!("failed to render prompt: {e}")))
}

/// Render the per-iteration user message: the task, the steps so far and
/// the cue for the next thought.
pub fn render_user_prompt(task: &str, scratchpad: &Scratchpad) -> String {
    format!("Question: {task}\n{}Thought:", scratchpad.transcript())
}
