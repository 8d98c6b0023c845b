//! Immutable tool registry with fault isolation

use crate::{FnTool, Result, Tool, ToolError, coerce_argument};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Observation used when a tool returns only whitespace
pub use agent_core::step::EMPTY_OBSERVATION;

/// Prefix of every observation that reports a tool fault
pub const FAILURE_PREFIX: &str = "failed: ";

/// Name and description of a registered tool, for prompting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The tool returned output
    Success,
    /// The tool returned an error or panicked
    Failed,
    /// No tool is registered under the requested name
    UnknownTool,
}

/// Result of [`ToolRegistry::invoke`]. The observation is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// How the invocation ended
    pub outcome: InvocationOutcome,
    /// Text to record as the observation
    pub observation: String,
}

impl Invocation {
    fn success(output: String) -> Self {
        let observation = if output.trim().is_empty() {
            EMPTY_OBSERVATION.to_string()
        } else {
            output
        };
        Self {
            outcome: InvocationOutcome::Success,
            observation,
        }
    }

    fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            outcome: InvocationOutcome::Failed,
            observation: format!("{FAILURE_PREFIX}{reason}"),
        }
    }
}

/// Registry of the tools available to a run.
///
/// Built once through [`ToolRegistry::builder`] and shared read-only, so
/// concurrent runs need no locking.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Start building a registry
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Whether a tool is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Name/description pairs in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name with the backend's raw argument.
    ///
    /// Never fails: unknown names, tool errors and panics all come back as
    /// an [`Invocation`] whose observation explains what happened.
    pub async fn invoke(&self, name: &str, raw_input: &str) -> Invocation {
        let Some(tool) = self.get(name) else {
            warn!(tool_name = name, "Unknown tool requested");
            return Invocation {
                outcome: InvocationOutcome::UnknownTool,
                observation: format!(
                    "{name} is not a valid tool, try one of [{}].",
                    self.names().join(", ")
                ),
            };
        };

        let argument = coerce_argument(raw_input, tool.argument_key());
        debug!(tool_name = name, argument = %argument, "Invoking tool");

        let started = Instant::now();
        let fut = AssertUnwindSafe(tool.call(&argument));
        let invocation = match fut.catch_unwind().await {
            Ok(Ok(output)) => Invocation::success(output),
            Ok(Err(err)) => Invocation::failed(err),
            Err(panic) => Invocation::failed(format!("tool panicked: {}", panic_message(&*panic))),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match invocation.outcome {
            InvocationOutcome::Failed => warn!(
                tool_name = name,
                duration_ms,
                observation = %invocation.observation,
                "Tool invocation failed"
            ),
            _ => debug!(
                tool_name = name,
                duration_ms,
                observation_len = invocation.observation.len(),
                "Tool invocation finished"
            ),
        }

        invocation
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`ToolRegistry`]
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Register a tool
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Register an already shared tool
    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register an async closure as a tool
    pub fn register_fn<F, Fut>(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        argument_key: Option<&str>,
        func: F,
    ) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let tool = FnTool::new(name, description, func);
        match argument_key {
            Some(key) => self.register(tool.with_argument_key(key)),
            None => self.register(tool),
        }
    }

    /// Finish the registry. Tool names must be unique.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(ToolError::DuplicateName(tool.name().to_string()));
            }
        }

        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}
