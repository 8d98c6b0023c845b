//! Closure-backed tools

use crate::{Result, Tool};
use async_trait::async_trait;
use std::future::Future;

/// A tool built from a name, a description and an async closure
pub struct FnTool<F> {
    name: String,
    description: String,
    argument_key: Option<String>,
    func: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    /// Wrap `func` as a tool
    pub fn new(name: impl Into<String>, description: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            argument_key: None,
            func,
        }
    }

    /// Extract this field when the argument is a JSON object
    pub fn with_argument_key(mut self, key: impl Into<String>) -> Self {
        self.argument_key = Some(key.into());
        self
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn call(&self, input: &str) -> Result<String> {
        (self.func)(input.to_string()).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn argument_key(&self) -> Option<&str> {
        self.argument_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_tool_calls_closure() {
        let tool = FnTool::new("echo", "Echo the input", |input: String| async move {
            Ok(format!("echo: {input}"))
        })
        .with_argument_key("text");

        assert_eq!(tool.name(), "echo");
        assert_eq!(tool.argument_key(), Some("text"));
        assert_eq!(tool.call("hi").await.unwrap(), "echo: hi");
    }
}
