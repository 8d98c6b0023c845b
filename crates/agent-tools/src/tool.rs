//! Tool trait definition

use crate::Result;
use async_trait::async_trait;

/// A named capability the research agent can invoke.
///
/// Input and output are plain UTF-8 text. Side effects such as network
/// access and their timeouts belong to the tool, not to the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool with an already coerced argument
    async fn call(&self, input: &str) -> Result<String>;

    /// Unique name the backend uses to request this tool
    fn name(&self) -> &str;

    /// Description shown to the backend when choosing a tool
    fn description(&self) -> &str;

    /// Field to extract when the argument arrives as a JSON object.
    ///
    /// `None` means the tool takes no argument or uses the raw text.
    fn argument_key(&self) -> Option<&str> {
        None
    }
}
