//! Error types for tool execution

use thiserror::Error;

/// Result type for tool execution
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors a tool may report. The registry turns them into
/// `failed: <reason>` observations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The argument could not be interpreted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The underlying collaborator failed
    #[error("{0}")]
    Failed(String),

    /// The collaborator returned nothing usable
    #[error("data unavailable: {0}")]
    Unavailable(String),

    /// Two tools were registered under the same name
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),
}
