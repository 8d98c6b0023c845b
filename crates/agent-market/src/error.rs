//! Error types for market data and research operations

use agent_tools::ToolError;
use thiserror::Error;

/// Market data and research errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Upstream API answered with an error or an unexpected status
    #[error("API error: {0}")]
    Api(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload had an unexpected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The reasoning backend failed
    #[error("Reasoning backend failure: {0}")]
    Reasoning(String),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

impl MarketError {
    /// Shorthand for a parse error about a missing or mistyped field
    pub fn missing(field: &str) -> Self {
        Self::Parse(format!("missing field '{field}'"))
    }
}

/// Tool-facing conversion; the registry renders these as observations
impl From<MarketError> for ToolError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::InvalidInput(msg) => ToolError::InvalidInput(msg),
            MarketError::Api(_) | MarketError::Network(_) => ToolError::Unavailable(err.to_string()),
            other => ToolError::Failed(other.to_string()),
        }
    }
}

/// Convert MarketError to agent_core::Error
impl From<MarketError> for agent_core::Error {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::Reasoning(msg) => agent_core::Error::ReasoningBackend(msg),
            MarketError::Config(msg) => agent_core::Error::Config(msg),
            MarketError::Io(io) => agent_core::Error::Io(io),
            other => agent_core::Error::Generic(other.to_string()),
        }
    }
}

/// Convert agent_core::Error to MarketError
impl From<agent_core::Error> for MarketError {
    fn from(err: agent_core::Error) -> Self {
        match err {
            agent_core::Error::ReasoningBackend(msg) => MarketError::Reasoning(msg),
            agent_core::Error::Config(msg) => MarketError::Config(msg),
            agent_core::Error::Io(io) => MarketError::Io(io),
            other => MarketError::Config(other.to_string()),
        }
    }
}

impl From<agent_llm::LLMError> for MarketError {
    fn from(err: agent_llm::LLMError) -> Self {
        MarketError::Reasoning(err.to_string())
    }
}

impl From<agent_utils::EnvError> for MarketError {
    fn from(err: agent_utils::EnvError) -> Self {
        MarketError::Config(err.to_string())
    }
}
