//! Error types for agent-core

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by the agent crates
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// The reasoning backend could not be reached or returned an error.
    /// Fatal to a run; never retried internally.
    #[error("Reasoning backend failure: {0}")]
    ReasoningBackend(String),

    /// Agent initialization failed
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error while persisting or reading a report
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
