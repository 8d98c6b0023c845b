//! Reasoning backend abstraction for the research agent
//!
//! This crate provides a provider-agnostic text chat interface:
//!
//! - Message types for chat turns
//! - Completion request/response types (with stop sequences)
//! - Provider trait for backend implementations
//! - An OpenAI-compatible HTTP provider (behind the `openai` feature)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

#[cfg(feature = "openai")]
pub mod providers;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
