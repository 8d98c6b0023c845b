//! Budgeted ReAct runtime for the research agent
//!
//! This crate provides the [`AgentLoop`] state machine that alternates
//! reasoning calls and tool invocations under a [`RunBudget`], the
//! [`ResultSynthesizer`] that rebuilds a report when the budget runs out,
//! and the [`StreamRelay`] that pushes run lifecycle events to a live
//! consumer.
//!
//! [`RunBudget`]: agent_core::RunBudget

pub mod agent_loop;
pub mod parser;
pub mod prompt;
pub mod relay;
pub mod synthesizer;

#[cfg(test)]
mod testing;

// Re-export key types
pub use agent_loop::{AgentLoop, AgentLoopBuilder, LoopConfig, LoopObserver, NoOpObserver};
pub use parser::{ParseError, ParsedOutput, parse_output};
pub use relay::{RelayEvent, RelayHandle, StreamRelay, encode_sse};
pub use synthesizer::ResultSynthesizer;
