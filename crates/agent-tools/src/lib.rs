//! Tool framework for the research agent
//!
//! Tools take one text argument and return text. The [`ToolRegistry`] is
//! built once, shared read-only, and guarantees that invoking a tool never
//! propagates an error or a panic: every failure becomes an observation
//! string the reasoning backend can read.

pub mod coerce;
pub mod error;
pub mod fn_tool;
pub mod registry;
pub mod tool;

pub use coerce::coerce_argument;
pub use error::{Result, ToolError};
pub use fn_tool::FnTool;
pub use registry::{Invocation, InvocationOutcome, ToolRegistry, ToolRegistryBuilder, ToolSpec};
pub use tool::Tool;
