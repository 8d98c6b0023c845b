//! Core data model for the deep-research agent
//!
//! This crate defines the values that flow through a single research run:
//! the per-iteration [`Step`], the append-only [`Scratchpad`], the
//! [`RunBudget`] that bounds the loop, and the [`RunResult`] / [`Report`]
//! produced when the loop stops.

pub mod budget;
pub mod error;
pub mod report;
pub mod run;
pub mod scratchpad;
pub mod step;

pub use budget::{BudgetExhaustion, RunBudget};
pub use error::{Error, Result};
pub use report::{Report, ReportSource};
pub use run::{RunResult, RunStatus};
pub use scratchpad::Scratchpad;
pub use step::{EMPTY_OBSERVATION, Step, StepKind};
