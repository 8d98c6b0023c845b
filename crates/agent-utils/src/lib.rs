//! Shared utilities for lanfund
//!
//! Logging setup and environment-driven configuration helpers used by the
//! market crate and the CLI.

pub mod config;
pub mod logging;

pub use config::{EnvError, env_flag, env_parse, env_string, load_dotenv};
pub use logging::{LogFormat, init_tracing, init_tracing_with_default};
