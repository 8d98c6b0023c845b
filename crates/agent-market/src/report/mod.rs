//! Report persistence and console rendering

pub mod console;
pub mod publisher;

pub use console::{render_for_console, strip_ansi, strip_markdown, wrap_lines};
pub use publisher::{
    BRIEFING_PREFIX, DEEP_RESEARCH_PREFIX, DiscardPublisher, FileReportPublisher, ReportPublisher,
    read_report,
};
