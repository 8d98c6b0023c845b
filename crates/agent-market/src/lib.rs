//! Market data, research tools and reports for the lanfund terminal
//!
//! This crate connects the research runtime to the outside world:
//!
//! - [`api`]: the [`MarketDataSource`] trait and its HTTP implementation
//! - [`tools`]: the research tools offered to the agent
//! - [`research`]: the budgeted [`DeepResearch`] service
//! - [`briefing`]: the fixed four-question [`StandardBriefing`]
//! - [`dashboard`]: the [`MarketSnapshot`] terminal view
//! - [`watchlist`] and [`portfolio`]: the user's funds and their positions
//! - [`report`]: report publishing and console rendering

pub mod api;
pub mod briefing;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod portfolio;
pub mod report;
pub mod research;
pub mod tools;
pub mod watchlist;

#[cfg(test)]
mod testing;

pub use api::{HttpMarketClient, MarketDataSource};
pub use briefing::{BriefingOutcome, StandardBriefing};
pub use cache::{CacheKey, CacheManager, DataCache};
pub use config::{MarketConfig, MarketConfigBuilder};
pub use dashboard::MarketSnapshot;
pub use error::{MarketError, Result};
pub use portfolio::{Position, PositionSummary};
pub use report::{
    DiscardPublisher, FileReportPublisher, ReportPublisher, render_for_console,
};
pub use research::{DEFAULT_TASK, DeepResearch, ResearchOutcome};
pub use tools::{ResearchTool, ToolLimits, build_registry, build_registry_with};
pub use watchlist::{FundRow, FundWatchlist, WatchedFund, validate_fund_code};
