//! Subcommand implementations

pub mod analyze;
pub mod serve;
pub mod snapshot;
pub mod watchlist;

#[cfg(test)]
mod testing;

use agent_market::{FundWatchlist, HttpMarketClient, MarketConfig, MarketDataSource};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Collaborators shared by every subcommand
pub struct AppContext {
    pub config: MarketConfig,
    pub source: Arc<dyn MarketDataSource>,
    pub watchlist: Arc<FundWatchlist>,
}

impl AppContext {
    /// Create the HTTP client and load the watchlist
    pub fn load(config: MarketConfig) -> Result<Self> {
        let source = HttpMarketClient::new(&config).context("failed to create market data client")?;
        let watchlist = FundWatchlist::load(&config.fund_map_path).with_context(|| {
            format!("failed to load watchlist {}", config.fund_map_path.display())
        })?;

        Ok(Self {
            config,
            source: Arc::new(source),
            watchlist: Arc::new(watchlist),
        })
    }
}
