//! Market data collaborators

pub mod http;
pub mod parse;

pub use http::HttpMarketClient;

use crate::error::Result;
use crate::models::{
    FundEstimate, GoldDay, IndexQuote, IntradayPoint, MetalQuote, NewsItem, PageText, SectorFlow,
    TurnoverDay,
};
use async_trait::async_trait;

/// One method per data set the research tools and dashboard consume.
///
/// Implementations own their network, caching and throttling concerns.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Major Asian and American indices plus ChiNext
    async fn market_indices(&self) -> Result<Vec<IndexQuote>>;

    /// Latest `count` 7x24 news flashes, newest first
    async fn news_flash(&self, count: usize) -> Result<Vec<NewsItem>>;

    /// Industry sector capital flows, strongest change first
    async fn sector_flows(&self) -> Result<Vec<SectorFlow>>;

    /// Domestic gold prices for recent days, newest first
    async fn gold_history(&self) -> Result<Vec<GoldDay>>;

    /// Real-time spot gold, silver and platinum quotes
    async fn precious_metals(&self) -> Result<Vec<MetalQuote>>;

    /// Daily turnover for recent trading days, newest first
    async fn turnover_trend(&self) -> Result<Vec<TurnoverDay>>;

    /// Minute bars of the Shanghai Composite for today, oldest first
    async fn shanghai_intraday(&self) -> Result<Vec<IntradayPoint>>;

    /// Intraday estimate for one fund
    async fn fund_estimate(&self, code: &str) -> Result<FundEstimate>;

    /// Readable text of a web page
    async fn fetch_page(&self, url: &str) -> Result<PageText>;
}
