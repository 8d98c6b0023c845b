//! Research tools exposed to the agent
//!
//! Every tool wraps one [`MarketDataSource`] call and renders the result as
//! plain text. Arguments arrive already coerced by the registry, so each
//! tool only deals with a bare string.

mod format;

use crate::api::MarketDataSource;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::portfolio::PositionSummary;
use crate::watchlist::{FundWatchlist, validate_fund_code};
use agent_tools::{Tool, ToolError, ToolRegistry};
use async_trait::async_trait;
use chrono::Local;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub use format::{bullet_list, truncate_chars};

/// Flashes scanned by `search_news`
pub const SEARCH_NEWS_WINDOW: usize = 50;

/// The tools offered to the research agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResearchTool {
    MarketIndices,
    NewsFlash,
    SearchNews,
    SectorFlows,
    GoldPrices,
    PreciousMetals,
    TurnoverTrend,
    ShanghaiIntraday,
    FundWatchlist,
    FundEstimate,
    FetchPage,
}

impl ResearchTool {
    /// All tools in registration order
    pub const ALL: [ResearchTool; 11] = [
        ResearchTool::MarketIndices,
        ResearchTool::NewsFlash,
        ResearchTool::SearchNews,
        ResearchTool::SectorFlows,
        ResearchTool::GoldPrices,
        ResearchTool::PreciousMetals,
        ResearchTool::TurnoverTrend,
        ResearchTool::ShanghaiIntraday,
        ResearchTool::FundWatchlist,
        ResearchTool::FundEstimate,
        ResearchTool::FetchPage,
    ];

    /// Name the backend uses in `Action:` lines
    pub fn name(self) -> &'static str {
        match self {
            ResearchTool::MarketIndices => "market_indices",
            ResearchTool::NewsFlash => "news_flash",
            ResearchTool::SearchNews => "search_news",
            ResearchTool::SectorFlows => "sector_flows",
            ResearchTool::GoldPrices => "gold_prices",
            ResearchTool::PreciousMetals => "precious_metals",
            ResearchTool::TurnoverTrend => "turnover_trend",
            ResearchTool::ShanghaiIntraday => "shanghai_intraday",
            ResearchTool::FundWatchlist => "fund_watchlist",
            ResearchTool::FundEstimate => "fund_estimate",
            ResearchTool::FetchPage => "fetch_page",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ResearchTool::MarketIndices => {
                "Latest quotes of major Asian and American stock indices including ChiNext. No input."
            }
            ResearchTool::NewsFlash => {
                "Latest 7x24 market news flashes, newest first. Input: how many items (default 20, max 50)."
            }
            ResearchTool::SearchNews => {
                "Search the latest 50 news flashes for a keyword in titles or affected stocks. Input: keyword."
            }
            ResearchTool::SectorFlows => {
                "Industry sectors ranked by today's change with main-force capital flows. Input: how many sectors (default 10)."
            }
            ResearchTool::GoldPrices => {
                "Recent daily domestic gold prices from China Gold and Chow Tai Fook, CNY per gram. No input."
            }
            ResearchTool::PreciousMetals => {
                "Real-time spot gold, silver and platinum quotes. No input."
            }
            ResearchTool::TurnoverTrend => {
                "Total A-share turnover for the last 7 trading days split by exchange. No input."
            }
            ResearchTool::ShanghaiIntraday => {
                "Shanghai Composite minute bars for today. Input: how many recent minutes (default 30)."
            }
            ResearchTool::FundWatchlist => {
                "The user's watched funds with holding flags, sectors and intraday estimates. No input."
            }
            ResearchTool::FundEstimate => {
                "Intraday valuation estimate of one fund. Input: 6-digit fund code."
            }
            ResearchTool::FetchPage => {
                "Readable text of a web page for deeper reading. Input: http or https URL."
            }
        }
    }

    /// JSON field holding the argument, for tools that take one
    pub fn argument_key(self) -> Option<&'static str> {
        match self {
            ResearchTool::NewsFlash => Some("count"),
            ResearchTool::SearchNews => Some("query"),
            ResearchTool::SectorFlows => Some("limit"),
            ResearchTool::ShanghaiIntraday => Some("minutes"),
            ResearchTool::FundEstimate => Some("code"),
            ResearchTool::FetchPage => Some("url"),
            _ => None,
        }
    }
}

impl fmt::Display for ResearchTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResearchTool {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        ResearchTool::ALL
            .into_iter()
            .find(|tool| tool.name() == s.trim())
            .ok_or_else(|| MarketError::InvalidInput(format!("unknown research tool '{s}'")))
    }
}

/// Output limits applied by the tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolLimits {
    pub default_news: usize,
    pub max_news: usize,
    pub default_sectors: usize,
    pub default_minutes: usize,
    pub gold_days: usize,
    pub page_text_limit: usize,
    pub fund_concurrency: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            default_news: 20,
            max_news: SEARCH_NEWS_WINDOW,
            default_sectors: 10,
            default_minutes: 30,
            gold_days: 10,
            page_text_limit: 4000,
            fund_concurrency: 5,
        }
    }
}

impl ToolLimits {
    /// Limits taken from the market configuration
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            page_text_limit: config.page_text_limit,
            fund_concurrency: config.fund_concurrency,
            ..Self::default()
        }
    }
}

/// A [`ResearchTool`] bound to its collaborators
pub struct MarketTool {
    kind: ResearchTool,
    source: Arc<dyn MarketDataSource>,
    watchlist: Arc<FundWatchlist>,
    limits: ToolLimits,
}

impl MarketTool {
    pub fn new(
        kind: ResearchTool,
        source: Arc<dyn MarketDataSource>,
        watchlist: Arc<FundWatchlist>,
        limits: ToolLimits,
    ) -> Self {
        Self {
            kind,
            source,
            watchlist,
            limits,
        }
    }

    pub fn kind(&self) -> ResearchTool {
        self.kind
    }

    async fn run(&self, input: &str) -> Result<String> {
        let input = input.trim();
        debug!(tool = %self.kind, input, "Running research tool");

        match self.kind {
            ResearchTool::MarketIndices => {
                let indices = self.source.market_indices().await?;
                Ok(bullet_list("Market indices", &indices))
            }
            ResearchTool::NewsFlash => {
                let count = parse_count(input, self.limits.default_news, self.limits.max_news)?;
                let news = self.source.news_flash(count).await?;
                Ok(bullet_list("News flash", &news))
            }
            ResearchTool::SearchNews => {
                if input.is_empty() {
                    return Err(MarketError::InvalidInput("a search keyword is required".into()));
                }
                let news = self.source.news_flash(SEARCH_NEWS_WINDOW).await?;
                let hits: Vec<_> = news.into_iter().filter(|item| item.matches(input)).collect();
                if hits.is_empty() {
                    return Ok(format!(
                        "No news mentioning '{input}' in the latest {SEARCH_NEWS_WINDOW} flashes."
                    ));
                }
                Ok(bullet_list(&format!("News mentioning '{input}'"), &hits))
            }
            ResearchTool::SectorFlows => {
                let limit = parse_count(input, self.limits.default_sectors, usize::MAX)?;
                let sectors = self.source.sector_flows().await?;
                let top: Vec<_> = sectors.into_iter().take(limit).collect();
                Ok(bullet_list("Sectors by change", &top))
            }
            ResearchTool::GoldPrices => {
                let days = self.source.gold_history().await?;
                let recent: Vec<_> = days.into_iter().take(self.limits.gold_days).collect();
                Ok(bullet_list("Domestic gold prices (CNY/g)", &recent))
            }
            ResearchTool::PreciousMetals => {
                let metals = self.source.precious_metals().await?;
                Ok(bullet_list("Precious metals", &metals))
            }
            ResearchTool::TurnoverTrend => {
                let days = self.source.turnover_trend().await?;
                Ok(bullet_list("Turnover trend", &days))
            }
            ResearchTool::ShanghaiIntraday => {
                let minutes = parse_count(input, self.limits.default_minutes, usize::MAX)?;
                let points = self.source.shanghai_intraday().await?;
                let skip = points.len().saturating_sub(minutes);
                Ok(bullet_list("Shanghai Composite intraday", &points[skip..]))
            }
            ResearchTool::FundWatchlist => self.render_watchlist().await,
            ResearchTool::FundEstimate => {
                let code = validate_fund_code(input)?;
                Ok(self.source.fund_estimate(code).await?.to_string())
            }
            ResearchTool::FetchPage => {
                let url = validate_url(input)?;
                let page = self.source.fetch_page(url.as_str()).await?;
                let mut out = String::new();
                if let Some(title) = &page.title {
                    out.push_str(&format!("Title: {title}\n"));
                }
                out.push_str(&truncate_chars(&page.text, self.limits.page_text_limit));
                Ok(out)
            }
        }
    }

    async fn render_watchlist(&self) -> Result<String> {
        if self.watchlist.is_empty() {
            return Ok("The watchlist is empty.".to_string());
        }

        let rows = self
            .watchlist
            .fetch_estimates(self.source.as_ref(), self.limits.fund_concurrency)
            .await;
        let lines: Vec<String> = rows
            .iter()
            .map(|row| {
                let mut line = format!("{} {}", row.code, row.name());
                if row.fund.is_hold {
                    line.push_str(" [held]");
                }
                if !row.fund.sectors.is_empty() {
                    line.push_str(&format!(" sectors: {}", row.fund.sectors.join("/")));
                }
                match &row.estimate {
                    Ok(estimate) => line.push_str(&format!(
                        ", estimate {}",
                        estimate
                            .estimate_change_pct
                            .map_or_else(|| "N/A".to_string(), |pct| format!("{pct:+.2}%"))
                    )),
                    Err(reason) => line.push_str(&format!(", estimate unavailable: {reason}")),
                }
                line
            })
            .collect();

        let mut out = bullet_list("Fund watchlist", &lines);
        if let Some(summary) = PositionSummary::from_rows(&rows, Local::now().date_naive()) {
            out.push_str(&format!("\n\n{summary}"));
        }
        Ok(out)
    }
}

#[async_trait]
impl Tool for MarketTool {
    async fn call(&self, input: &str) -> agent_tools::Result<String> {
        self.run(input).await.map_err(ToolError::from)
    }

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn argument_key(&self) -> Option<&str> {
        self.kind.argument_key()
    }
}

/// Build the registry with every research tool and default limits
pub fn build_registry(
    source: Arc<dyn MarketDataSource>,
    watchlist: Arc<FundWatchlist>,
) -> Result<ToolRegistry> {
    build_registry_with(source, watchlist, ToolLimits::default())
}

/// Build the registry with every research tool
pub fn build_registry_with(
    source: Arc<dyn MarketDataSource>,
    watchlist: Arc<FundWatchlist>,
    limits: ToolLimits,
) -> Result<ToolRegistry> {
    ResearchTool::ALL
        .into_iter()
        .fold(ToolRegistry::builder(), |builder, kind| {
            builder.register(MarketTool::new(
                kind,
                Arc::clone(&source),
                Arc::clone(&watchlist),
                limits,
            ))
        })
        .build()
        .map_err(|err| MarketError::Config(err.to_string()))
}

/// Parse a count argument; empty means `default`, values clamp to `1..=max`
fn parse_count(input: &str, default: usize, max: usize) -> Result<usize> {
    if input.is_empty() {
        return Ok(default.min(max));
    }
    let count: usize = input
        .parse()
        .map_err(|_| MarketError::InvalidInput(format!("expected a positive number, got '{input}'")))?;
    Ok(count.clamp(1, max))
}

fn validate_url(input: &str) -> Result<url::Url> {
    let url = url::Url::parse(input)
        .map_err(|err| MarketError::InvalidInput(format!("invalid URL '{input}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(MarketError::InvalidInput(format!(
            "unsupported URL scheme '{scheme}'"
        ))),
    }
}
