//! Configuration for market data, research runs and report output

use crate::error::{MarketError, Result};
use agent_core::RunBudget;
use agent_llm::providers::OpenAIConfig;
use agent_utils::{env_parse, env_string};
use std::path::PathBuf;
use std::time::Duration;

/// Reasoning backend API key
pub const ENV_LLM_API_KEY: &str = "LLM_API_KEY";
/// Reasoning backend base URL
pub const ENV_LLM_API_BASE: &str = "LLM_API_BASE";
/// Reasoning backend model
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
/// Reasoning backend request timeout in seconds
pub const ENV_LLM_TIMEOUT_SECS: &str = "LLM_TIMEOUT_SECS";
/// Iteration budget for deep research
pub const ENV_MAX_ITERATIONS: &str = "RESEARCH_MAX_ITERATIONS";
/// Wall-clock budget for deep research in seconds
pub const ENV_MAX_SECONDS: &str = "RESEARCH_MAX_SECONDS";
/// Directory receiving reports
pub const ENV_REPORT_DIR: &str = "REPORT_DIR";
/// Fund watchlist file
pub const ENV_FUND_MAP_PATH: &str = "FUND_MAP_PATH";

/// Configuration for market operations
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Reasoning backend API key; AI features are skipped without one
    pub llm_api_key: Option<String>,

    /// OpenAI-compatible base URL
    pub llm_api_base: String,

    /// Model name
    pub llm_model: String,

    /// Reasoning backend request timeout
    pub llm_timeout: Duration,

    /// Deep research iteration limit
    pub max_iterations: usize,

    /// Deep research wall-clock limit
    pub max_duration: Duration,

    /// Reports are written here when set
    pub report_dir: Option<PathBuf>,

    /// Fund watchlist JSON file
    pub fund_map_path: PathBuf,

    /// HTTP request timeout for data sources
    pub request_timeout: Duration,

    /// Cache TTL for real-time data (quotes, news, intraday)
    pub cache_ttl_realtime: Duration,

    /// Cache TTL for daily series (gold history, turnover)
    pub cache_ttl_daily: Duration,

    /// Data source requests allowed per minute
    pub rate_limit_per_minute: u32,

    /// Concurrent fund estimate requests
    pub fund_concurrency: usize,

    /// Characters of page text handed to the agent
    pub page_text_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let budget = RunBudget::default();
        Self {
            llm_api_key: None,
            llm_api_base: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-3.5-turbo".to_string(),
            llm_timeout: Duration::from_secs(60),
            max_iterations: budget.max_iterations,
            max_duration: budget.max_duration,
            report_dir: None,
            fund_map_path: PathBuf::from("cache/fund_map.json"),
            request_timeout: Duration::from_secs(10),
            cache_ttl_realtime: Duration::from_secs(60),  // 1 minute
            cache_ttl_daily: Duration::from_secs(600),    // 10 minutes
            rate_limit_per_minute: 120,
            fund_concurrency: 5,
            page_text_limit: 4000,
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(MarketError::Config(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        if self.max_duration.is_zero() {
            return Err(MarketError::Config(
                "max_duration must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.llm_timeout.is_zero() {
            return Err(MarketError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_per_minute == 0 || self.fund_concurrency == 0 {
            return Err(MarketError::Config(
                "rate limit and fund concurrency must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Budget applied to every deep research run
    pub fn budget(&self) -> RunBudget {
        RunBudget::new(self.max_iterations, self.max_duration)
    }

    /// Whether AI features can run
    pub fn has_llm(&self) -> bool {
        self.llm_api_key.is_some()
    }

    /// Provider configuration, when an API key is present
    pub fn llm_config(&self) -> Option<OpenAIConfig> {
        self.llm_api_key.as_ref().map(|key| {
            OpenAIConfig::new(key.clone())
                .with_api_base(self.llm_api_base.clone())
                .with_timeout(self.llm_timeout.as_secs())
        })
    }
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    llm_api_key: Option<String>,
    llm_api_base: Option<String>,
    llm_model: Option<String>,
    llm_timeout: Option<Duration>,
    max_iterations: Option<usize>,
    max_duration: Option<Duration>,
    report_dir: Option<PathBuf>,
    fund_map_path: Option<PathBuf>,
    request_timeout: Option<Duration>,
    cache_ttl_realtime: Option<Duration>,
    cache_ttl_daily: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
    fund_concurrency: Option<usize>,
    page_text_limit: Option<usize>,
}

impl MarketConfigBuilder {
    /// Set the reasoning backend API key
    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = Some(key.into());
        self
    }

    /// Set the reasoning backend base URL
    pub fn llm_api_base(mut self, base: impl Into<String>) -> Self {
        self.llm_api_base = Some(base.into());
        self
    }

    /// Set the model
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    /// Set the reasoning backend timeout
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    /// Set the deep research iteration limit
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Set the deep research wall-clock limit
    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Write reports to `dir`
    pub fn report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Set the watchlist file
    pub fn fund_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fund_map_path = Some(path.into());
        self
    }

    /// Set the data source request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set cache TTL for real-time data
    pub fn cache_ttl_realtime(mut self, ttl: Duration) -> Self {
        self.cache_ttl_realtime = Some(ttl);
        self
    }

    /// Set cache TTL for daily series
    pub fn cache_ttl_daily(mut self, ttl: Duration) -> Self {
        self.cache_ttl_daily = Some(ttl);
        self
    }

    /// Set the data source rate limit
    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    /// Set concurrent fund estimate requests
    pub fn fund_concurrency(mut self, concurrency: usize) -> Self {
        self.fund_concurrency = Some(concurrency);
        self
    }

    /// Set the page text limit for `fetch_page`
    pub fn page_text_limit(mut self, limit: usize) -> Self {
        self.page_text_limit = Some(limit);
        self
    }

    /// Fill unset fields from the environment.
    ///
    /// Values already set on the builder win, so CLI flags can be applied
    /// before or after this call.
    pub fn with_env(mut self) -> Result<Self> {
        self.llm_api_key = self.llm_api_key.or_else(|| env_string(ENV_LLM_API_KEY));
        self.llm_api_base = self.llm_api_base.or_else(|| env_string(ENV_LLM_API_BASE));
        self.llm_model = self.llm_model.or_else(|| env_string(ENV_LLM_MODEL));
        self.report_dir = self
            .report_dir
            .or_else(|| env_string(ENV_REPORT_DIR).map(PathBuf::from));
        self.fund_map_path = self
            .fund_map_path
            .or_else(|| env_string(ENV_FUND_MAP_PATH).map(PathBuf::from));

        if self.llm_timeout.is_none() {
            self.llm_timeout = env_parse::<u64>(ENV_LLM_TIMEOUT_SECS)?.map(Duration::from_secs);
        }
        if self.max_iterations.is_none() {
            self.max_iterations = env_parse(ENV_MAX_ITERATIONS)?;
        }
        if self.max_duration.is_none() {
            self.max_duration = env_parse::<u64>(ENV_MAX_SECONDS)?.map(Duration::from_secs);
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            llm_api_key: self.llm_api_key,
            llm_api_base: self.llm_api_base.unwrap_or(defaults.llm_api_base),
            llm_model: self.llm_model.unwrap_or(defaults.llm_model),
            llm_timeout: self.llm_timeout.unwrap_or(defaults.llm_timeout),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_duration: self.max_duration.unwrap_or(defaults.max_duration),
            report_dir: self.report_dir,
            fund_map_path: self.fund_map_path.unwrap_or(defaults.fund_map_path),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            cache_ttl_realtime: self.cache_ttl_realtime.unwrap_or(defaults.cache_ttl_realtime),
            cache_ttl_daily: self.cache_ttl_daily.unwrap_or(defaults.cache_ttl_daily),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            fund_concurrency: self.fund_concurrency.unwrap_or(defaults.fund_concurrency),
            page_text_limit: self.page_text_limit.unwrap_or(defaults.page_text_limit),
        };

        config.validate()?;
        Ok(config)
    }
}
