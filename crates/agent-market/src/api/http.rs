//! HTTP client for the public market data endpoints

use super::MarketDataSource;
use super::parse::{
    html_to_text, parse_fund_estimate, parse_gold_history, parse_index_banner,
    parse_index_quotation, parse_intraday, parse_news_flash, parse_precious_metals,
    parse_sector_flows, parse_turnover, strip_js_assignment,
};
use crate::cache::{CacheKey, CacheManager, DataCache};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::models::{
    FundEstimate, GoldDay, IndexQuote, IntradayPoint, MetalQuote, NewsItem, PageText, SectorFlow,
    TurnoverDay,
};
use async_trait::async_trait;
use chrono::Utc;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument};

const BAIDU_BANNER_URL: &str = "https://finance.pae.baidu.com/api/getbanner";
const BAIDU_QUOTATION_URL: &str = "https://finance.pae.baidu.com/vapi/v1/getquotation";
const BAIDU_NEWS_URL: &str = "https://finance.pae.baidu.com/selfselect/expressnews";
const BAIDU_TREND_URL: &str = "https://finance.pae.baidu.com/sapi/v1/metrictrend";
const BAIDU_REFERER: &str = "https://gushitong.baidu.com/";
const EASTMONEY_SECTOR_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";
const JIJINHAO_HISTORY_URL: &str = "https://api.jijinhao.com/quoteCenter/history.htm";
const JIJINHAO_REALTIME_URL: &str = "https://api.jijinhao.com/quoteCenter/realTime.htm";
const JIJINHAO_REFERER: &str = "https://quote.cngold.org/gjs/gjhj.html";
const FUND_ESTIMATE_URL: &str = "https://fundgz.1234567.com.cn/js";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

const CHINA_GOLD_CODE: &str = "JO_52683";
const CHOW_TAI_FOOK_CODE: &str = "JO_42660";
const CHINEXT_CODE: &str = "399006";
const CHINEXT_NAME: &str = "创业板指";
const SHANGHAI_CODE: &str = "000001";
const SHANGHAI_NAME: &str = "上证指数";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Market data client backed by public web endpoints.
///
/// Requests share one rate limiter; responses are cached per data set.
#[derive(Clone)]
pub struct HttpMarketClient {
    client: Client,
    rate_limiter: SharedRateLimiter,
    cache: CacheManager,
}

impl HttpMarketClient {
    /// Create a client from the market configuration
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        let per_minute = NonZeroU32::new(config.rate_limit_per_minute)
            .ok_or_else(|| MarketError::Config("rate limit must be positive".to_string()))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            rate_limiter,
            cache: CacheManager::new(config.cache_ttl_realtime, config.cache_ttl_daily),
        })
    }

    /// Drop every cached response
    pub async fn clear_cache(&self) {
        self.cache.clear_all().await;
    }

    async fn get_text<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
        headers: HeaderMap,
    ) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(query)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Api(format!("HTTP {status} from {url}")));
        }
        Ok(response.text().await?)
    }

    async fn get_json<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
        headers: HeaderMap,
    ) -> Result<Value> {
        let text = self.get_text(url, query, headers).await?;
        Ok(serde_json::from_str(strip_js_assignment(&text))?)
    }

    /// Fetch through `cache`, storing the parsed model as JSON
    async fn cached<T, F, Fut>(&self, cache: &DataCache, key: CacheKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = cache
            .get_or_fetch(key, || async { Ok::<_, MarketError>(serde_json::to_value(fetch().await?)?) })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn index_quotation(&self, code: &str, name: &str) -> Result<Value> {
        let query = [
            ("srcid", "5353"),
            ("all", "1"),
            ("pointType", "string"),
            ("group", "quotation_index_minute"),
            ("query", code),
            ("code", code),
            ("market_type", "ab"),
            ("newFormat", "1"),
            ("name", name),
            ("finClientType", "pc"),
        ];
        self.get_json(BAIDU_QUOTATION_URL, &query, baidu_headers())
            .await
    }

    async fn gold_series(&self, code: &str) -> Result<Value> {
        let now = Utc::now().timestamp_millis().to_string();
        let query = [
            ("code", code),
            ("style", "3"),
            ("pageSize", "10"),
            ("needField", "128,129,70"),
            ("currentPage", "1"),
            ("_", now.as_str()),
        ];
        self.get_json(JIJINHAO_HISTORY_URL, &query, jijinhao_headers())
            .await
    }
}

fn baidu_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.finance-web.v1+json"),
    );
    headers.insert(REFERER, HeaderValue::from_static(BAIDU_REFERER));
    headers.insert("origin", HeaderValue::from_static("https://gushitong.baidu.com"));
    headers
}

fn jijinhao_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(REFERER, HeaderValue::from_static(JIJINHAO_REFERER));
    headers
}

#[async_trait]
impl MarketDataSource for HttpMarketClient {
    #[instrument(skip(self))]
    async fn market_indices(&self) -> Result<Vec<IndexQuote>> {
        self.cached(&self.cache.realtime, CacheKey::new("market_indices", json!({})), || async {
            let mut quotes = Vec::new();
            for market in ["asia", "america"] {
                let query = [("market", market), ("finClientType", "pc")];
                let payload = self.get_json(BAIDU_BANNER_URL, &query, baidu_headers()).await?;
                quotes.extend(parse_index_banner(&payload)?);
            }

            // ChiNext is not part of the banner; it goes after the first two
            // Asian indices.
            let chinext = self
                .index_quotation(CHINEXT_CODE, CHINEXT_NAME)
                .await
                .and_then(|payload| parse_index_quotation(&payload, CHINEXT_NAME));
            match chinext {
                Ok(quote) => quotes.insert(quotes.len().min(2), quote),
                Err(err) => debug!(error = %err, "ChiNext quotation unavailable"),
            }
            debug!(count = quotes.len(), "Fetched market indices");
            Ok(quotes)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn news_flash(&self, count: usize) -> Result<Vec<NewsItem>> {
        let key = CacheKey::new("news_flash", json!({ "count": count }));
        self.cached(&self.cache.realtime, key, || async {
            let count = count.to_string();
            let query = [
                ("rn", count.as_str()),
                ("pn", "0"),
                ("tag", "A股"),
                ("finClientType", "pc"),
            ];
            let payload = self.get_json(BAIDU_NEWS_URL, &query, baidu_headers()).await?;
            parse_news_flash(&payload)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn sector_flows(&self) -> Result<Vec<SectorFlow>> {
        self.cached(&self.cache.realtime, CacheKey::new("sector_flows", json!({})), || async {
            let query = [
                ("fid", "f62"),
                ("po", "1"),
                ("pz", "100"),
                ("pn", "1"),
                ("np", "1"),
                ("fltt", "2"),
                ("invt", "2"),
                ("ut", "8dec03ba335b81bf4ebdf7b29ec27d15"),
                ("fs", "m:90 t:2"),
                ("fields", "f12,f14,f2,f3,f62,f184,f66,f69,f72,f75,f78,f81,f84,f87,f204,f205,f124,f1,f13"),
            ];
            let payload = self
                .get_json(EASTMONEY_SECTOR_URL, &query, HeaderMap::new())
                .await?;
            parse_sector_flows(&payload)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn gold_history(&self) -> Result<Vec<GoldDay>> {
        self.cached(&self.cache.daily, CacheKey::new("gold_history", json!({})), || async {
            let (china_gold, chow_tai_fook) = tokio::try_join!(
                self.gold_series(CHINA_GOLD_CODE),
                self.gold_series(CHOW_TAI_FOOK_CODE)
            )?;
            parse_gold_history(&china_gold, &chow_tai_fook)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn precious_metals(&self) -> Result<Vec<MetalQuote>> {
        self.cached(&self.cache.realtime, CacheKey::new("precious_metals", json!({})), || async {
            let now = Utc::now().timestamp_millis().to_string();
            let query = [("codes", "JO_71,JO_92233,JO_92232,JO_75"), ("_", now.as_str())];
            let payload = self
                .get_json(JIJINHAO_REALTIME_URL, &query, jijinhao_headers())
                .await?;
            parse_precious_metals(&payload)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn turnover_trend(&self) -> Result<Vec<TurnoverDay>> {
        self.cached(&self.cache.daily, CacheKey::new("turnover_trend", json!({})), || async {
            let query = [
                ("financeType", "index"),
                ("market", "ab"),
                ("code", SHANGHAI_CODE),
                ("targetType", "market"),
                ("metric", "amount"),
                ("finClientType", "pc"),
            ];
            let payload = self.get_json(BAIDU_TREND_URL, &query, baidu_headers()).await?;
            parse_turnover(&payload)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn shanghai_intraday(&self) -> Result<Vec<IntradayPoint>> {
        self.cached(&self.cache.realtime, CacheKey::new("shanghai_intraday", json!({})), || async {
            let payload = self.index_quotation(SHANGHAI_CODE, SHANGHAI_NAME).await?;
            parse_intraday(&payload)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fund_estimate(&self, code: &str) -> Result<FundEstimate> {
        let key = CacheKey::new("fund_estimate", json!({ "code": code }));
        self.cached(&self.cache.realtime, key, || async {
            let url = format!("{FUND_ESTIMATE_URL}/{code}.js");
            let now = Utc::now().timestamp_millis().to_string();
            let text = self
                .get_text(&url, &[("rt", now.as_str())], HeaderMap::new())
                .await?;
            parse_fund_estimate(code, &text)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<PageText> {
        let html = self
            .get_text(url, &[] as &[(&str, &str)], HeaderMap::new())
            .await?;
        let (title, text) = html_to_text(&html);
        debug!(text_len = text.len(), "Fetched page");
        Ok(PageText {
            url: url.to_string(),
            title,
            text,
        })
    }
}
