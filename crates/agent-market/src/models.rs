//! Market data models
//!
//! Every model renders a one-line `Display` form used in tool observations
//! and briefing summaries.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A major market index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub price: String,
    /// Change ratio as published, e.g. `+0.52%`
    pub change_pct: String,
}

impl fmt::Display for IndexQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.name, self.price, self.change_pct)
    }
}

/// A 7x24 news flash entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub published_at: DateTime<Local>,
    pub title: String,
    /// Bullish/bearish tag when the source provides one
    pub sentiment: Option<String>,
    /// Affected stocks as `code-name ratio`
    pub entities: Vec<String>,
}

impl NewsItem {
    /// Whether the title or an affected stock mentions `query` (case-insensitive)
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self
                .entities
                .iter()
                .any(|entity| entity.to_lowercase().contains(&needle))
    }
}

impl fmt::Display for NewsItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.published_at.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(sentiment) = &self.sentiment {
            write!(f, "[{sentiment}] ")?;
        }
        write!(f, "{}", self.title)?;
        if !self.entities.is_empty() {
            let shown: Vec<&str> = self.entities.iter().take(3).map(String::as_str).collect();
            write!(f, " (affects: {})", shown.join(", "))?;
        }
        Ok(())
    }
}

/// Capital flow for one industry sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorFlow {
    pub name: String,
    /// Percent change today
    pub change_pct: f64,
    /// Main-force net inflow in CNY
    pub main_net_inflow: f64,
    /// Main-force net inflow as percent of turnover
    pub main_inflow_ratio: f64,
    /// Small-order net inflow in CNY
    pub small_net_inflow: f64,
    /// Small-order net inflow as percent of turnover
    pub small_inflow_ratio: f64,
}

impl fmt::Display for SectorFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:+.2}%, main net inflow {}, main inflow ratio {:.2}%",
            self.name,
            self.change_pct,
            format_yi(self.main_net_inflow),
            self.main_inflow_ratio
        )
    }
}

/// One day of domestic gold prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldDay {
    pub date: NaiveDate,
    /// China Gold base price, CNY per gram
    pub china_gold: Option<f64>,
    /// Chow Tai Fook price, CNY per gram
    pub chow_tai_fook: Option<f64>,
    pub china_gold_change: Option<f64>,
    pub chow_tai_fook_change: Option<f64>,
}

impl fmt::Display for GoldDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: China Gold {}, Chow Tai Fook {}, change ({}, {})",
            self.date,
            format_opt(self.china_gold),
            format_opt(self.chow_tai_fook),
            format_opt(self.china_gold_change),
            format_opt(self.chow_tai_fook_change)
        )
    }
}

/// Real-time precious metal quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetalQuote {
    pub name: String,
    pub last: Option<f64>,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub prev_close: Option<f64>,
    pub updated_at: Option<DateTime<Local>>,
    pub unit: String,
}

impl fmt::Display for MetalQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: last {} {}, change {} ({}%), open {}, high {}, low {}, prev close {}",
            self.name,
            format_opt(self.last),
            self.unit,
            format_opt(self.change),
            format_opt(self.change_pct),
            format_opt(self.open),
            format_opt(self.high),
            format_opt(self.low),
            format_opt(self.prev_close)
        )?;
        if let Some(at) = self.updated_at {
            write!(f, " at {}", at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Daily turnover across the exchanges, in 100 million CNY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoverDay {
    pub date: String,
    pub total: String,
    pub shanghai: String,
    pub shenzhen: String,
    pub beijing: String,
}

impl fmt::Display for TurnoverDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: total {}亿, Shanghai {}亿, Shenzhen {}亿, Beijing {}亿",
            self.date, self.total, self.shanghai, self.shenzhen, self.beijing
        )
    }
}

/// One minute of the Shanghai Composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayPoint {
    pub time: String,
    pub price: f64,
    pub change: f64,
    pub change_pct: f64,
    /// Volume in lots
    pub volume: f64,
    /// Turnover in CNY
    pub amount: f64,
}

impl fmt::Display for IntradayPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2}, change {:+.2} ({:+.2}%), volume {:.2}万手, amount {}",
            self.time,
            self.price,
            self.change,
            self.change_pct,
            self.volume / 10_000.0,
            format_yi(self.amount)
        )
    }
}

/// Intraday valuation estimate for a fund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundEstimate {
    pub code: String,
    pub name: String,
    /// Date of the last published NAV
    pub nav_date: String,
    pub nav: Option<f64>,
    pub estimate: Option<f64>,
    pub estimate_change_pct: Option<f64>,
    pub estimated_at: String,
}

impl fmt::Display for FundEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: estimate {} ({}%) at {}, last NAV {} on {}",
            self.code,
            self.name,
            format_opt(self.estimate),
            self.estimate_change_pct
                .map_or_else(|| "N/A".to_string(), |pct| format!("{pct:+.2}")),
            self.estimated_at,
            format_opt(self.nav),
            self.nav_date
        )
    }
}

/// Readable text of a web page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

/// Format CNY amounts in units of 100 million (亿)
pub fn format_yi(amount: f64) -> String {
    format!("{:.2}亿", amount / 100_000_000.0)
}

fn format_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sector_display() {
        let sector = SectorFlow {
            name: "Semiconductors".to_string(),
            change_pct: 2.35,
            main_net_inflow: 1_523_000_000.0,
            main_inflow_ratio: 4.5,
            small_net_inflow: -300_000_000.0,
            small_inflow_ratio: -1.2,
        };
        assert_eq!(
            sector.to_string(),
            "Semiconductors: +2.35%, main net inflow 15.23亿, main inflow ratio 4.50%"
        );
    }

    #[test]
    fn test_news_display_and_match() {
        let item = NewsItem {
            published_at: Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            title: "Chip stocks rally".to_string(),
            sentiment: Some("利好".to_string()),
            entities: vec!["688981-SMIC +5.1%".to_string()],
        };
        assert_eq!(
            item.to_string(),
            "2024-03-01 09:30:00 [利好] Chip stocks rally (affects: 688981-SMIC +5.1%)"
        );
        assert!(item.matches("chip"));
        assert!(item.matches("smic"));
        assert!(!item.matches("gold"));
    }

    #[test]
    fn test_fund_estimate_missing_values() {
        let estimate = FundEstimate {
            code: "110022".to_string(),
            name: "Consumer Industry".to_string(),
            nav_date: "2024-03-01".to_string(),
            nav: Some(3.1),
            estimate: None,
            estimate_change_pct: None,
            estimated_at: "2024-03-04 10:00".to_string(),
        };
        assert_eq!(
            estimate.to_string(),
            "110022 Consumer Industry: estimate N/A (N/A%) at 2024-03-04 10:00, last NAV 3.10 on 2024-03-01"
        );
    }
}
