//! Payload parsers for the HTTP data sources
//!
//! Pure functions over `serde_json::Value` or raw text so they can be tested
//! against fixture payloads without a network.

use crate::error::{MarketError, Result};
use crate::models::{
    FundEstimate, GoldDay, IndexQuote, IntradayPoint, MetalQuote, NewsItem, SectorFlow, TurnoverDay,
};
use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Real-time precious metal codes, in display order
pub const METAL_CODES: [&str; 3] = ["JO_71", "JO_92233", "JO_92232"];

/// Trading days kept from the turnover trend
pub const TURNOVER_DAYS: usize = 7;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<!--.*?-->")
        .expect("static script regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static title regex"));
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?(p|div|li|tr|h[1-6]|section|article|header|footer|ul|ol|table)\b[^>]*>")
        .expect("static block regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static tag regex"));
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}\u{3000}]+").expect("static space regex"));

/// Number or numeric string (`"+1.25"`, `"0.8%"`); `-` and blanks are `None`
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

/// String or number rendered as text
pub fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn local_from_millis(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}

/// Fails unless the response carries `ResultCode` 0 (string or number)
pub fn ensure_result_code(payload: &Value) -> Result<()> {
    let code = payload.get("ResultCode").and_then(value_string);
    match code.as_deref() {
        Some("0") => Ok(()),
        Some(other) => Err(MarketError::Api(format!("ResultCode {other}"))),
        None => Err(MarketError::missing("ResultCode")),
    }
}

/// Index banner: `Result.list[] {name, lastPrice, ratio}`
pub fn parse_index_banner(payload: &Value) -> Result<Vec<IndexQuote>> {
    ensure_result_code(payload)?;
    let list = payload
        .pointer("/Result/list")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::missing("Result.list"))?;

    Ok(list
        .iter()
        .filter_map(|entry| {
            Some(IndexQuote {
                name: entry.get("name").and_then(value_string)?,
                price: entry.get("lastPrice").and_then(value_string)?,
                change_pct: entry.get("ratio").and_then(value_string)?,
            })
        })
        .collect())
}

/// Single index quotation: `Result.cur {price, ratio}`
pub fn parse_index_quotation(payload: &Value, name: &str) -> Result<IndexQuote> {
    ensure_result_code(payload)?;
    let cur = payload
        .pointer("/Result/cur")
        .ok_or_else(|| MarketError::missing("Result.cur"))?;

    Ok(IndexQuote {
        name: name.to_string(),
        price: cur
            .get("price")
            .and_then(value_string)
            .ok_or_else(|| MarketError::missing("cur.price"))?,
        change_pct: cur
            .get("ratio")
            .and_then(value_string)
            .ok_or_else(|| MarketError::missing("cur.ratio"))?,
    })
}

/// News flash: `Result.content.list[]`
pub fn parse_news_flash(payload: &Value) -> Result<Vec<NewsItem>> {
    ensure_result_code(payload)?;
    let list = payload
        .pointer("/Result/content/list")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::missing("Result.content.list"))?;

    Ok(list.iter().filter_map(parse_news_entry).collect())
}

fn parse_news_entry(entry: &Value) -> Option<NewsItem> {
    let seconds = entry
        .get("publish_time")
        .and_then(value_string)?
        .parse::<i64>()
        .ok()?;
    let published_at = Local.timestamp_opt(seconds, 0).single()?;

    let title = entry
        .get("title")
        .and_then(value_string)
        .filter(|t| !t.is_empty())
        .or_else(|| entry.pointer("/content/items/0/data").and_then(value_string))?;

    let sentiment = entry
        .get("evaluate")
        .and_then(value_string)
        .filter(|e| !e.is_empty());

    let entities = entry
        .get("entity")
        .and_then(Value::as_array)
        .map(|entities| {
            entities
                .iter()
                .map(|e| {
                    let field = |key: &str| e.get(key).and_then(value_string).unwrap_or_default();
                    format!("{}-{} {}", field("code"), field("name"), field("ratio"))
                        .trim()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    Some(NewsItem {
        published_at,
        title,
        sentiment,
        entities,
    })
}

/// Sector capital flows: `data.diff[] {f14, f3, f62, f184, f84, f87}`,
/// sorted by change descending
pub fn parse_sector_flows(payload: &Value) -> Result<Vec<SectorFlow>> {
    let diff = payload
        .pointer("/data/diff")
        .ok_or_else(|| MarketError::missing("data.diff"))?;

    let entries: Vec<&Value> = match diff {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return Err(MarketError::Parse("data.diff is not a list".to_string())),
    };

    let number = |entry: &Value, key: &str| entry.get(key).and_then(value_f64).unwrap_or(0.0);
    let mut sectors: Vec<SectorFlow> = entries
        .into_iter()
        .filter_map(|entry| {
            Some(SectorFlow {
                name: entry.get("f14").and_then(value_string)?,
                change_pct: entry.get("f3").and_then(value_f64)?,
                main_net_inflow: number(entry, "f62"),
                main_inflow_ratio: number(entry, "f184"),
                small_net_inflow: number(entry, "f84"),
                small_inflow_ratio: number(entry, "f87"),
            })
        })
        .collect();

    sectors.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));
    Ok(sectors)
}

/// Strip a `var quote_json = ...;` JavaScript assignment down to its JSON
pub fn strip_js_assignment(text: &str) -> &str {
    let body = text.trim();
    let body = match body.strip_prefix("var ") {
        Some(rest) => rest.split_once('=').map_or(rest, |(_, json)| json),
        None => body,
    };
    body.trim().trim_end_matches(';').trim()
}

/// Gold history for China Gold and Chow Tai Fook, paired by position,
/// newest first
pub fn parse_gold_history(china_gold: &Value, chow_tai_fook: &Value) -> Result<Vec<GoldDay>> {
    let primary = china_gold
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::missing("data"))?;
    let secondary = chow_tai_fook
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut days: Vec<GoldDay> = primary
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let millis = entry.get("time").and_then(Value::as_i64)?;
            let date = local_from_millis(millis)?.date_naive();
            let paired = secondary.get(i);
            Some(GoldDay {
                date,
                china_gold: entry.get("q1").and_then(value_f64),
                chow_tai_fook: paired.and_then(|p| p.get("q1")).and_then(value_f64),
                china_gold_change: entry.get("q70").and_then(value_f64),
                chow_tai_fook_change: paired.and_then(|p| p.get("q70")).and_then(value_f64),
            })
        })
        .collect();

    days.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(days)
}

/// Real-time metals keyed by [`METAL_CODES`]
pub fn parse_precious_metals(payload: &Value) -> Result<Vec<MetalQuote>> {
    let quotes: Vec<MetalQuote> = METAL_CODES
        .iter()
        .filter_map(|code| payload.get(*code))
        .map(|quote| {
            let number = |key: &str| quote.get(key).and_then(value_f64);
            MetalQuote {
                name: quote
                    .get("showName")
                    .and_then(value_string)
                    .unwrap_or_else(|| "N/A".to_string()),
                last: number("q63"),
                change: number("q70"),
                change_pct: number("q80"),
                open: number("q1"),
                high: number("q3"),
                low: number("q4"),
                prev_close: number("q2"),
                updated_at: quote
                    .get("time")
                    .and_then(Value::as_i64)
                    .and_then(local_from_millis),
                unit: quote
                    .get("unit")
                    .and_then(value_string)
                    .unwrap_or_default(),
            }
        })
        .collect();

    if quotes.is_empty() {
        return Err(MarketError::Parse("no precious metal quotes".to_string()));
    }
    Ok(quotes)
}

/// Intraday minute bars: `Result.newMarketData.marketData[0].p`, records
/// separated by `;`, fields by `,` (timestamp, time, price, change, pct,
/// volume, amount, ...)
pub fn parse_intraday(payload: &Value) -> Result<Vec<IntradayPoint>> {
    ensure_result_code(payload)?;
    let series = payload
        .pointer("/Result/newMarketData/marketData/0/p")
        .and_then(Value::as_str)
        .ok_or_else(|| MarketError::missing("marketData[0].p"))?;

    Ok(series
        .split(';')
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let fields: Vec<&str> = record.split(',').collect();
            if fields.len() < 7 {
                return None;
            }
            let number = |i: usize| fields[i].trim().trim_end_matches('%').parse::<f64>().ok();
            Some(IntradayPoint {
                time: fields[1].trim().to_string(),
                price: number(2)?,
                change: number(3).unwrap_or(0.0),
                change_pct: number(4).unwrap_or(0.0),
                volume: number(5).unwrap_or(0.0),
                amount: number(6).unwrap_or(0.0),
            })
        })
        .collect())
}

/// Turnover trend: `Result.trend[0..4]` (total, Shanghai, Shenzhen,
/// Beijing), each `content[] {marketDate, data.amount}`. Keeps days present
/// in all four series, newest first.
pub fn parse_turnover(payload: &Value) -> Result<Vec<TurnoverDay>> {
    ensure_result_code(payload)?;
    let trend = payload
        .pointer("/Result/trend")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::missing("Result.trend"))?;
    if trend.len() < 4 {
        return Err(MarketError::Parse(format!(
            "expected 4 turnover series, got {}",
            trend.len()
        )));
    }

    let series: Vec<HashMap<String, String>> = trend[..4]
        .iter()
        .map(|market| {
            market
                .get("content")
                .and_then(Value::as_array)
                .map(|content| {
                    content
                        .iter()
                        .filter_map(|day| {
                            Some((
                                day.get("marketDate").and_then(value_string)?,
                                day.pointer("/data/amount").and_then(value_string)?,
                            ))
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut dates: Vec<&String> = series[0].keys().collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));

    Ok(dates
        .into_iter()
        .filter_map(|date| {
            Some(TurnoverDay {
                date: date.clone(),
                total: series[0].get(date)?.clone(),
                shanghai: series[1].get(date)?.clone(),
                shenzhen: series[2].get(date)?.clone(),
                beijing: series[3].get(date)?.clone(),
            })
        })
        .take(TURNOVER_DAYS)
        .collect())
}

/// Fund estimate JSONP: `jsonpgz({...});`
pub fn parse_fund_estimate(code: &str, text: &str) -> Result<FundEstimate> {
    let start = text.find('(');
    let end = text.rfind(')');
    let json = match (start, end) {
        (Some(start), Some(end)) if end > start => text[start + 1..end].trim(),
        _ => return Err(MarketError::Parse("not a JSONP payload".to_string())),
    };
    if json.is_empty() {
        return Err(MarketError::Api(format!("no estimate available for fund {code}")));
    }

    let payload: Value = serde_json::from_str(json)?;
    let text_field = |key: &str| payload.get(key).and_then(value_string).unwrap_or_default();

    Ok(FundEstimate {
        code: payload
            .get("fundcode")
            .and_then(value_string)
            .unwrap_or_else(|| code.to_string()),
        name: text_field("name"),
        nav_date: text_field("jzrq"),
        nav: payload.get("dwjz").and_then(value_f64),
        estimate: payload.get("gsz").and_then(value_f64),
        estimate_change_pct: payload.get("gszzl").and_then(value_f64),
        estimated_at: text_field("gztime"),
    })
}

/// Reduce an HTML document to its title and readable text
pub fn html_to_text(html: &str) -> (Option<String>, String) {
    let title = TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|t| !t.is_empty());

    let body = SCRIPT_RE.replace_all(html, " ");
    let body = TITLE_RE.replace_all(&body, " ");
    let body = BLOCK_RE.replace_all(&body, "\n");
    let body = TAG_RE.replace_all(&body, " ");
    let body = decode_entities(&body);

    let text = body
        .lines()
        .map(|line| SPACE_RE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    (title, text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
