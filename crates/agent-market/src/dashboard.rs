//! Terminal dashboard
//!
//! A [`MarketSnapshot`] holds every data set fetched at one moment. A failed
//! section keeps its error text so the rest of the snapshot stays usable.

use crate::api::MarketDataSource;
use crate::models::{
    GoldDay, IndexQuote, IntradayPoint, MetalQuote, NewsItem, SectorFlow, TurnoverDay, format_yi,
};
use crate::portfolio::PositionSummary;
use crate::watchlist::{FundRow, FundWatchlist};
use chrono::{DateTime, Local};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::fmt::Write as _;
use tracing::{info, warn};

/// News flashes kept in a snapshot
pub const SNAPSHOT_NEWS: usize = 10;

/// A data set, or why it could not be fetched
pub type Section<T> = std::result::Result<Vec<T>, String>;

/// Every dashboard data set, fetched concurrently
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub taken_at: DateTime<Local>,
    pub indices: Section<IndexQuote>,
    pub news: Section<NewsItem>,
    pub sectors: Section<SectorFlow>,
    pub gold: Section<GoldDay>,
    pub metals: Section<MetalQuote>,
    pub turnover: Section<TurnoverDay>,
    pub intraday: Section<IntradayPoint>,
    pub funds: Vec<FundRow>,
}

fn section<T>(name: &str, result: crate::error::Result<Vec<T>>) -> Section<T> {
    result.map_err(|err| {
        warn!(section = name, error = %err, "Snapshot section unavailable");
        err.to_string()
    })
}

impl MarketSnapshot {
    /// Fetch every data set; failures become section errors
    pub async fn collect(
        source: &dyn MarketDataSource,
        watchlist: &FundWatchlist,
        fund_concurrency: usize,
    ) -> Self {
        let (indices, news, sectors, gold, metals, turnover, intraday, funds) = tokio::join!(
            source.market_indices(),
            source.news_flash(SNAPSHOT_NEWS),
            source.sector_flows(),
            source.gold_history(),
            source.precious_metals(),
            source.turnover_trend(),
            source.shanghai_intraday(),
            watchlist.fetch_estimates(source, fund_concurrency),
        );

        let snapshot = Self {
            taken_at: Local::now(),
            indices: section("indices", indices),
            news: section("news", news),
            sectors: section("sectors", sectors),
            gold: section("gold", gold),
            metals: section("metals", metals),
            turnover: section("turnover", turnover),
            intraday: section("intraday", intraday),
            funds,
        };
        info!(failed_sections = snapshot.failed_sections(), "Market snapshot collected");
        snapshot
    }

    /// Number of sections that could not be fetched
    pub fn failed_sections(&self) -> usize {
        [
            self.indices.is_err(),
            self.news.is_err(),
            self.sectors.is_err(),
            self.gold.is_err(),
            self.metals.is_err(),
            self.turnover.is_err(),
            self.intraday.is_err(),
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count()
    }

    /// Render every section as a titled table
    pub fn render(&self) -> String {
        let mut out = format!("Market snapshot {}\n", self.taken_at.format("%Y-%m-%d %H:%M:%S"));

        push_section(&mut out, "Market indices", &self.indices, |items| {
            table(
                &["Index", "Price", "Change"],
                items.iter().map(|q| {
                    vec![
                        Cell::new(&q.name),
                        Cell::new(&q.price),
                        colored(&q.change_pct, sign_of_str(&q.change_pct)),
                    ]
                }),
            )
        });

        push_section(&mut out, "7x24 news", &self.news, |items| {
            table(
                &["Time", "Tag", "Title"],
                items.iter().map(|n| {
                    vec![
                        Cell::new(n.published_at.format("%H:%M:%S")),
                        Cell::new(n.sentiment.as_deref().unwrap_or("")),
                        Cell::new(&n.title),
                    ]
                }),
            )
        });

        push_section(&mut out, "Sectors", &self.sectors, |items| {
            table(
                &["Sector", "Change", "Main net inflow", "Main ratio", "Small net inflow"],
                items.iter().map(|s| {
                    vec![
                        Cell::new(&s.name),
                        colored(&format!("{:+.2}%", s.change_pct), s.change_pct),
                        colored(&format_yi(s.main_net_inflow), s.main_net_inflow),
                        Cell::new(format!("{:.2}%", s.main_inflow_ratio)),
                        colored(&format_yi(s.small_net_inflow), s.small_net_inflow),
                    ]
                }),
            )
        });

        push_section(&mut out, "Domestic gold (CNY/g)", &self.gold, |items| {
            table(
                &["Date", "China Gold", "Chow Tai Fook", "China Gold chg", "Chow Tai Fook chg"],
                items.iter().map(|g| {
                    vec![
                        Cell::new(g.date),
                        Cell::new(opt(g.china_gold)),
                        Cell::new(opt(g.chow_tai_fook)),
                        colored(&opt(g.china_gold_change), g.china_gold_change.unwrap_or(0.0)),
                        colored(
                            &opt(g.chow_tai_fook_change),
                            g.chow_tai_fook_change.unwrap_or(0.0),
                        ),
                    ]
                }),
            )
        });

        push_section(&mut out, "Precious metals", &self.metals, |items| {
            table(
                &["Metal", "Last", "Change %", "High", "Low", "Unit"],
                items.iter().map(|m| {
                    vec![
                        Cell::new(&m.name),
                        Cell::new(opt(m.last)),
                        colored(&opt(m.change_pct), m.change_pct.unwrap_or(0.0)),
                        Cell::new(opt(m.high)),
                        Cell::new(opt(m.low)),
                        Cell::new(&m.unit),
                    ]
                }),
            )
        });

        push_section(&mut out, "Turnover (亿)", &self.turnover, |items| {
            table(
                &["Date", "Total", "Shanghai", "Shenzhen", "Beijing"],
                items.iter().map(|t| {
                    vec![
                        Cell::new(&t.date),
                        Cell::new(&t.total),
                        Cell::new(&t.shanghai),
                        Cell::new(&t.shenzhen),
                        Cell::new(&t.beijing),
                    ]
                }),
            )
        });

        push_section(&mut out, "Shanghai Composite, last 30 minutes", &self.intraday, |items| {
            let skip = items.len().saturating_sub(30);
            table(
                &["Time", "Price", "Change", "Volume (万手)", "Amount"],
                items[skip..].iter().map(|p| {
                    vec![
                        Cell::new(&p.time),
                        Cell::new(format!("{:.2}", p.price)),
                        colored(&format!("{:+.2}%", p.change_pct), p.change_pct),
                        Cell::new(format!("{:.2}", p.volume / 10_000.0)),
                        Cell::new(format_yi(p.amount)),
                    ]
                }),
            )
        });

        if !self.funds.is_empty() {
            let funds = table(
                &["Code", "Name", "Held", "Estimate", "NAV"],
                self.funds.iter().map(|row| {
                    let (estimate, nav) = match &row.estimate {
                        Ok(e) => (
                            colored(
                                &e.estimate_change_pct
                                    .map_or_else(|| "N/A".to_string(), |p| format!("{p:+.2}%")),
                                e.estimate_change_pct.unwrap_or(0.0),
                            ),
                            Cell::new(opt(e.nav)),
                        ),
                        Err(reason) => (Cell::new(reason), Cell::new("")),
                    };
                    vec![
                        Cell::new(&row.code),
                        Cell::new(row.name()),
                        Cell::new(if row.fund.is_hold { "yes" } else { "" }),
                        estimate,
                        nav,
                    ]
                }),
            );
            let _ = write!(out, "\nFund watchlist\n{funds}\n");
        }

        if let Some(summary) = self.positions() {
            let positions = table(
                &["Code", "Name", "Shares", "Value", "Estimated", "Actual"],
                summary.positions.iter().map(|p| {
                    vec![
                        Cell::new(&p.code),
                        Cell::new(&p.name),
                        Cell::new(format!("{:.2}", p.shares)),
                        Cell::new(format!("{:.2}", p.value)),
                        colored(
                            &format!("{:+.2} ({:+.2}%)", p.estimated_gain, p.estimated_gain_pct),
                            p.estimated_gain,
                        ),
                        match (p.actual_gain, p.actual_gain_pct) {
                            (Some(gain), Some(pct)) => {
                                colored(&format!("{gain:+.2} ({pct:+.2}%)"), gain)
                            }
                            _ => Cell::new("pending"),
                        },
                    ]
                }),
            );
            let _ = write!(
                out,
                "\nPositions\n{positions}\nTotal {:.2}, estimated {:+.2} ({:+.2}%), settled {:+.2} ({:+.2}%)\n",
                summary.total_value,
                summary.estimated_gain,
                summary.estimated_gain_pct,
                summary.actual_gain,
                summary.actual_gain_pct
            );
        }

        out
    }

    /// Position summary of the watched funds with shares
    pub fn positions(&self) -> Option<PositionSummary> {
        PositionSummary::from_rows(&self.funds, self.taken_at.date_naive())
    }
}

fn push_section<T>(
    out: &mut String,
    title: &str,
    section: &Section<T>,
    render: impl FnOnce(&[T]) -> Table,
) {
    match section {
        Ok(items) if items.is_empty() => {
            let _ = write!(out, "\n{title}\n(no data)\n");
        }
        Ok(items) => {
            let _ = write!(out, "\n{title}\n{}\n", render(items));
        }
        Err(reason) => {
            let _ = write!(out, "\n{title}\nunavailable: {reason}\n");
        }
    }
}

fn table(header: &[&str], rows: impl Iterator<Item = Vec<Cell>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    table
}

/// Red for up and green for down, as quoted on mainland exchanges
fn colored(text: &str, sign: f64) -> Cell {
    let cell = Cell::new(text);
    if sign > 0.0 {
        cell.fg(Color::Red)
    } else if sign < 0.0 {
        cell.fg(Color::Green)
    } else {
        cell
    }
}

fn sign_of_str(change: &str) -> f64 {
    change
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .unwrap_or(0.0)
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketDataSource;
    use crate::error::MarketError;

    fn source() -> MockMarketDataSource {
        let mut source = MockMarketDataSource::new();
        source.expect_market_indices().returning(|| {
            Ok(vec![IndexQuote {
                name: "上证指数".to_string(),
                price: "3050.12".to_string(),
                change_pct: "+0.52%".to_string(),
            }])
        });
        source
            .expect_news_flash()
            .withf(|count| *count == SNAPSHOT_NEWS)
            .returning(|_| Ok(Vec::new()));
        source
            .expect_sector_flows()
            .returning(|| Err(MarketError::Api("HTTP 503".to_string())));
        source.expect_gold_history().returning(|| Ok(Vec::new()));
        source.expect_precious_metals().returning(|| Ok(Vec::new()));
        source.expect_turnover_trend().returning(|| Ok(Vec::new()));
        source.expect_shanghai_intraday().returning(|| Ok(Vec::new()));
        source
    }

    #[tokio::test]
    async fn test_failed_section_does_not_abort_snapshot() {
        let snapshot = MarketSnapshot::collect(&source(), &FundWatchlist::new(), 2).await;

        assert_eq!(snapshot.failed_sections(), 1);
        assert_eq!(snapshot.indices.as_ref().unwrap().len(), 1);
        assert_eq!(snapshot.sectors.as_ref().unwrap_err(), "API error: HTTP 503");
        assert!(snapshot.funds.is_empty());
    }

    #[tokio::test]
    async fn test_render_includes_tables_and_notes() {
        let snapshot = MarketSnapshot::collect(&source(), &FundWatchlist::new(), 2).await;
        let rendered = snapshot.render();

        assert!(rendered.contains("上证指数"));
        assert!(rendered.contains("3050.12"));
        assert!(rendered.contains("Sectors\nunavailable: API error: HTTP 503"));
        assert!(rendered.contains("7x24 news\n(no data)"));
        assert!(!rendered.contains("Fund watchlist"));
    }

    #[test]
    fn test_sign_of_str() {
        assert!(sign_of_str("+0.52%") > 0.0);
        assert!(sign_of_str("-1.10%") < 0.0);
        assert_eq!(sign_of_str("--"), 0.0);
    }

    #[tokio::test]
    async fn test_render_positions_for_funds_with_shares() {
        let watchlist = FundWatchlist::from_json(
            r#"{"110022": {"fund_name": "易方达消费行业", "is_hold": true, "shares": 1000},
                "161725": {"fund_name": "招商中证白酒"}}"#,
        )
        .unwrap();
        let mut source = source();
        source.expect_fund_estimate().returning(|code| {
            Ok(crate::models::FundEstimate {
                code: code.to_string(),
                name: String::new(),
                nav_date: "2024-03-01".to_string(),
                nav: Some(2.0),
                estimate: Some(2.02),
                estimate_change_pct: Some(1.0),
                estimated_at: "2024-03-04 14:30".to_string(),
            })
        });

        let snapshot = MarketSnapshot::collect(&source, &watchlist, 2).await;
        let summary = snapshot.positions().unwrap();
        assert_eq!(summary.positions.len(), 1);
        assert_eq!(summary.positions[0].code, "110022");

        let rendered = snapshot.render();
        assert!(rendered.contains("\nPositions\n"));
        assert!(rendered.contains("2000.00"));
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("Total 2000.00, estimated +20.00 (+1.00%), settled +0.00 (+0.00%)"));
    }
}
