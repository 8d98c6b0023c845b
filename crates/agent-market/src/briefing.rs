//! Standard four-part market briefing
//!
//! Unlike deep research, the briefing is a fixed pipeline: summarize a
//! [`MarketSnapshot`], ask the backend four focused questions in turn, and
//! stitch the answers into one markdown report.

use crate::dashboard::{MarketSnapshot, Section};
use crate::error::{MarketError, Result};
use crate::portfolio::PositionSummary;
use crate::report::ReportPublisher;
use crate::watchlist::FundRow;
use agent_core::{Report, ReportSource};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use minijinja::{Environment, context};
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Closing line of every briefing
pub const DISCLAIMER: &str = "💡 **Note**: this analysis was generated by AI for reference only \
and is not investment advice. Markets carry risk; invest with care.";

/// The four briefing questions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefingTopic {
    MarketTrend,
    SectorOpportunities,
    PortfolioAdvice,
    RiskWarning,
}

impl BriefingTopic {
    pub const ALL: [BriefingTopic; 4] = [
        BriefingTopic::MarketTrend,
        BriefingTopic::SectorOpportunities,
        BriefingTopic::PortfolioAdvice,
        BriefingTopic::RiskWarning,
    ];

    /// Report heading
    pub fn title(self) -> &'static str {
        match self {
            BriefingTopic::MarketTrend => "1️⃣ Market Trend",
            BriefingTopic::SectorOpportunities => "2️⃣ Sector Opportunities",
            BriefingTopic::PortfolioAdvice => "3️⃣ Portfolio Advice",
            BriefingTopic::RiskWarning => "4️⃣ Risks and Responses",
        }
    }

    fn system(self) -> &'static str {
        match self {
            BriefingTopic::MarketTrend => {
                "You are a senior financial analyst skilled at macro market analysis and trend calls. \
                 Analyze the market in depth from a professional perspective."
            }
            BriefingTopic::SectorOpportunities => {
                "You are an industry research expert who knows the investment logic and cycles of every sector."
            }
            BriefingTopic::PortfolioAdvice => {
                "You are a professional fund advisor skilled at portfolio allocation and risk management."
            }
            BriefingTopic::RiskWarning => {
                "You are a risk management expert skilled at identifying market risks and designing controls."
            }
        }
    }

    fn template(self) -> &'static str {
        match self {
            BriefingTopic::MarketTrend => TREND_PROMPT,
            BriefingTopic::SectorOpportunities => SECTOR_PROMPT,
            BriefingTopic::PortfolioAdvice => PORTFOLIO_PROMPT,
            BriefingTopic::RiskWarning => RISK_PROMPT,
        }
    }
}

const FORMAT_HINT: &str = "Use markdown (## and ### headings, **bold**, lists and tables) \
and write a structured, readable professional report.";

const TREND_PROMPT: &str = "Analyze the market trend in depth from the complete data below.

[News flash]
{{ news }}

[Market indices]
{{ market }}

[Gold]
{{ gold }}

{{ metals }}

[Turnover]
{{ turnover }}

[Shanghai intraday]
{{ intraday }}

[Leading sectors]
{{ top_sectors }}

Cover, in 300-400 words:
1. Current hot spots and important events from the news flash
2. Characteristics of and relations between the major indices
3. Which phase the market is in (rising, ranging or correcting)
4. Sentiment and capital flow, using turnover and intraday data
5. Domestic versus overseas performance and the key drivers
6. What the gold trend means for the market

{{ format_hint }}";

const SECTOR_PROMPT: &str = "Analyze sector opportunities from the sector data and market backdrop below.

[Leading sectors]
{{ top_sectors }}

[Lagging sectors]
{{ bottom_sectors }}

[Turnover]
{{ turnover }}

[Shanghai intraday]
{{ intraday }}

Cover, in 300-400 words:
1. What the leading sectors share and what drives them
2. Whether the moves can last, given turnover and capital flows
3. Sector strength judged by main-force inflows
4. Which sectors deserve attention, with allocation suggestions
5. Whether the weak sectors show reversal potential

{{ format_hint }}";

const PORTFOLIO_PROMPT: &str = "Give investment advice for the fund holdings below in the full market context.

[Funds]
{{ funds }}

[Market indices]
{{ market }}

[Turnover]
{{ turnover }}

[Sectors]
{{ top_sectors }}

Cover, in 300-400 words:
1. Performance and risk profile of the held funds
2. How well the holdings fit the market, given turnover and sector rotation
3. Concrete actions per fund: add, trim or hold
4. Why the best performers did well and whether it can last
5. How to improve position sizing and risk exposure

Give concrete, actionable advice. {{ format_hint }}";

const RISK_PROMPT: &str = "Run a complete risk analysis on the current market data below.

[Market indices]
{{ market }}

[Gold]
{{ gold }}

[Turnover]
{{ turnover }}

[Shanghai intraday]
{{ intraday }}

[Sectors]
{{ top_sectors }}
{{ bottom_sectors }}

[Funds]
{{ funds }}

Cover, in 250-350 words:
1. The main market risks, including shrinking or surging turnover and the intraday path
2. Triggers that could start a correction
3. Risk exposure of the held funds
4. Risk controls and responses
5. Technical and capital-flow warning signs to watch

Be objective and cautious. {{ format_hint }}";

const REPORT_TEMPLATE: &str = "# AI Market Analysis Report

**Generated**: {{ generated_at }}

---

## 📊 Data Overview

### News Flash

{{ data.news }}

### Market Indices

{{ data.market }}

### Gold

{{ data.gold }}

{{ data.metals }}

### Turnover

{{ data.turnover }}

### Shanghai Composite Intraday (last 5 minutes)

{{ data.intraday }}

### Leading Sectors (Top 5)

{{ data.top_sectors }}

### Lagging Sectors (Bottom 5)

{{ data.bottom_sectors }}

### Funds

{{ data.funds }}
{% for section in sections %}
---

## {{ section.title }}

{{ section.body }}
{% endfor %}
---

{{ disclaimer }}
";

/// Plain-text summaries of a snapshot, shared by every prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct BriefingData {
    pub news: String,
    pub market: String,
    pub gold: String,
    pub metals: String,
    pub turnover: String,
    pub intraday: String,
    pub top_sectors: String,
    pub bottom_sectors: String,
    pub funds: String,
}

impl BriefingData {
    /// Summarize a snapshot the way the prompts expect
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        Self {
            news: summarize("Latest news flashes", &snapshot.news, |items| {
                numbered(items.iter().take(10))
            }),
            market: summarize("Major indices", &snapshot.indices, |items| {
                bulleted(items.iter().take(10))
            }),
            gold: summarize("Recent gold prices (5 days)", &snapshot.gold, |items| {
                bulleted(items.iter().take(5))
            }),
            metals: summarize("Real-time precious metals", &snapshot.metals, |items| {
                bulleted(items.iter())
            }),
            turnover: summarize("Turnover (3 days)", &snapshot.turnover, |items| {
                bulleted(items.iter().take(3))
            }),
            intraday: summarize("Shanghai Composite (5 minutes)", &snapshot.intraday, |items| {
                bulleted(items[items.len().saturating_sub(5)..].iter())
            }),
            top_sectors: summarize("Top 5 sectors", &snapshot.sectors, |items| {
                numbered(items.iter().take(5))
            }),
            bottom_sectors: summarize("Bottom 5 sectors", &snapshot.sectors, |items| {
                numbered(items[items.len().saturating_sub(5)..].iter())
            }),
            funds: summarize_funds(&snapshot.funds, snapshot.positions()),
        }
    }
}

fn summarize<T>(
    title: &str,
    section: &Section<T>,
    render: impl FnOnce(&[T]) -> String,
) -> String {
    match section {
        Ok(items) if items.is_empty() => format!("{title}: no data"),
        Ok(items) => format!("{title}:\n{}", render(items)),
        Err(reason) => format!("{title}: unavailable ({reason})"),
    }
}

fn bulleted<'a, T: Display + 'a>(items: impl Iterator<Item = &'a T>) -> String {
    items.map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
}

fn numbered<'a, T: Display + 'a>(items: impl Iterator<Item = &'a T>) -> String {
    items
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn estimate_pct(row: &FundRow) -> Option<f64> {
    row.estimate.as_ref().ok().and_then(|e| e.estimate_change_pct)
}

fn summarize_funds(rows: &[FundRow], positions: Option<PositionSummary>) -> String {
    let mut out = format!("Watched funds: {}", rows.len());
    let describe = |row: &FundRow| {
        let pct = estimate_pct(row).map_or_else(|| "N/A".to_string(), |p| format!("{p:+.2}%"));
        format!("{}: estimate {pct}", row.name())
    };

    let held: Vec<&FundRow> = rows.iter().filter(|row| row.fund.is_hold).collect();
    if !held.is_empty() {
        out.push_str("\n\nHeld funds:\n");
        out.push_str(&numbered(held.iter().map(|row| describe(row)).collect::<Vec<_>>().iter()));
    }

    let mut ranked: Vec<&FundRow> = rows.iter().collect();
    ranked.sort_by(|a, b| {
        let a = estimate_pct(a).unwrap_or(f64::NEG_INFINITY);
        let b = estimate_pct(b).unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    if !ranked.is_empty() {
        out.push_str("\n\nTop 5 by today's estimate:\n");
        let lines: Vec<String> = ranked
            .iter()
            .take(5)
            .map(|row| {
                let mark = if row.fund.is_hold { "[held] " } else { "" };
                format!("{mark}{}", describe(row))
            })
            .collect();
        out.push_str(&numbered(lines.iter()));
    }

    if let Some(positions) = positions {
        out.push_str(&format!("\n\n{positions}"));
    }
    out
}

/// One answered briefing question
#[derive(Debug, Clone, Serialize)]
pub struct BriefingSection {
    pub title: String,
    pub body: String,
}

/// A finished briefing
#[derive(Debug, Clone)]
pub struct BriefingOutcome {
    pub report: Report,
    pub sections: Vec<BriefingSection>,
    pub saved_to: Option<PathBuf>,
}

/// Runs the four briefing prompts against a reasoning backend
pub struct StandardBriefing {
    provider: Arc<dyn LLMProvider>,
    publisher: Arc<dyn ReportPublisher>,
    model: String,
    max_tokens: usize,
    temperature: Option<f32>,
    env: Environment<'static>,
}

impl StandardBriefing {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        publisher: Arc<dyn ReportPublisher>,
        model: impl Into<String>,
    ) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self {
            provider,
            publisher,
            model: model.into(),
            max_tokens: 2000,
            temperature: Some(0.7),
            env,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn render(&self, template: &str, ctx: minijinja::Value) -> Result<String> {
        self.env
            .render_str(template, ctx)
            .map_err(|err| MarketError::Parse(format!("template rendering failed: {err}")))
    }

    async fn ask(&self, topic: BriefingTopic, data: &BriefingData) -> Result<String> {
        let prompt = self.render(
            topic.template(),
            context! { format_hint => FORMAT_HINT, ..minijinja::Value::from_serialize(data) },
        )?;
        let request = CompletionRequest::builder(&self.model)
            .system(topic.system())
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .maybe_temperature(self.temperature)
            .build();

        info!(topic = topic.title(), "Requesting briefing section");
        let response = self.provider.complete(request).await?;
        Ok(response.message.text().trim().to_string())
    }

    /// Ask all four questions and assemble the markdown report
    pub async fn compose(&self, snapshot: &MarketSnapshot) -> Result<(Report, Vec<BriefingSection>)> {
        let data = BriefingData::from_snapshot(snapshot);

        let mut sections = Vec::with_capacity(BriefingTopic::ALL.len());
        for topic in BriefingTopic::ALL {
            sections.push(BriefingSection {
                title: topic.title().to_string(),
                body: self.ask(topic, &data).await?,
            });
        }

        let body = self.render(
            REPORT_TEMPLATE,
            context! {
                generated_at => snapshot.taken_at.format("%Y-%m-%d %H:%M").to_string(),
                data => &data,
                sections => &sections,
                disclaimer => DISCLAIMER,
            },
        )?;
        Ok((
            Report::with_timestamp(body, ReportSource::Completed, snapshot.taken_at),
            sections,
        ))
    }

    /// Compose and publish a briefing for `snapshot`
    pub async fn run(&self, snapshot: &MarketSnapshot) -> Result<BriefingOutcome> {
        let (report, sections) = self.compose(snapshot).await?;
        let saved_to = self.publisher.publish(&report).await?;
        Ok(BriefingOutcome {
            report,
            sections,
            saved_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FundEstimate, IndexQuote, SectorFlow};
    use crate::report::{BRIEFING_PREFIX, FileReportPublisher};
    use crate::testing::MockBackend;
    use crate::watchlist::WatchedFund;
    use agent_llm::{CompletionResponse, LLMError};
    use chrono::{Local, TimeZone};

    fn sector(name: &str, change_pct: f64) -> SectorFlow {
        SectorFlow {
            name: name.to_string(),
            change_pct,
            main_net_inflow: 0.0,
            main_inflow_ratio: 0.0,
            small_net_inflow: 0.0,
            small_inflow_ratio: 0.0,
        }
    }

    fn fund(code: &str, held: bool, pct: Option<f64>) -> FundRow {
        FundRow {
            code: code.to_string(),
            fund: WatchedFund {
                fund_name: Some(format!("Fund {code}")),
                is_hold: held,
                ..WatchedFund::default()
            },
            estimate: pct
                .map(|p| FundEstimate {
                    code: code.to_string(),
                    name: String::new(),
                    nav_date: "2024-03-01".to_string(),
                    nav: Some(1.0),
                    estimate: Some(1.0),
                    estimate_change_pct: Some(p),
                    estimated_at: "2024-03-04 14:30".to_string(),
                })
                .ok_or_else(|| "HTTP 404".to_string()),
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            taken_at: Local.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
            indices: Ok(vec![IndexQuote {
                name: "上证指数".to_string(),
                price: "3050.12".to_string(),
                change_pct: "+0.52%".to_string(),
            }]),
            news: Ok(Vec::new()),
            sectors: Ok((0..8).map(|i| sector(&format!("S{i}"), 8.0 - f64::from(i))).collect()),
            gold: Err("API error: HTTP 500".to_string()),
            metals: Ok(Vec::new()),
            turnover: Ok(Vec::new()),
            intraday: Ok(Vec::new()),
            funds: vec![
                fund("000001", false, Some(0.3)),
                fund("110022", true, Some(1.5)),
                fund("161725", false, None),
            ],
        }
    }

    #[test]
    fn test_briefing_data_summaries() {
        let data = BriefingData::from_snapshot(&snapshot());

        assert_eq!(data.market, "Major indices:\n- 上证指数: 3050.12 (+0.52%)");
        assert_eq!(data.news, "Latest news flashes: no data");
        assert_eq!(data.gold, "Recent gold prices (5 days): unavailable (API error: HTTP 500)");
        assert!(data.top_sectors.starts_with("Top 5 sectors:\n1. S0"));
        assert!(data.top_sectors.contains("5. S4"));
        assert!(data.bottom_sectors.starts_with("Bottom 5 sectors:\n1. S3"));
        assert!(data.funds.starts_with("Watched funds: 3\n\nHeld funds:\n1. Fund 110022: estimate +1.50%"));
        assert!(data.funds.contains("Top 5 by today's estimate:\n1. [held] Fund 110022"));
        assert!(data.funds.contains("3. Fund 161725: estimate N/A"));
        assert!(!data.funds.contains("Position value"));

        let mut with_shares = snapshot();
        with_shares.funds[1].fund.shares = 2000.0;
        let data = BriefingData::from_snapshot(&with_shares);
        assert!(data.funds.ends_with(
            "Position value 2000.00, estimated today +30.00 (+1.50%)\n- 110022 Fund 110022: 2000.00 shares, value 2000.00, estimate +30.00 (+1.50%)"
        ));
    }

    #[tokio::test]
    async fn test_run_asks_four_questions_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        for (system_hint, answer) in [
            ("senior financial analyst", "Trend body"),
            ("industry research expert", "Sector body"),
            ("fund advisor", "Portfolio body"),
            ("risk management expert", "Risk body"),
        ] {
            backend
                .expect_complete()
                .times(1)
                .in_sequence(&mut seq)
                .withf(move |request| {
                    request.system.as_deref().is_some_and(|s| s.contains(system_hint))
                        && request.messages[0].text().contains("1. S0")
                })
                .returning(move |_| Ok(CompletionResponse::text(answer)));
        }
        backend.expect_name().return_const("mock".to_string());

        let briefing = StandardBriefing::new(
            Arc::new(backend),
            Arc::new(FileReportPublisher::new(dir.path()).with_prefix(BRIEFING_PREFIX)),
            "test-model",
        );
        let outcome = briefing.run(&snapshot()).await.unwrap();

        let body = &outcome.report.body;
        assert!(body.starts_with("# AI Market Analysis Report\n\n**Generated**: 2024-03-04 15:00"));
        let trend = body.find("## 1️⃣ Market Trend\n\nTrend body").unwrap();
        let risk = body.find("## 4️⃣ Risks and Responses\n\nRisk body").unwrap();
        assert!(trend < risk);
        assert!(body.trim_end().ends_with(DISCLAIMER));
        assert_eq!(outcome.sections.len(), 4);

        let saved = outcome.saved_to.unwrap();
        assert_eq!(
            saved.file_name().unwrap().to_str().unwrap(),
            "ai_analysis_20240304_150000.md"
        );
    }

    #[tokio::test]
    async fn test_backend_failure_stops_briefing() {
        let mut backend = MockBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Err(LLMError::RateLimitExceeded("slow down".to_string())));
        backend.expect_name().return_const("mock".to_string());

        let briefing = StandardBriefing::new(
            Arc::new(backend),
            Arc::new(crate::report::DiscardPublisher),
            "test-model",
        );
        let err = briefing.run(&snapshot()).await.unwrap_err();
        assert!(matches!(err, MarketError::Reasoning(_)));
    }
}
