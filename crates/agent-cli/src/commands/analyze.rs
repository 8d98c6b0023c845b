//! `lanfund analyze`

use super::AppContext;
use crate::cli::AnalyzeArgs;
use agent_core::{RunResult, RunStatus, Step};
use agent_llm::providers::OpenAIProvider;
use agent_market::briefing::BriefingSection;
use agent_market::report::BRIEFING_PREFIX;
use agent_market::{
    DEFAULT_TASK, DeepResearch, DiscardPublisher, FileReportPublisher, MarketSnapshot,
    ReportPublisher, StandardBriefing, render_for_console,
};
use agent_runtime::LoopObserver;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const RULE_WIDTH: usize = 80;

pub async fn run(ctx: &AppContext, args: &AnalyzeArgs) -> Result<()> {
    if !ctx.config.has_llm() {
        bail!("LLM_API_KEY is not set; AI analysis needs a reasoning backend");
    }

    if args.deep {
        deep(ctx, args).await
    } else {
        briefing(ctx).await
    }
}

async fn briefing(ctx: &AppContext) -> Result<()> {
    let llm_config = ctx
        .config
        .llm_config()
        .context("reasoning backend is not configured")?;
    let provider = OpenAIProvider::with_config(llm_config)?;
    let publisher: Arc<dyn ReportPublisher> = match &ctx.config.report_dir {
        Some(dir) => Arc::new(FileReportPublisher::new(dir).with_prefix(BRIEFING_PREFIX)),
        None => Arc::new(DiscardPublisher),
    };

    info!("Collecting market data for the briefing");
    let snapshot = MarketSnapshot::collect(
        ctx.source.as_ref(),
        &ctx.watchlist,
        ctx.config.fund_concurrency,
    )
    .await;

    let outcome = StandardBriefing::new(Arc::new(provider), publisher, &ctx.config.llm_model)
        .run(&snapshot)
        .await?;

    println!(
        "{} 📊 AI Market Analysis Report",
        snapshot.taken_at.format("%Y-%m-%d %H:%M")
    );
    for BriefingSection { title, body } in &outcome.sections {
        println!("{}", "=".repeat(RULE_WIDTH));
        println!("{title}");
        println!("{}", "-".repeat(RULE_WIDTH));
        for line in render_for_console(body) {
            println!("{line}");
        }
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    for line in render_for_console(agent_market::briefing::DISCLAIMER) {
        println!("{line}");
    }
    print_saved(outcome.saved_to.as_deref());
    Ok(())
}

async fn deep(ctx: &AppContext, args: &AnalyzeArgs) -> Result<()> {
    let research = DeepResearch::from_config(
        &ctx.config,
        Arc::clone(&ctx.source),
        Arc::clone(&ctx.watchlist),
    )?;
    let task = args.task.as_deref().unwrap_or(DEFAULT_TASK);

    if args.stream {
        stream_frames(&research, task, &mut std::io::stdout()).await?;
        return Ok(());
    }

    let outcome = research.run_with_observer(task, &ConsoleProgress).await?;
    if outcome.report.is_reconstructed() {
        eprintln!("Research budget ran out; the report below was assembled from collected data.");
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    for line in render_for_console(&outcome.report.body) {
        println!("{line}");
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    print_saved(outcome.saved_to.as_deref());
    Ok(())
}

/// Write every relay frame to `out`, then wait for the run so its report is
/// saved before returning.
async fn stream_frames(
    research: &DeepResearch,
    task: &str,
    out: &mut impl Write,
) -> Result<RunResult> {
    let (mut events, run) = research.stream(task).into_parts();
    while let Some(event) = events.recv().await {
        write!(out, "{}", event.to_sse())?;
        out.flush()?;
    }

    let result = run.await.context("research task did not finish")?;
    if result.status == RunStatus::Failed {
        bail!(
            "deep research failed: {}",
            result.failure.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(result)
}

fn print_saved(path: Option<&Path>) {
    if let Some(path) = path {
        println!("✅ Report saved to {}", path.display());
    }
}

/// Progress lines on stderr while a deep research run is going
struct ConsoleProgress;

#[async_trait]
impl LoopObserver for ConsoleProgress {
    async fn on_status(&self, message: &str) {
        eprintln!("… {message}");
    }

    async fn on_tool_call(&self, tools: &[String]) {
        eprintln!("→ calling {}", tools.join(", "));
    }

    async fn on_step(&self, step: &Step) {
        let preview: String = step.observation().chars().take(80).collect();
        eprintln!("  {}: {}", step.action, preview.replace('\n', " "));
    }
}
