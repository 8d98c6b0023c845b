//! lanfund: market terminal with AI briefings and budgeted deep research

mod cli;
mod commands;

use agent_market::MarketConfig;
use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use commands::AppContext;
use std::time::Duration;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_loaded = agent_utils::load_dotenv();
    agent_utils::init_tracing_with_default("warn,agent_market=info,agent_runtime=info");
    debug!(dotenv_loaded, "Starting lanfund");

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let ctx = AppContext::load(config)?;

    match &cli.command {
        Command::Snapshot => commands::snapshot::run(&ctx).await,
        Command::Analyze(args) => commands::analyze::run(&ctx, args).await,
        Command::Serve(args) => commands::serve::run(&ctx, args).await,
        Command::Watchlist(command) => commands::watchlist::run(&ctx, command).await,
    }
}

/// Command-line values first, then the environment, then defaults
fn build_config(cli: &Cli) -> Result<MarketConfig> {
    let mut builder = MarketConfig::builder();

    if let Some(path) = &cli.fund_map {
        builder = builder.fund_map_path(path);
    }
    if let Command::Analyze(args) = &cli.command {
        if let Some(dir) = &args.output {
            builder = builder.report_dir(dir);
        }
        if let Some(iterations) = args.max_iterations {
            builder = builder.max_iterations(iterations);
        }
        if let Some(seconds) = args.max_seconds {
            builder = builder.max_duration(Duration::from_secs(seconds));
        }
    }

    Ok(builder.with_env()?.build()?)
}
