//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Directory used by `-o` when no path is given
pub const DEFAULT_REPORT_DIR: &str = "reports";

#[derive(Parser, Debug)]
#[command(name = "lanfund")]
#[command(about = "Market terminal with AI briefings and budgeted deep research", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Fund watchlist file (overrides FUND_MAP_PATH)
    #[arg(long, global = true, value_name = "FILE")]
    pub fund_map: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the market dashboard
    Snapshot,

    /// Run the standard briefing or a deep research report
    Analyze(AnalyzeArgs),

    /// Serve deep research over HTTP with server-sent events
    Serve(ServeArgs),

    /// List or edit the fund watchlist
    #[command(subcommand)]
    Watchlist(WatchlistCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum WatchlistCommand {
    /// Show watched funds
    List {
        /// Only funds tagged with this sector
        #[arg(long)]
        sector: Option<String>,
    },

    /// Start watching funds, named from their estimate
    Add(FundCodes),

    /// Stop watching funds
    Remove(FundCodes),

    /// Mark funds as held
    Hold(FundCodes),

    /// Mark funds as not held
    Unhold(FundCodes),

    /// Tag funds with sectors
    MarkSector {
        #[command(flatten)]
        funds: FundCodes,

        /// Sector names, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        sectors: Vec<String>,
    },

    /// Remove every sector tag from funds
    UnmarkSector(FundCodes),

    /// Record the shares held in a fund
    Shares {
        code: String,
        shares: f64,
    },
}

#[derive(Args, Debug, PartialEq)]
pub struct FundCodes {
    /// Six-digit fund codes, comma separated
    #[arg(value_delimiter = ',', required = true, num_args = 1..)]
    pub codes: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct AnalyzeArgs {
    /// Let the agent investigate with tools instead of the fixed briefing
    #[arg(long)]
    pub deep: bool,

    /// Save the report to DIR (default: reports)
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        num_args = 0..=1,
        default_missing_value = DEFAULT_REPORT_DIR
    )]
    pub output: Option<PathBuf>,

    /// Research question for --deep
    #[arg(long, requires = "deep")]
    pub task: Option<String>,

    /// Iteration budget for --deep
    #[arg(long, requires = "deep")]
    pub max_iterations: Option<usize>,

    /// Wall-clock budget in seconds for --deep
    #[arg(long, requires = "deep")]
    pub max_seconds: Option<u64>,

    /// Print relay events as SSE frames instead of the rendered report
    #[arg(long, requires = "deep")]
    pub stream: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8311")]
    pub addr: SocketAddr,
}
