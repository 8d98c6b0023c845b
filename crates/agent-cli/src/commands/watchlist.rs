//! `lanfund watchlist`

use super::AppContext;
use crate::cli::{FundCodes, WatchlistCommand};
use agent_market::{FundWatchlist, MarketDataSource, WatchedFund, validate_fund_code};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use tracing::warn;

pub async fn run(ctx: &AppContext, command: &WatchlistCommand) -> Result<()> {
    let mut out = std::io::stdout();
    if let WatchlistCommand::List { sector } = command {
        return print_list(&ctx.watchlist, sector.as_deref(), &mut out);
    }

    let names = match command {
        WatchlistCommand::Add(funds) => lookup_names(ctx.source.as_ref(), funds).await,
        _ => HashMap::new(),
    };

    let mut watchlist = (*ctx.watchlist).clone();
    let changed = edit(&mut watchlist, command, &names, &mut out)?;
    if changed > 0 {
        let path = &ctx.config.fund_map_path;
        watchlist
            .save(path)
            .with_context(|| format!("failed to save watchlist {}", path.display()))?;
    }
    Ok(())
}

/// Fund names from the estimate endpoint. A failed lookup only costs the name.
async fn lookup_names(source: &dyn MarketDataSource, funds: &FundCodes) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for code in each_code(funds) {
        if validate_fund_code(code).is_err() {
            continue;
        }
        match source.fund_estimate(code).await {
            Ok(estimate) if !estimate.name.is_empty() => {
                names.insert(code.to_string(), estimate.name);
            }
            Ok(_) => {}
            Err(e) => warn!(code = %code, error = %e, "Fund name lookup failed"),
        }
    }
    names
}

fn each_code(funds: &FundCodes) -> impl Iterator<Item = &str> {
    funds.codes.iter().map(|code| code.trim()).filter(|code| !code.is_empty())
}

/// Apply one edit code by code and report each outcome. Returns how many
/// funds changed; a failing code is reported and skipped.
fn edit(
    watchlist: &mut FundWatchlist,
    command: &WatchlistCommand,
    names: &HashMap<String, String>,
    out: &mut impl Write,
) -> Result<usize> {
    let mut changed = 0;
    let mut report = |code: &str, outcome: agent_market::Result<Option<String>>| -> Result<()> {
        match outcome {
            Ok(Some(message)) => {
                changed += 1;
                writeln!(out, "{code}: {message}")?;
            }
            Ok(None) => writeln!(out, "{code}: unchanged")?,
            Err(e) => writeln!(out, "{code}: skipped, {e}")?,
        }
        Ok(())
    };

    match command {
        WatchlistCommand::List { .. } => {}
        WatchlistCommand::Add(funds) => {
            for code in each_code(funds) {
                let name = names.get(code).cloned();
                let label = name.clone().unwrap_or_else(|| "(unnamed)".to_string());
                let fund = WatchedFund {
                    fund_name: name,
                    ..WatchedFund::default()
                };
                let outcome = watchlist
                    .add(code, fund)
                    .map(|added| added.then(|| format!("added {label}")));
                report(code, outcome)?;
            }
        }
        WatchlistCommand::Remove(funds) => {
            for code in each_code(funds) {
                let outcome = watchlist.remove(code).map(|_| Some("removed".to_string()));
                report(code, outcome)?;
            }
        }
        WatchlistCommand::Hold(funds) | WatchlistCommand::Unhold(funds) => {
            let hold = matches!(command, WatchlistCommand::Hold(_));
            for code in each_code(funds) {
                let message = if hold { "held" } else { "not held" };
                let outcome = watchlist
                    .set_hold(code, hold)
                    .map(|()| Some(message.to_string()));
                report(code, outcome)?;
            }
        }
        WatchlistCommand::MarkSector { funds, sectors } => {
            for code in each_code(funds) {
                let outcome = watchlist
                    .set_sectors(code, sectors.clone())
                    .map(|()| Some(format!("sectors {}", sectors.join(", "))));
                report(code, outcome)?;
            }
        }
        WatchlistCommand::UnmarkSector(funds) => {
            for code in each_code(funds) {
                let outcome = watchlist
                    .set_sectors(code, Vec::new())
                    .map(|()| Some("sectors cleared".to_string()));
                report(code, outcome)?;
            }
        }
        WatchlistCommand::Shares { code, shares } => {
            let code = code.trim();
            let outcome = watchlist
                .set_shares(code, *shares)
                .map(|()| Some(format!("{shares:.2} shares")));
            report(code, outcome)?;
        }
    }

    Ok(changed)
}

fn print_list(watchlist: &FundWatchlist, sector: Option<&str>, out: &mut impl Write) -> Result<()> {
    let funds: Vec<_> = match sector {
        Some(sector) => watchlist.in_sector(sector).collect(),
        None => watchlist.iter().collect(),
    };

    if funds.is_empty() {
        match sector {
            Some(sector) => writeln!(out, "No funds tagged {sector}")?,
            None => writeln!(out, "No funds on the watchlist")?,
        }
        return Ok(());
    }

    for (code, fund) in funds {
        write!(out, "{code}  {}", fund.fund_name.as_deref().unwrap_or("-"))?;
        if fund.is_hold {
            write!(out, "  held")?;
        }
        if fund.shares > 0.0 {
            write!(out, "  {:.2} shares", fund.shares)?;
        }
        if !fund.sectors.is_empty() {
            write!(out, "  [{}]", fund.sectors.join(", "))?;
        }
        writeln!(out)?;
    }
    Ok(())
}
