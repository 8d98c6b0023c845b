//! `lanfund snapshot`

use super::AppContext;
use agent_market::MarketSnapshot;
use anyhow::Result;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let snapshot = MarketSnapshot::collect(
        ctx.source.as_ref(),
        &ctx.watchlist,
        ctx.config.fund_concurrency,
    )
    .await;
    print!("{}", snapshot.render());
    Ok(())
}
