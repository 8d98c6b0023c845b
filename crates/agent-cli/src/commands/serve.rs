//! `lanfund serve`: deep research over server-sent events

use super::AppContext;
use crate::cli::ServeArgs;
use agent_market::{DEFAULT_TASK, DeepResearch};
use anyhow::Result;
use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    task: Option<String>,
}

/// Routes of the research server
pub fn router(research: Arc<DeepResearch>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/research/stream", get(research_stream_handler))
        .with_state(research)
}

pub async fn run(ctx: &AppContext, args: &ServeArgs) -> Result<()> {
    let research = DeepResearch::from_config(
        &ctx.config,
        Arc::clone(&ctx.source),
        Arc::clone(&ctx.watchlist),
    )?;

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "Research server listening");
    axum::serve(listener, router(Arc::new(research))).await?;
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /api/research/stream?task=...`
///
/// One `data: <JSON>` frame per relay event. Closing the connection does not
/// stop the run; its report is still saved.
async fn research_stream_handler(
    State(research): State<Arc<DeepResearch>>,
    Query(params): Query<StreamParams>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let task = params
        .task
        .filter(|task| !task.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TASK.to_string());
    info!(task_len = task.len(), "Research stream requested");

    let (events, _run) = research.stream(task).into_parts();
    let stream =
        ReceiverStream::new(events).map(|event| Ok(SseEvent::default().data(event.to_json())));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
