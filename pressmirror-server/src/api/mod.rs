//! API Routes
//!
//! Admin endpoints: status, manual cycle triggers and read-only article views.

mod articles;
mod cycles;


use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;

use pressmirror_core::store::BucketCounts;
use pressmirror_types::Mode;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        // Manual triggers
        .route("/reconcile/run", post(cycles::run_reconcile))
        .route("/ab-test/run", post(cycles::run_ab_test))
        // Articles
        .route("/articles/:canonical", get(articles::get_article))
        .route("/published", get(articles::list_published))
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub mode: Mode,
    pub uptime_secs: u64,
    /// Timestamp the next reconcile window is computed from
    pub last_check: Option<i64>,
    pub access_tokens: usize,
    pub known_items: usize,
    pub buckets: BucketCounts,
    pub reconcile_running: bool,
    pub ab_test_running: bool,
}

pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let services = state.services();
    let internal = |e: pressmirror_core::store::StoreError| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());

    let checkpoint = services.repo.checkpoint().await.map_err(internal)?;
    let known_items = services.repo.known_count().await.map_err(internal)?;
    let buckets = services.repo.bucket_counts().await.map_err(internal)?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: services.mode,
        uptime_secs: state.uptime_secs(),
        last_check: checkpoint.map(|c| c.last_check),
        access_tokens: services.tokens.len(),
        known_items,
        buckets,
        reconcile_running: state.reconcile_runner().is_running(),
        ab_test_running: state.ab_test_runner().is_running(),
    }))
}
