//! Read-only article views

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use pressmirror_core::store::PublishedEntry;
use pressmirror_types::{BucketAssignment, Item};

use crate::state::AppState;

const DEFAULT_PUBLISHED_LIMIT: usize = 20;
const MAX_PUBLISHED_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
pub struct ArticleView {
    pub item: Item,
    pub bucket: Option<BucketAssignment>,
}

#[derive(Debug, Deserialize)]
pub struct PublishedQuery {
    pub limit: Option<usize>,
}

/// `canonical` arrives url-encoded and is decoded by the extractor.
pub async fn get_article(
    State(state): State<AppState>,
    Path(canonical): Path<String>,
) -> Result<Json<ArticleView>, (StatusCode, String)> {
    let repo = &state.services().repo;
    let item = repo
        .item(&canonical)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No article tracked for {}", canonical)))?;
    let bucket =
        repo.bucket(&canonical).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ArticleView { item, bucket }))
}

pub async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<PublishedQuery>,
) -> Result<Json<Vec<PublishedEntry>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_PUBLISHED_LIMIT).clamp(1, MAX_PUBLISHED_LIMIT);
    let entries = state
        .services()
        .repo
        .recently_published(limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(entries))
}
