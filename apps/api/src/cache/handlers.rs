//! Axum route handlers for inspecting and invalidating the response cache.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheStats;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    pub prefix: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// GET /api/v1/cache/stats
pub async fn handle_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// DELETE /api/v1/cache?prefix=... or ?key=...
pub async fn handle_clear(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<ClearResponse>, AppError> {
    let removed = match (params.prefix, params.key) {
        (Some(prefix), None) if !prefix.is_empty() => state.cache.clear_by_prefix(&prefix),
        (None, Some(key)) => usize::from(state.cache.clear(&key)),
        _ => {
            return Err(AppError::Validation(
                "Pass exactly one of a non-empty 'prefix' or 'key'".to_string(),
            ))
        }
    };
    info!("Cache cleared: {removed} entries removed");
    Ok(Json(ClearResponse { removed }))
}
