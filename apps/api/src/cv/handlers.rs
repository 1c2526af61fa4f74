//! Axum route handlers for CV documents.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::cv::{diff_documents, ensure_ids, CvDocument, DiffResult};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DiffRequest {
    pub original: CvDocument,
    pub current: CvDocument,
}

/// GET /api/v1/cv/:locale
pub async fn handle_get_cv(
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<CvDocument>, AppError> {
    let cv = state.source.load_cv(&locale).await?;
    Ok(Json(cv))
}

/// POST /api/v1/cv/diff
///
/// Both documents get ids first, so untagged input diffs by position-derived ids.
pub async fn handle_diff(Json(request): Json<DiffRequest>) -> Json<DiffResult> {
    let original = ensure_ids(&request.original);
    let current = ensure_ids(&request.current);
    Json(diff_documents(&original, &current))
}
