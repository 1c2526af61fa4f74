//! Axum route handlers for the Analysis API, plus the request-input
//! resolution shared with the personalization handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::analysis::validation::{validate_cv, validate_job_text};
use crate::analysis::{AnalysisOptions, PositionAnalysis};
use crate::cv::source::DocumentSource;
use crate::cv::{ensure_ids, CvDocument};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Input resolution
// ────────────────────────────────────────────────────────────────────────────

/// Job posting given inline or by application id. Inline text wins.
#[derive(Debug, Default, Deserialize)]
pub struct JobInput {
    pub job_text: Option<String>,
    pub application_id: Option<String>,
}

impl JobInput {
    pub async fn resolve(self, source: &dyn DocumentSource) -> Result<String, AppError> {
        match (self.job_text, self.application_id) {
            (Some(text), _) => Ok(text),
            (None, Some(id)) => Ok(source.load_job_posting_text(&id).await?),
            (None, None) => Err(AppError::Validation(
                "Either job_text or application_id is required".to_string(),
            )),
        }
    }
}

/// CV given inline or by locale. Inline document wins. The result carries ids.
#[derive(Debug, Default, Deserialize)]
pub struct CvInput {
    pub cv: Option<CvDocument>,
    pub locale: Option<String>,
}

impl CvInput {
    pub async fn resolve(self, source: &dyn DocumentSource) -> Result<CvDocument, AppError> {
        match (self.cv, self.locale) {
            (Some(cv), _) => Ok(ensure_ids(&cv)),
            (None, Some(locale)) => Ok(source.load_cv(&locale).await?),
            (None, None) => Err(AppError::Validation(
                "Either cv or locale is required".to_string(),
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    #[serde(flatten)]
    pub job: JobInput,
    #[serde(flatten)]
    pub cv: CvInput,
    #[serde(flatten)]
    pub options: AnalysisOptions,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: PositionAnalysis,
    pub from_cache: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analysis
///
/// Summarizes the posting and scores it against the CV. Either stage can be
/// skipped with `skip_summary` / `skip_intersection`.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let job_text = request.job.resolve(state.source.as_ref()).await?;
    let cv = request.cv.resolve(state.source.as_ref()).await?;
    validate_job_text(&job_text)?;
    validate_cv(&cv)?;

    let result = state
        .pipeline
        .position_analysis(&job_text, &cv, request.options)
        .await?;

    Ok(Json(AnalysisResponse {
        analysis: result.data,
        from_cache: result.from_cache,
    }))
}
