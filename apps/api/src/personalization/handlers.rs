//! Axum route handlers for the Personalization API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::handlers::{CvInput, JobInput};
use crate::analysis::PositionAnalysis;
use crate::errors::AppError;
use crate::personalization::models::{
    CoverLetter, FullRequest, PersonalizeOutcome, PersonalizeRequest, PersonalizedCv, Story,
    StoryRanking,
};
use crate::personalization::progress::{ProgressSnapshot, ProgressTracker, Stage};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PersonalizeBody {
    #[serde(flatten)]
    pub job: JobInput,
    #[serde(flatten)]
    pub cv: CvInput,
    pub analysis: Option<PositionAnalysis>,
}

#[derive(Debug, Deserialize)]
pub struct FullBody {
    #[serde(flatten)]
    pub job: JobInput,
    #[serde(flatten)]
    pub cv: CvInput,
    #[serde(default)]
    pub stories: Vec<Story>,
}

#[derive(Debug, Serialize)]
pub struct StageError {
    pub stage: Stage,
    pub code: &'static str,
    pub message: String,
}

/// Successful parts of a full run. A branch that failed is `null` and listed in `errors`.
#[derive(Debug, Serialize)]
pub struct FullResponse {
    pub run_id: Uuid,
    pub analysis: PositionAnalysis,
    pub analysis_from_cache: bool,
    pub ranking: StoryRanking,
    pub ranking_from_cache: bool,
    pub personalized: Option<PersonalizedCv>,
    pub cover_letter: Option<CoverLetter>,
    pub errors: Vec<StageError>,
    pub progress: ProgressSnapshot,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/personalize
///
/// Fetches whatever analysis the caller did not supply, then rewrites the CV.
pub async fn handle_personalize(
    State(state): State<AppState>,
    Json(body): Json<PersonalizeBody>,
) -> Result<Json<PersonalizeOutcome>, AppError> {
    let request = PersonalizeRequest {
        job_text: body.job.resolve(state.source.as_ref()).await?,
        cv: body.cv.resolve(state.source.as_ref()).await?,
        analysis: body.analysis,
    };
    let progress = ProgressTracker::basic();
    let outcome = state.pipeline.personalize(request, &progress).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/personalize/full
///
/// Analysis, story ranking, then CV rewrite and cover letter in parallel.
/// Fails only if analysis or ranking fails, or if both final branches fail.
pub async fn handle_personalize_full(
    State(state): State<AppState>,
    Json(body): Json<FullBody>,
) -> Result<Json<FullResponse>, AppError> {
    let request = FullRequest {
        job_text: body.job.resolve(state.source.as_ref()).await?,
        cv: body.cv.resolve(state.source.as_ref()).await?,
        stories: body.stories,
    };
    let progress = ProgressTracker::full();
    let outcome = state.pipeline.personalize_full(request, &progress).await?;

    let (personalized, cover_letter) = match (outcome.personalized, outcome.cover_letter) {
        (Err(cv_err), Err(_)) => return Err(cv_err),
        (personalized, cover_letter) => (personalized, cover_letter),
    };

    let mut errors = Vec::new();
    let personalized = keep_ok(personalized, Stage::PersonalizingCv, &mut errors);
    let cover_letter = keep_ok(cover_letter, Stage::GeneratingLetter, &mut errors);

    Ok(Json(FullResponse {
        run_id: outcome.run_id,
        analysis: outcome.analysis,
        analysis_from_cache: outcome.analysis_from_cache,
        ranking: outcome.ranking,
        ranking_from_cache: outcome.ranking_from_cache,
        personalized,
        cover_letter,
        errors,
        progress: progress.snapshot(),
    }))
}

fn keep_ok<T>(result: Result<T, AppError>, stage: Stage, errors: &mut Vec<StageError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(StageError {
                stage,
                code: err.code(),
                message: err.to_string(),
            });
            None
        }
    }
}
