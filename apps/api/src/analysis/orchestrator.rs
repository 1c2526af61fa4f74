//! Analysis Orchestrator — runs the summary and intersection calls concurrently.
//!
//! Skipped stages are never attempted. A requested stage that fails fails the
//! whole analysis with an error naming that stage; its sibling is allowed to
//! finish and its result is dropped.

use tracing::{debug, info};

use crate::analysis::models::{
    intersection_schema, summary_schema, AnalysisOptions, IntersectionReply, JobIntersection,
    PositionAnalysis, SummaryReply,
};
use crate::analysis::prompts::{
    INTERSECTION_PROMPT_TEMPLATE, INTERSECTION_SYSTEM, SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM,
};
use crate::cv::normalize::to_model;
use crate::cv::CvDocument;
use crate::errors::AppError;
use crate::llm_client::prompts::{render, STRUCTURED_SYSTEM};
use crate::llm_client::{complete_as, CompletionRequest, Message, StructuredCompletion};

pub const SUMMARY_STAGE: &str = "Position summary";
pub const INTERSECTION_STAGE: &str = "Job intersection";

pub async fn analyze_position(
    llm: &dyn StructuredCompletion,
    job_text: &str,
    cv: &CvDocument,
    options: AnalysisOptions,
) -> Result<PositionAnalysis, AppError> {
    if options.skips_everything() {
        debug!("Both analysis stages skipped; nothing to do");
        return Ok(PositionAnalysis::default());
    }

    let summary = async {
        if options.skip_summary {
            None
        } else {
            Some(generate_summary(llm, job_text).await)
        }
    };
    let intersection = async {
        if options.skip_intersection {
            None
        } else {
            Some(score_intersection(llm, job_text, cv).await)
        }
    };

    let (summary, intersection) = tokio::join!(summary, intersection);

    let mut result = PositionAnalysis::default();
    if let Some(summary) = summary {
        let summary = summary?;
        result.position_summary = Some(summary.position_summary);
        result.company_name = Some(summary.company_name).filter(|c| !c.trim().is_empty());
    }
    if let Some(intersection) = intersection {
        result.job_intersection = Some(intersection?);
    }

    info!(
        "Position analysis done: summary={}, rating={:?}",
        result.position_summary.is_some(),
        result.job_intersection.as_ref().map(|i| i.rating)
    );
    Ok(result)
}

async fn generate_summary(
    llm: &dyn StructuredCompletion,
    job_text: &str,
) -> Result<SummaryReply, AppError> {
    let schema = summary_schema();
    let system = format!("{SUMMARY_SYSTEM} {STRUCTURED_SYSTEM}");
    let prompt = render(SUMMARY_PROMPT_TEMPLATE, &[("job_text", job_text)]);

    let reply: SummaryReply = complete_as(
        llm,
        CompletionRequest {
            system: &system,
            messages: vec![Message::user(prompt)],
            schema: &schema,
        },
    )
    .await
    .map_err(|e| AppError::upstream(SUMMARY_STAGE, e))?;

    if reply.position_summary.trim().is_empty() {
        return Err(AppError::Upstream {
            stage: SUMMARY_STAGE.to_string(),
            message: "model returned an empty summary".to_string(),
        });
    }
    Ok(reply)
}

async fn score_intersection(
    llm: &dyn StructuredCompletion,
    job_text: &str,
    cv: &CvDocument,
) -> Result<JobIntersection, AppError> {
    let schema = intersection_schema();
    let system = format!("{INTERSECTION_SYSTEM} {STRUCTURED_SYSTEM}");
    let cv_json = serde_json::to_string_pretty(&to_model(cv))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize CV: {e}")))?;
    let prompt = render(
        INTERSECTION_PROMPT_TEMPLATE,
        &[("job_text", job_text), ("cv_json", cv_json.as_str())],
    );

    let reply: IntersectionReply = complete_as(
        llm,
        CompletionRequest {
            system: &system,
            messages: vec![Message::user(prompt)],
            schema: &schema,
        },
    )
    .await
    .map_err(|e| AppError::upstream(INTERSECTION_STAGE, e))?;

    if !(1..=10).contains(&reply.rating) {
        return Err(AppError::Upstream {
            stage: INTERSECTION_STAGE.to_string(),
            message: format!("rating {} is outside 1-10", reply.rating),
        });
    }
    Ok(reply.into())
}
