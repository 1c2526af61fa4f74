//! Personalization Pipeline — sequences the model-backed stages of a run.
//!
//! Basic flow:  fetching-analysis (only what is missing) → personalizing-cv.
//! Full flow:   analyzing → ranking → personalizing-cv ∥ generating-letter.
//!
//! Position analysis, CV rewrites and story rankings are cached independently
//! under their own key namespace. Cover letters are never cached.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::validation::{validate_cv, validate_job_text};
use crate::analysis::{analyze_position, AnalysisOptions, PositionAnalysis};
use crate::cache::{
    generate_key, Cached, ResponseCache, PERSONALIZE_CV_PREFIX, POSITION_ANALYSIS_PREFIX,
    STORY_RANKING_PREFIX,
};
use crate::cv::normalize::{from_model, to_model, ModelCv};
use crate::cv::{diff_documents, ensure_ids, CvDocument};
use crate::errors::AppError;
use crate::llm_client::prompts::{render, STRUCTURED_SYSTEM};
use crate::llm_client::{complete_as, CompletionRequest, Message, StructuredCompletion};
use crate::personalization::models::{
    cover_letter_schema, personalized_cv_schema, story_ranking_schema, CoverLetter, FullOutcome,
    FullRequest, PersonalizeOutcome, PersonalizeRequest, PersonalizedCv, RankingReply, Story,
    StoryRanking,
};
use crate::personalization::progress::{ProgressTracker, Stage};
use crate::personalization::prompts::{
    personalize_prompt, LETTER_PROMPT_TEMPLATE, LETTER_SYSTEM, PERSONALIZE_SYSTEM,
    RANKING_PROMPT_TEMPLATE, RANKING_SYSTEM,
};

pub const PERSONALIZE_STAGE: &str = "CV personalization";
pub const RANKING_STAGE: &str = "Story ranking";
pub const LETTER_STAGE: &str = "Cover letter";

/// Stories handed to the cover letter writer.
const LETTER_STORY_COUNT: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    /// Position analyses and story rankings.
    pub analysis: Duration,
    pub personalization: Duration,
}

#[derive(Clone)]
pub struct PersonalizationPipeline {
    llm: Arc<dyn StructuredCompletion>,
    cache: ResponseCache,
    ttls: CacheTtls,
}

impl PersonalizationPipeline {
    pub fn new(llm: Arc<dyn StructuredCompletion>, cache: ResponseCache, ttls: CacheTtls) -> Self {
        Self { llm, cache, ttls }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Cached stages
    // ────────────────────────────────────────────────────────────────────────

    /// `analyze_position` behind the `position-analysis:` namespace.
    pub async fn position_analysis(
        &self,
        job_text: &str,
        cv: &CvDocument,
        options: AnalysisOptions,
    ) -> Result<Cached<PositionAnalysis>, AppError> {
        if options.skips_everything() {
            return Ok(Cached {
                data: PositionAnalysis::default(),
                from_cache: false,
            });
        }

        let key = generate_key(
            POSITION_ANALYSIS_PREFIX,
            &json!({
                "jobText": job_text,
                "cv": cv,
                "skipSummary": options.skip_summary,
                "skipIntersection": options.skip_intersection,
            }),
        );
        self.cache
            .get_or_compute(&key, self.ttls.analysis, || {
                analyze_position(self.llm.as_ref(), job_text, cv, options)
            })
            .await
    }

    /// Rewrites the CV for the job. The returned CV is id-tagged and diffed
    /// against `cv`, which must already carry ids.
    pub async fn rewrite_cv(
        &self,
        job_text: &str,
        cv: &CvDocument,
        position_summary: &str,
    ) -> Result<PersonalizedCv, AppError> {
        let key = generate_key(
            PERSONALIZE_CV_PREFIX,
            &json!({
                "jobText": job_text,
                "cv": cv,
                "positionSummary": position_summary,
            }),
        );
        let cached = self
            .cache
            .get_or_compute(&key, self.ttls.personalization, || {
                self.call_personalize(job_text, cv, position_summary)
            })
            .await?;

        let personalized = ensure_ids(&cached.data);
        let diff = diff_documents(cv, &personalized);
        info!(
            "CV personalized: {} modified, {} new, {} removed sections (from_cache={})",
            diff.modified_sections.len(),
            diff.new_sections.len(),
            diff.removed_sections.len(),
            cached.from_cache
        );
        Ok(PersonalizedCv {
            cv: personalized,
            from_cache: cached.from_cache,
            diff,
        })
    }

    /// Ranks `stories` by relevance to the job, behind `story-ranking:`.
    pub async fn rank_stories(
        &self,
        job_text: &str,
        position_summary: &str,
        stories: &[Story],
    ) -> Result<Cached<StoryRanking>, AppError> {
        let key = generate_key(
            STORY_RANKING_PREFIX,
            &json!({
                "jobText": job_text,
                "positionSummary": position_summary,
                "stories": stories,
            }),
        );
        self.cache
            .get_or_compute(&key, self.ttls.analysis, || {
                self.call_ranking(job_text, position_summary, stories)
            })
            .await
    }

    pub async fn write_cover_letter(
        &self,
        job_text: &str,
        analysis: &PositionAnalysis,
        stories: &[&Story],
        cv: &CvDocument,
    ) -> Result<CoverLetter, AppError> {
        let schema = cover_letter_schema();
        let system = format!("{LETTER_SYSTEM} {STRUCTURED_SYSTEM}");
        let stories_json = to_json(stories)?;
        let cv_json = to_json(&to_model(cv))?;
        let prompt = render(
            LETTER_PROMPT_TEMPLATE,
            &[
                (
                    "company_name",
                    analysis.company_name.as_deref().unwrap_or("(unknown)"),
                ),
                (
                    "position_summary",
                    analysis.position_summary.as_deref().unwrap_or(""),
                ),
                ("job_text", job_text),
                ("stories_json", stories_json.as_str()),
                ("cv_json", cv_json.as_str()),
            ],
        );

        let letter: CoverLetter = complete_as(
            self.llm.as_ref(),
            CompletionRequest {
                system: &system,
                messages: vec![Message::user(prompt)],
                schema: &schema,
            },
        )
        .await
        .map_err(|e| AppError::upstream(LETTER_STAGE, e))?;

        if letter.body.trim().is_empty() {
            return Err(AppError::Upstream {
                stage: LETTER_STAGE.to_string(),
                message: "model returned an empty letter".to_string(),
            });
        }
        Ok(letter)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Flows
    // ────────────────────────────────────────────────────────────────────────

    /// Basic flow. Analysis parts the caller already supplied are not fetched;
    /// if nothing is missing the fetch stage is skipped outright.
    pub async fn personalize(
        &self,
        request: PersonalizeRequest,
        progress: &ProgressTracker,
    ) -> Result<PersonalizeOutcome, AppError> {
        validate_job_text(&request.job_text)?;
        validate_cv(&request.cv)?;

        let run_id = Uuid::new_v4();
        let cv = ensure_ids(&request.cv);
        let supplied = request.analysis.unwrap_or_default();
        let missing = AnalysisOptions {
            skip_summary: supplied.position_summary.is_some(),
            skip_intersection: supplied.job_intersection.is_some(),
        };
        info!(%run_id, ?missing, "Starting personalization");
        let _progress_log = progress.spawn_logger(run_id);

        let (analysis, analysis_from_cache) = if missing.skips_everything() {
            progress.skip(Stage::FetchingAnalysis);
            (supplied, None)
        } else {
            progress.start(Stage::FetchingAnalysis);
            let fetched = self
                .position_analysis(&request.job_text, &cv, missing)
                .await?;
            progress.complete(Stage::FetchingAnalysis);
            (supplied.merge(fetched.data), Some(fetched.from_cache))
        };

        progress.start(Stage::PersonalizingCv);
        let personalized = self
            .rewrite_cv(
                &request.job_text,
                &cv,
                analysis.position_summary.as_deref().unwrap_or(""),
            )
            .await?;
        progress.complete(Stage::PersonalizingCv);

        info!(%run_id, "Personalization done");
        Ok(PersonalizeOutcome {
            run_id,
            analysis,
            analysis_from_cache,
            personalized,
            progress: progress.snapshot(),
        })
    }

    /// Full flow. Analysis and ranking failures abort the run; the two final
    /// branches run concurrently and each keeps its own result.
    pub async fn personalize_full(
        &self,
        request: FullRequest,
        progress: &ProgressTracker,
    ) -> Result<FullOutcome, AppError> {
        validate_job_text(&request.job_text)?;
        validate_cv(&request.cv)?;
        if request.stories.is_empty() {
            return Err(AppError::Validation(
                "At least one story is required".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let job_text = request.job_text.as_str();
        let cv = ensure_ids(&request.cv);
        info!(%run_id, stories = request.stories.len(), "Starting full personalization");
        let _progress_log = progress.spawn_logger(run_id);

        progress.start(Stage::Analyzing);
        let analysis = self
            .position_analysis(job_text, &cv, AnalysisOptions::everything())
            .await?;
        progress.complete(Stage::Analyzing);
        let summary = analysis.data.position_summary.clone().unwrap_or_default();

        progress.start(Stage::Ranking);
        let ranking = self
            .rank_stories(job_text, &summary, &request.stories)
            .await?;
        progress.complete(Stage::Ranking);
        let top = ranking.data.top(&request.stories, LETTER_STORY_COUNT);

        progress.start(Stage::PersonalizingCv);
        progress.start(Stage::GeneratingLetter);
        let cv_branch = async {
            let result = self.rewrite_cv(job_text, &cv, &summary).await;
            if result.is_ok() {
                progress.complete(Stage::PersonalizingCv);
            }
            result
        };
        let letter_branch = async {
            let result = self
                .write_cover_letter(job_text, &analysis.data, &top, &cv)
                .await;
            if result.is_ok() {
                progress.complete(Stage::GeneratingLetter);
            }
            result
        };
        let (personalized, cover_letter) = tokio::join!(cv_branch, letter_branch);

        for (stage, err) in [
            (PERSONALIZE_STAGE, personalized.as_ref().err()),
            (LETTER_STAGE, cover_letter.as_ref().err()),
        ] {
            if let Some(err) = err {
                warn!(%run_id, "{stage} branch failed: {err}");
            }
        }
        info!(%run_id, "Full personalization finished");

        Ok(FullOutcome {
            run_id,
            analysis: analysis.data,
            analysis_from_cache: analysis.from_cache,
            ranking: ranking.data,
            ranking_from_cache: ranking.from_cache,
            personalized,
            cover_letter,
        })
    }

    // ────────────────────────────────────────────────────────────────────────
    // Model calls
    // ────────────────────────────────────────────────────────────────────────

    async fn call_personalize(
        &self,
        job_text: &str,
        cv: &CvDocument,
        position_summary: &str,
    ) -> Result<CvDocument, AppError> {
        let schema = personalized_cv_schema();
        let system = format!("{PERSONALIZE_SYSTEM} {STRUCTURED_SYSTEM}");
        let prompt = personalize_prompt(position_summary, job_text, &to_json(&to_model(cv))?);

        let model: ModelCv = complete_as(
            self.llm.as_ref(),
            CompletionRequest {
                system: &system,
                messages: vec![Message::user(prompt)],
                schema: &schema,
            },
        )
        .await
        .map_err(|e| AppError::upstream(PERSONALIZE_STAGE, e))?;

        let rewritten = from_model(model);
        if rewritten.is_empty() {
            return Err(AppError::Upstream {
                stage: PERSONALIZE_STAGE.to_string(),
                message: "model returned a CV with no sections".to_string(),
            });
        }
        Ok(rewritten)
    }

    async fn call_ranking(
        &self,
        job_text: &str,
        position_summary: &str,
        stories: &[Story],
    ) -> Result<StoryRanking, AppError> {
        let schema = story_ranking_schema();
        let system = format!("{RANKING_SYSTEM} {STRUCTURED_SYSTEM}");
        let stories_json = to_json(stories)?;
        let prompt = render(
            RANKING_PROMPT_TEMPLATE,
            &[
                ("position_summary", position_summary),
                ("job_text", job_text),
                ("stories_json", stories_json.as_str()),
            ],
        );

        let reply: RankingReply = complete_as(
            self.llm.as_ref(),
            CompletionRequest {
                system: &system,
                messages: vec![Message::user(prompt)],
                schema: &schema,
            },
        )
        .await
        .map_err(|e| AppError::upstream(RANKING_STAGE, e))?;

        let mut ranked = reply.ranked;
        for story in &mut ranked {
            story.relevance = story.relevance.clamp(1, 10);
        }
        Ok(StoryRanking { ranked })
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize prompt input: {e}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::analysis::models::{INTERSECTION_SCHEMA, SUMMARY_SCHEMA};
    use crate::cache::backend::memory::MemoryBackend;
    use crate::cache::clock::ManualClock;
    use crate::fixtures::{sample_cv, sample_stories, scripted_llm, JOB_TEXT};
    use crate::llm_client::testing::{Reply, ScriptedLlm};
    use crate::personalization::models::{
        COVER_LETTER_SCHEMA, PERSONALIZED_CV_SCHEMA, STORY_RANKING_SCHEMA,
    };
    use crate::personalization::progress::{PipelineState, StageStatus};

    const HOUR: Duration = Duration::from_secs(3600);

    async fn build(llm: ScriptedLlm) -> (PersonalizationPipeline, Arc<ScriptedLlm>, ResponseCache) {
        let llm = Arc::new(llm);
        let cache = ResponseCache::init(
            Arc::new(MemoryBackend::default()),
            Arc::new(ManualClock::at(1_700_000_000_000)),
            Duration::from_millis(1000),
        )
        .await;
        let ttls = CacheTtls {
            analysis: HOUR,
            personalization: HOUR,
        };
        (
            PersonalizationPipeline::new(llm.clone(), cache.clone(), ttls),
            llm,
            cache,
        )
    }

    fn basic_request() -> PersonalizeRequest {
        PersonalizeRequest {
            job_text: JOB_TEXT.to_string(),
            cv: sample_cv(),
            analysis: None,
        }
    }

    fn full_request() -> FullRequest {
        FullRequest {
            job_text: JOB_TEXT.to_string(),
            cv: sample_cv(),
            stories: sample_stories(),
        }
    }

    #[tokio::test]
    async fn test_basic_run_analyzes_then_personalizes() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        let progress = ProgressTracker::basic();

        let outcome = pipeline.personalize(basic_request(), &progress).await.unwrap();

        assert!(outcome.analysis.position_summary.is_some());
        let rating = outcome.analysis.job_intersection.as_ref().unwrap().rating;
        assert!((1..=10).contains(&rating));
        assert_eq!(outcome.analysis_from_cache, Some(false));
        assert!(!outcome.personalized.from_cache);

        let diff = &outcome.personalized.diff;
        assert!(diff.removed_sections.is_empty());
        assert!(diff.removed_sub_sections.is_empty());
        assert_eq!(diff.modified_sections, vec!["main-work-experience".to_string()]);

        let bullets = &outcome.personalized.cv.main[0].bullet_points;
        assert_eq!(
            bullets[0].id.as_deref(),
            Some("main-work-experience-bullet-0")
        );
        assert_eq!(
            bullets[1].id.as_deref(),
            Some("main-work-experience-bullet-1")
        );

        assert_eq!(outcome.progress.state, PipelineState::Done);
        assert_eq!(llm.calls_to(PERSONALIZED_CV_SCHEMA), 1);
    }

    #[tokio::test]
    async fn test_summary_feeds_the_rewrite_prompt() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        pipeline
            .personalize(basic_request(), &ProgressTracker::basic())
            .await
            .unwrap();
        let prompt = &llm.prompts_to(PERSONALIZED_CV_SCHEMA)[0];
        assert!(prompt.contains("Senior Rust Engineer building low-latency trading APIs."));
        assert!(prompt.contains("main-work-experience-bullet-0"));
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        pipeline
            .personalize(basic_request(), &ProgressTracker::basic())
            .await
            .unwrap();
        let calls = llm.total_calls();

        let outcome = pipeline
            .personalize(basic_request(), &ProgressTracker::basic())
            .await
            .unwrap();
        assert_eq!(outcome.analysis_from_cache, Some(true));
        assert!(outcome.personalized.from_cache);
        assert_eq!(llm.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_analysis_and_rewrite_are_cached_independently() {
        let (pipeline, llm, cache) = build(scripted_llm()).await;
        pipeline
            .personalize(basic_request(), &ProgressTracker::basic())
            .await
            .unwrap();

        assert_eq!(cache.clear_by_prefix(&format!("{PERSONALIZE_CV_PREFIX}:")), 1);
        let outcome = pipeline
            .personalize(basic_request(), &ProgressTracker::basic())
            .await
            .unwrap();

        assert_eq!(outcome.analysis_from_cache, Some(true));
        assert!(!outcome.personalized.from_cache);
        assert_eq!(llm.calls_to(SUMMARY_SCHEMA), 1);
        assert_eq!(llm.calls_to(PERSONALIZED_CV_SCHEMA), 2);
    }

    #[tokio::test]
    async fn test_supplied_analysis_skips_fetch() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        let supplied = crate::analysis::analyze_position(
            llm.as_ref(),
            JOB_TEXT,
            &sample_cv(),
            AnalysisOptions::everything(),
        )
        .await
        .unwrap();
        let before = llm.calls_to(SUMMARY_SCHEMA) + llm.calls_to(INTERSECTION_SCHEMA);

        let progress = ProgressTracker::basic();
        let outcome = pipeline
            .personalize(
                PersonalizeRequest {
                    analysis: Some(supplied.clone()),
                    ..basic_request()
                },
                &progress,
            )
            .await
            .unwrap();

        assert_eq!(outcome.analysis, supplied);
        assert_eq!(outcome.analysis_from_cache, None);
        assert_eq!(
            llm.calls_to(SUMMARY_SCHEMA) + llm.calls_to(INTERSECTION_SCHEMA),
            before
        );
        assert_eq!(
            progress.status(Stage::FetchingAnalysis),
            Some(StageStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_partial_analysis_fetches_only_the_missing_part() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        let request = PersonalizeRequest {
            analysis: Some(PositionAnalysis {
                position_summary: Some("Given summary".to_string()),
                ..Default::default()
            }),
            ..basic_request()
        };

        let outcome = pipeline
            .personalize(request, &ProgressTracker::basic())
            .await
            .unwrap();

        assert_eq!(outcome.analysis.position_summary.as_deref(), Some("Given summary"));
        assert!(outcome.analysis.job_intersection.is_some());
        assert_eq!(llm.calls_to(SUMMARY_SCHEMA), 0);
        assert_eq!(llm.calls_to(INTERSECTION_SCHEMA), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_calls() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        let err = pipeline
            .personalize(
                PersonalizeRequest {
                    cv: CvDocument::default(),
                    ..basic_request()
                },
                &ProgressTracker::basic(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = pipeline
            .personalize_full(
                FullRequest {
                    stories: vec![],
                    ..full_request()
                },
                &ProgressTracker::full(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(llm.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_rewrite_is_not_cached() {
        let llm = scripted_llm().reply(PERSONALIZED_CV_SCHEMA, Reply::Refuse("no".into()));
        let (pipeline, _, cache) = build(llm).await;

        let err = pipeline
            .personalize(basic_request(), &ProgressTracker::basic())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with(PERSONALIZE_STAGE));
        assert_eq!(cache.clear_by_prefix(&format!("{PERSONALIZE_CV_PREFIX}:")), 0);
    }

    #[tokio::test]
    async fn test_full_run_produces_every_part() {
        let (pipeline, llm, _) = build(scripted_llm()).await;
        let progress = ProgressTracker::full();

        let outcome = pipeline
            .personalize_full(full_request(), &progress)
            .await
            .unwrap();

        assert_eq!(outcome.ranking.ranked.len(), 2);
        assert!(outcome.personalized.is_ok());
        assert_eq!(
            outcome.cover_letter.unwrap().subject,
            "Senior Rust Engineer application"
        );
        assert_eq!(progress.snapshot().state, PipelineState::Done);
        assert!(llm.prompts_to(COVER_LETTER_SCHEMA)[0].contains("Cut p99 latency"));
    }

    #[tokio::test]
    async fn test_letter_failure_keeps_personalized_cv() {
        let llm = scripted_llm().reply(COVER_LETTER_SCHEMA, Reply::Fail("overloaded".into()));
        let (pipeline, _, _) = build(llm).await;
        let progress = ProgressTracker::full();

        let outcome = pipeline
            .personalize_full(full_request(), &progress)
            .await
            .unwrap();

        assert!(outcome.personalized.is_ok());
        let err = outcome.cover_letter.unwrap_err();
        assert!(err.to_string().contains(LETTER_STAGE));
        assert_eq!(
            progress.status(Stage::PersonalizingCv),
            Some(StageStatus::Completed)
        );
        assert_eq!(
            progress.status(Stage::GeneratingLetter),
            Some(StageStatus::Active)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_branches_run_concurrently() {
        let llm = scripted_llm()
            .delay(PERSONALIZED_CV_SCHEMA, Duration::from_secs(5))
            .delay(COVER_LETTER_SCHEMA, Duration::from_secs(5));
        let (pipeline, _, _) = build(llm).await;

        let started = tokio::time::Instant::now();
        pipeline
            .personalize_full(full_request(), &ProgressTracker::full())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_ranking_failure_aborts_full_run() {
        let llm = scripted_llm().reply(STORY_RANKING_SCHEMA, Reply::Fail("boom".into()));
        let (pipeline, llm, _) = build(llm).await;

        let err = pipeline
            .personalize_full(full_request(), &ProgressTracker::full())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with(RANKING_STAGE));
        assert_eq!(llm.calls_to(PERSONALIZED_CV_SCHEMA), 0);
        assert_eq!(llm.calls_to(COVER_LETTER_SCHEMA), 0);
    }
}
