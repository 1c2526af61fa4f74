use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::analysis::PositionAnalysis;
use crate::cv::normalize::{model_cv_schema, strict_object};
use crate::cv::{CvDocument, DiffResult};
use crate::errors::AppError;
use crate::llm_client::ResponseSchema;
use crate::personalization::progress::ProgressSnapshot;

pub const PERSONALIZED_CV_SCHEMA: &str = "personalized_cv";
pub const STORY_RANKING_SCHEMA: &str = "story_ranking";
pub const COVER_LETTER_SCHEMA: &str = "cover_letter";

/// A career anecdote the candidate can draw on in a cover letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStory {
    #[serde(alias = "storyId")]
    pub story_id: String,
    /// 1–10, higher is more relevant.
    pub relevance: u8,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryRanking {
    pub ranked: Vec<RankedStory>,
}

impl StoryRanking {
    /// The `n` most relevant stories that exist in `stories`, best first.
    pub fn top<'a>(&self, stories: &'a [Story], n: usize) -> Vec<&'a Story> {
        let mut ranked: Vec<&RankedStory> = self.ranked.iter().collect();
        ranked.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        ranked
            .into_iter()
            .filter_map(|r| stories.iter().find(|s| s.id == r.story_id))
            .take(n)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub subject: String,
    pub body: String,
}

/// A rewritten CV, id-tagged, with its diff against the original.
#[derive(Debug, Clone, Serialize)]
pub struct PersonalizedCv {
    pub cv: CvDocument,
    pub from_cache: bool,
    pub diff: DiffResult,
}

#[derive(Debug, Clone)]
pub struct PersonalizeRequest {
    pub job_text: String,
    pub cv: CvDocument,
    /// Analysis the caller already has; missing parts are fetched.
    pub analysis: Option<PositionAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalizeOutcome {
    pub run_id: Uuid,
    pub analysis: PositionAnalysis,
    /// `None` when the caller supplied a complete analysis.
    pub analysis_from_cache: Option<bool>,
    pub personalized: PersonalizedCv,
    pub progress: ProgressSnapshot,
}

#[derive(Debug, Clone)]
pub struct FullRequest {
    pub job_text: String,
    pub cv: CvDocument,
    pub stories: Vec<Story>,
}

/// Result of the client-facing variant. The two final branches ran
/// concurrently and succeed or fail independently.
#[derive(Debug)]
pub struct FullOutcome {
    pub run_id: Uuid,
    pub analysis: PositionAnalysis,
    pub analysis_from_cache: bool,
    pub ranking: StoryRanking,
    pub ranking_from_cache: bool,
    pub personalized: Result<PersonalizedCv, AppError>,
    pub cover_letter: Result<CoverLetter, AppError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingReply {
    pub ranked: Vec<RankedStory>,
}

pub fn personalized_cv_schema() -> ResponseSchema {
    ResponseSchema {
        name: PERSONALIZED_CV_SCHEMA,
        description: "Record the CV rewritten for the job posting, in the same structure.",
        schema: model_cv_schema(),
    }
}

pub fn story_ranking_schema() -> ResponseSchema {
    let ranked_story = strict_object(json!({
        "storyId": {"type": "string"},
        "relevance": {"type": "integer", "minimum": 1, "maximum": 10},
        "reason": {"type": "string"},
    }));
    ResponseSchema {
        name: STORY_RANKING_SCHEMA,
        description: "Record every story ranked by relevance to the job posting.",
        schema: strict_object(json!({
            "ranked": {"type": "array", "items": ranked_story},
        })),
    }
}

pub fn cover_letter_schema() -> ResponseSchema {
    ResponseSchema {
        name: COVER_LETTER_SCHEMA,
        description: "Record the cover letter.",
        schema: strict_object(json!({
            "subject": {"type": "string"},
            "body": {"type": "string"},
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: &str) -> Story {
        Story {
            id: id.to_string(),
            title: id.to_string(),
            content: String::new(),
        }
    }

    fn ranked(id: &str, relevance: u8) -> RankedStory {
        RankedStory {
            story_id: id.to_string(),
            relevance,
            reason: String::new(),
        }
    }

    #[test]
    fn test_top_orders_by_relevance_and_skips_unknown_ids() {
        let stories = vec![story("a"), story("b"), story("c")];
        let ranking = StoryRanking {
            ranked: vec![ranked("a", 3), ranked("ghost", 10), ranked("c", 8), ranked("b", 5)],
        };
        let top: Vec<&str> = ranking
            .top(&stories, 2)
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(top, vec!["c", "b"]);
    }

    #[test]
    fn test_ranking_reply_reads_camel_case() {
        let reply: RankingReply = serde_json::from_value(json!({
            "ranked": [{"storyId": "a", "relevance": 4, "reason": "r"}]
        }))
        .unwrap();
        assert_eq!(reply.ranked[0].story_id, "a");
    }
}
