use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cv::normalize::strict_object;
use crate::llm_client::ResponseSchema;

pub const SUMMARY_SCHEMA: &str = "position_summary";
pub const INTERSECTION_SCHEMA: &str = "job_intersection";

/// Merged output of the analysis stages. Each field is independently optional:
/// a skipped stage leaves its fields unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_intersection: Option<JobIntersection>,
}

impl PositionAnalysis {
    /// Fills fields missing from `self` with those from `other`.
    pub fn merge(self, other: PositionAnalysis) -> PositionAnalysis {
        PositionAnalysis {
            position_summary: self.position_summary.or(other.position_summary),
            company_name: self.company_name.or(other.company_name),
            job_intersection: self.job_intersection.or(other.job_intersection),
        }
    }
}

/// How well the CV covers the posting. `rating` is 1–10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobIntersection {
    pub opinion: String,
    pub rating: u8,
    pub what_is_good: Vec<String>,
    pub what_is_missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub skip_summary: bool,
    #[serde(default)]
    pub skip_intersection: bool,
}

impl AnalysisOptions {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn skips_everything(&self) -> bool {
        self.skip_summary && self.skip_intersection
    }
}

/// What the summary call returns; an empty company name means unknown.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReply {
    pub position_summary: String,
    pub company_name: String,
}

/// What the intersection call returns.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionReply {
    pub opinion: String,
    pub rating: u8,
    pub what_is_good: Vec<String>,
    pub what_is_missing: Vec<String>,
}

impl From<IntersectionReply> for JobIntersection {
    fn from(reply: IntersectionReply) -> Self {
        JobIntersection {
            opinion: reply.opinion,
            rating: reply.rating,
            what_is_good: reply.what_is_good,
            what_is_missing: reply.what_is_missing,
        }
    }
}

pub fn summary_schema() -> ResponseSchema {
    ResponseSchema {
        name: SUMMARY_SCHEMA,
        description: "Record a concise summary of the job posting and the hiring company.",
        schema: strict_object(json!({
            "positionSummary": {"type": "string"},
            "companyName": {"type": "string"},
        })),
    }
}

pub fn intersection_schema() -> ResponseSchema {
    ResponseSchema {
        name: INTERSECTION_SCHEMA,
        description: "Record how well the candidate's CV matches the job posting.",
        schema: strict_object(json!({
            "opinion": {"type": "string"},
            "rating": {"type": "integer", "minimum": 1, "maximum": 10},
            "whatIsGood": {"type": "array", "items": {"type": "string"}},
            "whatIsMissing": {"type": "array", "items": {"type": "string"}},
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_reply_uses_camel_case_wire_names() {
        let parsed: IntersectionReply = serde_json::from_value(json!({
            "opinion": "Solid match",
            "rating": 8,
            "whatIsGood": ["Rust"],
            "whatIsMissing": ["Kafka"]
        }))
        .unwrap();
        let intersection = JobIntersection::from(parsed);
        assert_eq!(intersection.rating, 8);
        assert_eq!(intersection.what_is_missing, vec!["Kafka".to_string()]);
    }

    #[test]
    fn test_merge_keeps_existing_and_fills_gaps() {
        let supplied = PositionAnalysis {
            position_summary: Some("mine".into()),
            ..Default::default()
        };
        let fetched = PositionAnalysis {
            position_summary: Some("theirs".into()),
            company_name: Some("Acme".into()),
            job_intersection: None,
        };
        let merged = supplied.merge(fetched);
        assert_eq!(merged.position_summary.as_deref(), Some("mine"));
        assert_eq!(merged.company_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_empty_analysis_serializes_to_empty_object() {
        assert_eq!(
            serde_json::to_value(PositionAnalysis::default()).unwrap(),
            json!({})
        );
    }
}
