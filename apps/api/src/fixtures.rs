//! Shared test fixtures: a small two-column CV, a job posting and a scripted model.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use crate::analysis::models::{INTERSECTION_SCHEMA, SUMMARY_SCHEMA};
use crate::cache::backend::memory::MemoryBackend;
use crate::cache::clock::ManualClock;
use crate::cache::ResponseCache;
use crate::cv::source::FsDocumentSource;
use crate::cv::normalize::to_model;
use crate::cv::models::has_id;
use crate::cv::{ensure_ids, BulletPoint, CvDocument, Paragraph, Section, SubSection};
use crate::llm_client::testing::ScriptedLlm;
use crate::personalization::models::{
    Story, COVER_LETTER_SCHEMA, PERSONALIZED_CV_SCHEMA, STORY_RANKING_SCHEMA,
};
use crate::personalization::{CacheTtls, PersonalizationPipeline};
use crate::state::AppState;

pub const JOB_TEXT: &str = "Acme is hiring a Senior Rust Engineer to build low-latency \
    trading APIs. You will own services end to end. Required: Rust, PostgreSQL, Kubernetes.";

fn bullet(text: &str) -> BulletPoint {
    BulletPoint {
        text: text.to_string(),
        ..Default::default()
    }
}

/// Id-tagged CV: one "Work Experience" section with two bullets, plus a skills column.
pub fn sample_cv() -> CvDocument {
    ensure_ids(&CvDocument {
        main: vec![Section {
            title: Some("Work Experience".into()),
            bullet_points: vec![
                bullet("Built REST services in Go and Rust"),
                bullet("Ran the on-call rotation for payments"),
            ],
            ..Default::default()
        }],
        side: vec![Section {
            title: Some("Skills".into()),
            bullet_points: vec![bullet("Rust"), bullet("PostgreSQL")],
            ..Default::default()
        }],
    })
}

pub fn sample_stories() -> Vec<Story> {
    vec![
        Story {
            id: "latency".into(),
            title: "Cut p99 latency".into(),
            content: "Rewrote the pricing service in Rust and cut p99 from 80ms to 9ms.".into(),
        },
        Story {
            id: "oncall".into(),
            title: "Fixed on-call".into(),
            content: "Halved pages by adding SLO-based alerting.".into(),
        },
    ]
}

/// The model's rewrite of `sample_cv`: first work bullet reworded, ids kept.
pub fn personalized_reply() -> serde_json::Value {
    let mut model = to_model(&sample_cv());
    model.main[0].bullet_points[0].text =
        "Built low-latency Rust services handling 20k req/s".to_string();
    serde_json::to_value(model).unwrap()
}

/// A model that answers every schema the crate uses.
pub fn scripted_llm() -> ScriptedLlm {
    ScriptedLlm::new()
        .json(
            SUMMARY_SCHEMA,
            json!({
                "positionSummary": "Senior Rust Engineer building low-latency trading APIs.",
                "companyName": "Acme"
            }),
        )
        .json(
            INTERSECTION_SCHEMA,
            json!({
                "opinion": "Strong backend match; Kubernetes is not evidenced.",
                "rating": 7,
                "whatIsGood": ["Rust", "PostgreSQL"],
                "whatIsMissing": ["Kubernetes"]
            }),
        )
        .json(PERSONALIZED_CV_SCHEMA, personalized_reply())
        .json(
            STORY_RANKING_SCHEMA,
            json!({
                "ranked": [
                    {"storyId": "latency", "relevance": 9, "reason": "Latency is the core of the role"},
                    {"storyId": "oncall", "relevance": 5, "reason": "Shows ownership"}
                ]
            }),
        )
        .json(
            COVER_LETTER_SCHEMA,
            json!({
                "subject": "Senior Rust Engineer application",
                "body": "Dear Acme team, ..."
            }),
        )
}

/// Content store with `cv/en.json` (an untagged `sample_cv`) and `applications/acme.md`.
pub fn content_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("cv")).unwrap();
    std::fs::create_dir_all(dir.path().join("applications")).unwrap();

    let mut untagged = sample_cv();
    for section in untagged.main.iter_mut().chain(untagged.side.iter_mut()) {
        section.id = None;
        for bullet in &mut section.bullet_points {
            bullet.id = None;
        }
    }
    std::fs::write(
        dir.path().join("cv/en.json"),
        serde_json::to_string(&untagged).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.path().join("applications/acme.md"), JOB_TEXT).unwrap();
    dir
}

/// Application state over an in-memory cache and the content store at `content`.
pub async fn test_state(llm: ScriptedLlm, content: &Path) -> (AppState, Arc<ScriptedLlm>) {
    let llm = Arc::new(llm);
    let cache = ResponseCache::init(
        Arc::new(MemoryBackend::default()),
        Arc::new(ManualClock::at(1_700_000_000_000)),
        Duration::from_millis(1000),
    )
    .await;
    let ttls = CacheTtls {
        analysis: Duration::from_secs(3600),
        personalization: Duration::from_secs(3600),
    };
    let state = AppState {
        cache: cache.clone(),
        source: Arc::new(FsDocumentSource::new(content)),
        pipeline: PersonalizationPipeline::new(llm.clone(), cache, ttls),
    };
    (state, llm)
}

// ────────────────────────────────────────────────────────────────────────────
// Generated documents
// ────────────────────────────────────────────────────────────────────────────

const TITLES: &[&str] = &["Experience", "Skills", "Projects", "", "   ", "Ünïcode Títle"];

/// Includes ids that collide with what `ensure_ids` would derive.
const PRESET_IDS: &[&str] = &[
    "main-experience",
    "main-experience-2",
    "main-section-0",
    "side-skills",
    "main-experience-sub-0",
    "main-experience-bullet-0",
    "custom",
];

fn arb_title() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        prop::sample::select(TITLES).prop_map(|t| Some(t.to_string())),
        "[A-Za-z][A-Za-z &/-]{0,15}".prop_map(Some),
    ]
}

fn arb_id() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        4 => Just(None),
        1 => Just(Some(String::new())),
        1 => Just(Some("   ".to_string())),
        2 => prop::sample::select(PRESET_IDS).prop_map(|id| Some(id.to_string())),
    ]
}

fn arb_paragraphs() -> impl Strategy<Value = Vec<Paragraph>> {
    prop::collection::vec((arb_id(), "[a-z ]{0,10}"), 0..3)
        .prop_map(|items| items.into_iter().map(|(id, text)| Paragraph { id, text }).collect())
}

fn arb_bullets() -> impl Strategy<Value = Vec<BulletPoint>> {
    prop::collection::vec((arb_id(), "[a-z ]{0,10}"), 0..3).prop_map(|items| {
        items
            .into_iter()
            .map(|(id, text)| BulletPoint {
                id,
                text,
                ..Default::default()
            })
            .collect()
    })
}

fn arb_sub_section() -> impl Strategy<Value = SubSection> {
    (arb_id(), arb_title(), arb_paragraphs(), arb_bullets()).prop_map(
        |(id, title, paragraphs, bullet_points)| SubSection {
            id,
            title,
            paragraphs,
            bullet_points,
        },
    )
}

fn arb_section() -> impl Strategy<Value = Section> {
    (
        arb_id(),
        arb_title(),
        arb_paragraphs(),
        arb_bullets(),
        prop::collection::vec(arb_sub_section(), 0..3),
    )
        .prop_map(|(id, title, paragraphs, bullet_points, sub_sections)| Section {
            id,
            title,
            paragraphs,
            bullet_points,
            sub_sections,
        })
}

/// Untagged or partially tagged CVs with blank and repeated titles. Preset ids
/// are unique within a document; blank ones count as missing.
pub fn arb_cv() -> impl Strategy<Value = CvDocument> {
    (
        prop::collection::vec(arb_section(), 0..4),
        prop::collection::vec(arb_section(), 0..3),
    )
        .prop_map(|(main, side)| {
            let mut doc = CvDocument { main, side };
            let mut seen = std::collections::HashSet::new();
            for slot in id_slots(&mut doc) {
                if has_id(slot) && !seen.insert(slot.clone()) {
                    *slot = None;
                }
            }
            doc
        })
}

/// Every node id in document order: section, its paragraphs, bullets, then subsections.
pub fn node_ids(doc: &CvDocument) -> Vec<Option<String>> {
    let mut doc = doc.clone();
    id_slots(&mut doc).into_iter().map(|slot| slot.clone()).collect()
}

fn id_slots(doc: &mut CvDocument) -> Vec<&mut Option<String>> {
    let mut slots = Vec::new();
    for section in doc.main.iter_mut().chain(doc.side.iter_mut()) {
        slots.push(&mut section.id);
        slots.extend(section.paragraphs.iter_mut().map(|p| &mut p.id));
        slots.extend(section.bullet_points.iter_mut().map(|b| &mut b.id));
        for sub in &mut section.sub_sections {
            slots.push(&mut sub.id);
            slots.extend(sub.paragraphs.iter_mut().map(|p| &mut p.id));
            slots.extend(sub.bullet_points.iter_mut().map(|b| &mut b.id));
        }
    }
    slots
}
