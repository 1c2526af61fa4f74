//! Null-coalescing transform applied right before schema-constrained model calls.
//!
//! The model sees (and must return) every field, even when empty: optional
//! strings become `""`. `from_model` reverses that for the returned document.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::models::{BulletPoint, CvDocument, Paragraph, Section, SubSection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCv {
    pub main: Vec<ModelSection>,
    pub side: Vec<ModelSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    pub id: String,
    pub title: String,
    pub paragraphs: Vec<ModelParagraph>,
    pub bullet_points: Vec<ModelBullet>,
    pub sub_sections: Vec<ModelSubSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSubSection {
    pub id: String,
    pub title: String,
    pub paragraphs: Vec<ModelParagraph>,
    pub bullet_points: Vec<ModelBullet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParagraph {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBullet {
    pub id: String,
    pub text: String,
    pub link: String,
    pub icon: String,
}

pub fn to_model(doc: &CvDocument) -> ModelCv {
    ModelCv {
        main: doc.main.iter().map(section_to_model).collect(),
        side: doc.side.iter().map(section_to_model).collect(),
    }
}

pub fn from_model(model: ModelCv) -> CvDocument {
    CvDocument {
        main: model.main.into_iter().map(section_from_model).collect(),
        side: model.side.into_iter().map(section_from_model).collect(),
    }
}

fn section_to_model(section: &Section) -> ModelSection {
    ModelSection {
        id: coalesce(&section.id),
        title: coalesce(&section.title),
        paragraphs: section.paragraphs.iter().map(paragraph_to_model).collect(),
        bullet_points: section.bullet_points.iter().map(bullet_to_model).collect(),
        sub_sections: section
            .sub_sections
            .iter()
            .map(|sub| ModelSubSection {
                id: coalesce(&sub.id),
                title: coalesce(&sub.title),
                paragraphs: sub.paragraphs.iter().map(paragraph_to_model).collect(),
                bullet_points: sub.bullet_points.iter().map(bullet_to_model).collect(),
            })
            .collect(),
    }
}

fn section_from_model(section: ModelSection) -> Section {
    Section {
        id: blank_to_none(section.id),
        title: blank_to_none(section.title),
        paragraphs: section.paragraphs.into_iter().map(paragraph_from_model).collect(),
        bullet_points: section.bullet_points.into_iter().map(bullet_from_model).collect(),
        sub_sections: section
            .sub_sections
            .into_iter()
            .map(|sub| SubSection {
                id: blank_to_none(sub.id),
                title: blank_to_none(sub.title),
                paragraphs: sub.paragraphs.into_iter().map(paragraph_from_model).collect(),
                bullet_points: sub.bullet_points.into_iter().map(bullet_from_model).collect(),
            })
            .collect(),
    }
}

fn paragraph_to_model(p: &Paragraph) -> ModelParagraph {
    ModelParagraph {
        id: coalesce(&p.id),
        text: p.text.clone(),
    }
}

fn paragraph_from_model(p: ModelParagraph) -> Paragraph {
    Paragraph {
        id: blank_to_none(p.id),
        text: p.text,
    }
}

fn bullet_to_model(b: &BulletPoint) -> ModelBullet {
    ModelBullet {
        id: coalesce(&b.id),
        text: b.text.clone(),
        link: coalesce(&b.link),
        icon: coalesce(&b.icon),
    }
}

fn bullet_from_model(b: ModelBullet) -> BulletPoint {
    BulletPoint {
        id: blank_to_none(b.id),
        text: b.text,
        link: blank_to_none(b.link),
        icon: blank_to_none(b.icon),
    }
}

fn coalesce(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn blank_to_none(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// JSON schema for `ModelCv`; every property is required.
pub fn model_cv_schema() -> Value {
    let string = json!({"type": "string"});
    let paragraph = strict_object(json!({"id": string, "text": string}));
    let bullet = strict_object(json!({
        "id": string, "text": string, "link": string, "icon": string
    }));
    let sub_section = strict_object(json!({
        "id": string,
        "title": string,
        "paragraphs": {"type": "array", "items": paragraph},
        "bulletPoints": {"type": "array", "items": bullet},
    }));
    let section = strict_object(json!({
        "id": string,
        "title": string,
        "paragraphs": {"type": "array", "items": paragraph},
        "bulletPoints": {"type": "array", "items": bullet},
        "subSections": {"type": "array", "items": sub_section},
    }));
    strict_object(json!({
        "main": {"type": "array", "items": section},
        "side": {"type": "array", "items": section},
    }))
}

/// Object schema whose every property is required and no others are allowed.
pub fn strict_object(properties: Value) -> Value {
    let required: Vec<String> = properties
        .as_object()
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}
