//! Stable identities for CV nodes.
//!
//! `ensure_ids` gives every section, subsection, paragraph and bullet point an
//! id derived from its column, title and position, leaving existing ids alone.
//! It runs on every load and on every regenerated document, so it must be a
//! fixed point after one application.
//!
//! Shapes:
//! - section:    `{column}-{slug(title)}` or `{column}-section-{index}`
//! - subsection: `{section_id}-sub-{index}`
//! - paragraph:  `{parent_id}-paragraph-{index}`
//! - bullet:     `{parent_id}-bullet-{index}`
//!
//! A derived id that collides with one already in the document gets `-2`, `-3`, ...

use std::collections::HashSet;

use super::models::{has_id, BulletPoint, Column, CvDocument, Paragraph};

pub fn ensure_ids(doc: &CvDocument) -> CvDocument {
    let mut out = doc.clone();
    let mut used = existing_ids(doc);

    for column in Column::ALL {
        for (index, section) in out.column_mut(column).iter_mut().enumerate() {
            let section_id = assign(&mut section.id, &mut used, || {
                match section.title.as_deref().map(slugify) {
                    Some(slug) if !slug.is_empty() => format!("{}-{slug}", column.as_str()),
                    _ => format!("{}-section-{index}", column.as_str()),
                }
            });

            tag_paragraphs(&mut section.paragraphs, &section_id, &mut used);
            tag_bullets(&mut section.bullet_points, &section_id, &mut used);

            for (sub_index, sub) in section.sub_sections.iter_mut().enumerate() {
                let sub_id = assign(&mut sub.id, &mut used, || {
                    format!("{section_id}-sub-{sub_index}")
                });
                tag_paragraphs(&mut sub.paragraphs, &sub_id, &mut used);
                tag_bullets(&mut sub.bullet_points, &sub_id, &mut used);
            }
        }
    }

    out
}

/// Lowercase slug of letters, digits and single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn tag_paragraphs(paragraphs: &mut [Paragraph], parent_id: &str, used: &mut HashSet<String>) {
    for (i, paragraph) in paragraphs.iter_mut().enumerate() {
        assign(&mut paragraph.id, used, || format!("{parent_id}-paragraph-{i}"));
    }
}

fn tag_bullets(bullets: &mut [BulletPoint], parent_id: &str, used: &mut HashSet<String>) {
    for (i, bullet) in bullets.iter_mut().enumerate() {
        assign(&mut bullet.id, used, || format!("{parent_id}-bullet-{i}"));
    }
}

/// Returns the node's id, deriving and reserving one if it has none.
fn assign(
    slot: &mut Option<String>,
    used: &mut HashSet<String>,
    derive: impl FnOnce() -> String,
) -> String {
    if let Some(id) = slot.as_deref().filter(|_| has_id(slot)) {
        return id.to_string();
    }

    let base = derive();
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    *slot = Some(candidate.clone());
    candidate
}

fn existing_ids(doc: &CvDocument) -> HashSet<String> {
    let mut ids = HashSet::new();
    let mut keep = |id: &Option<String>| {
        if let Some(id) = id.as_ref().filter(|_| has_id(id)) {
            ids.insert(id.clone());
        }
    };

    for section in doc.sections() {
        keep(&section.id);
        section.paragraphs.iter().for_each(|p| keep(&p.id));
        section.bullet_points.iter().for_each(|b| keep(&b.id));
        for sub in &section.sub_sections {
            keep(&sub.id);
            sub.paragraphs.iter().for_each(|p| keep(&p.id));
            sub.bullet_points.iter().for_each(|b| keep(&b.id));
        }
    }
    ids
}
