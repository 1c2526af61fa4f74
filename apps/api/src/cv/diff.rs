//! Structural diff between two id-tagged versions of the same CV.
//!
//! Identity is id continuity, not content: a node without an id, or whose id
//! is unknown to the original, is new even if its content matches something.
//! Removal is reported only at the level where an id vanishes, so a section
//! that lost all its subsections is modified, and subsections of a removed
//! section are covered by the section's removal.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::models::{CvDocument, Section, SubSection};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubSectionRef {
    pub section_id: String,
    pub sub_section_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSubSection {
    pub section_id: String,
    pub sub_section: SubSection,
}

/// Serializes with snake_case fields. Embedded sections and subsections keep
/// the camelCase document format.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    pub modified_sections: Vec<String>,
    pub removed_sections: Vec<String>,
    pub new_sections: Vec<Section>,
    pub modified_sub_sections: Vec<SubSectionRef>,
    pub removed_sub_sections: Vec<SubSectionRef>,
    pub new_sub_sections: Vec<NewSubSection>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.modified_sections.is_empty()
            && self.removed_sections.is_empty()
            && self.new_sections.is_empty()
            && self.modified_sub_sections.is_empty()
            && self.removed_sub_sections.is_empty()
            && self.new_sub_sections.is_empty()
    }
}

/// Classifies every section and subsection of `current` against `original`.
/// Neither input is modified.
pub fn diff_documents(original: &CvDocument, current: &CvDocument) -> DiffResult {
    let mut result = DiffResult::default();
    let mut modified: HashSet<&str> = HashSet::new();

    let original_index: HashMap<&str, &Section> = original
        .sections()
        .filter_map(|s| s.id.as_deref().map(|id| (id, s)))
        .collect();

    for section in current.sections() {
        let Some((id, before)) = section
            .id
            .as_deref()
            .and_then(|id| original_index.get(id).map(|before| (id, *before)))
        else {
            result.new_sections.push(section.clone());
            continue;
        };

        // A repeated id is reported once.
        if before != section && modified.insert(id) {
            result.modified_sections.push(id.to_string());
        }

        if !before.sub_sections.is_empty() && !section.sub_sections.is_empty() {
            diff_sub_sections(id, before, section, &mut result);
        }
    }

    collect_removed(original, current, &mut result);
    result
}

fn diff_sub_sections(section_id: &str, before: &Section, after: &Section, result: &mut DiffResult) {
    let index: HashMap<&str, &SubSection> = before
        .sub_sections
        .iter()
        .filter_map(|s| s.id.as_deref().map(|id| (id, s)))
        .collect();

    for sub in &after.sub_sections {
        match sub.id.as_deref().and_then(|id| index.get(id).map(|prev| (id, *prev))) {
            None => result.new_sub_sections.push(NewSubSection {
                section_id: section_id.to_string(),
                sub_section: sub.clone(),
            }),
            Some((id, prev)) if prev != sub => {
                let changed = SubSectionRef {
                    section_id: section_id.to_string(),
                    sub_section_id: id.to_string(),
                };
                if !result.modified_sub_sections.contains(&changed) {
                    result.modified_sub_sections.push(changed);
                }
            }
            Some(_) => {}
        }
    }
}

fn collect_removed(original: &CvDocument, current: &CvDocument, result: &mut DiffResult) {
    let current_sections: HashSet<&str> =
        current.sections().filter_map(|s| s.id.as_deref()).collect();
    let current_subs: HashSet<&str> = current
        .sections()
        .flat_map(|s| s.sub_sections.iter())
        .filter_map(|s| s.id.as_deref())
        .collect();

    let mut reported: HashSet<&str> = HashSet::new();

    for section in original.sections() {
        let Some(section_id) = section.id.as_deref() else {
            continue;
        };
        if !current_sections.contains(section_id) {
            if reported.insert(section_id) {
                result.removed_sections.push(section_id.to_string());
            }
            continue;
        }
        for sub_id in section.sub_sections.iter().filter_map(|s| s.id.as_deref()) {
            if current_subs.contains(sub_id) {
                continue;
            }
            let removed = SubSectionRef {
                section_id: section_id.to_string(),
                sub_section_id: sub_id.to_string(),
            };
            if !result.removed_sub_sections.contains(&removed) {
                result.removed_sub_sections.push(removed);
            }
        }
    }
}
