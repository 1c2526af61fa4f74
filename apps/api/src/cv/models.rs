use serde::{Deserialize, Serialize};

/// The two layout columns of a CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Main,
    Side,
}

impl Column {
    pub const ALL: [Column; 2] = [Column::Main, Column::Side];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Main => "main",
            Column::Side => "side",
        }
    }
}

/// A structured CV split into a main and a side column.
///
/// Equality is structural and typed: two documents are equal iff every node
/// (ids included) is equal, independent of how the JSON keys were ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvDocument {
    #[serde(default)]
    pub main: Vec<Section>,
    #[serde(default)]
    pub side: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullet_points: Vec<BulletPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_sections: Vec<SubSection>,
}

/// One level below a section; subsections do not nest further.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullet_points: Vec<BulletPoint>,
}

/// Accepts either a bare string or `{ "id", "text" }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParagraphRepr")]
pub struct Paragraph {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParagraphRepr {
    Text(String),
    Tagged {
        #[serde(default)]
        id: Option<String>,
        text: String,
    },
}

impl From<ParagraphRepr> for Paragraph {
    fn from(repr: ParagraphRepr) -> Self {
        match repr {
            ParagraphRepr::Text(text) => Paragraph { id: None, text },
            ParagraphRepr::Tagged { id, text } => Paragraph { id, text },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulletPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl CvDocument {
    pub fn column_mut(&mut self, column: Column) -> &mut Vec<Section> {
        match column {
            Column::Main => &mut self.main,
            Column::Side => &mut self.side,
        }
    }

    /// All sections, main column first.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.main.iter().chain(self.side.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.side.is_empty()
    }
}

/// True when `id` is present and not blank.
pub(crate) fn has_id(id: &Option<String>) -> bool {
    id.as_deref().is_some_and(|s| !s.trim().is_empty())
}
