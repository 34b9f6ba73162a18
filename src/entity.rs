use serde::{Deserialize, Serialize};

use crate::language::base_language;

pub const DEFAULT_LABEL_FIELD: &str = "label";

fn default_field() -> String {
    DEFAULT_LABEL_FIELD.to_string()
}

fn is_default_field(field: &str) -> bool {
    field == DEFAULT_LABEL_FIELD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// The property this label was taken from (e.g. `label`, `alt_label`).
    #[serde(default = "default_field", skip_serializing_if = "is_default_field")]
    pub field: String,
}

impl Label {
    pub fn new(text: &str, language: Option<&str>) -> Self {
        Self {
            text: text.to_string(),
            language: language.map(str::to_string),
            field: default_field(),
        }
    }

    pub fn in_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }
}

/// An entity of the reference knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub types: Vec<String>,
    /// The entity this one is an alias of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    /// Popularity of the entity within `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<f64>,
}

impl Entity {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            labels: Vec::new(),
            types: Vec::new(),
            redirect: None,
            ranking: None,
        }
    }

    pub fn with_label(mut self, text: &str, language: Option<&str>) -> Self {
        self.labels.push(Label::new(text, language));
        self
    }

    pub fn with_type(mut self, ty: &str) -> Self {
        self.types.push(ty.to_string());
        self
    }

    pub fn with_redirect(mut self, target: &str) -> Self {
        self.redirect = Some(target.to_string());
        self
    }

    pub fn with_ranking(mut self, ranking: f64) -> Self {
        self.ranking = Some(ranking);
        self
    }

    /// Labels usable for a query in `language`.
    pub fn labels_for<'a>(
        &'a self,
        language: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Label> + 'a {
        self.labels
            .iter()
            .filter(move |l| language_matches(l.language.as_deref(), language))
    }
}

/// Whether a label in `label_lang` may answer a query in `query_lang`.
///
/// Untagged labels and untagged queries match everything; otherwise the
/// languages must be equal or the label must be in the query's base
/// language.
pub fn language_matches(label_lang: Option<&str>, query_lang: Option<&str>) -> bool {
    match (label_lang, query_lang) {
        (None, _) | (_, None) => true,
        (Some(label), Some(query)) => {
            label.eq_ignore_ascii_case(query)
                || label.eq_ignore_ascii_case(base_language(query))
        }
    }
}

/// An entity returned by a lookup, with the searcher's relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub entity: Entity,
    pub score: f32,
}
