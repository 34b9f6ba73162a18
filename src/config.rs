//! Linking settings.
//!
//! Settings are plain serde JSON. Everything except the `languages` list has
//! a default; a missing or empty language list is a configuration error.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    language::LanguageConfiguration,
    text::{LexicalCategory, Pos, PosTag},
};

pub const DBPEDIA_PERSON: &str = "http://dbpedia.org/ontology/Person";
pub const DBPEDIA_ORGANISATION: &str =
    "http://dbpedia.org/ontology/Organisation";
pub const DBPEDIA_PLACE: &str = "http://dbpedia.org/ontology/Place";
pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";

/// How redirect links between entities are handled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RedirectProcessingMode {
    /// Keep the entity returned by the lookup.
    #[default]
    Ignore,
    /// Replace the entity with its redirect target.
    Follow,
    /// Suggest both the entity and its redirect target.
    AddBoth,
}

/// How an external entity ranking is merged into the match score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RankingMerge {
    #[default]
    Ignore,
    Multiply,
    Add,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    pub max_suggestions: usize,
    /// Keep suggestions beyond `max_suggestions` that share the score of
    /// the last kept one.
    pub include_similar_score: bool,
    pub min_found_tokens: usize,
    /// Maximum number of tokens sent to the searcher per occurrence.
    pub max_search_tokens: usize,
    /// Maximum number of candidates requested from the searcher.
    pub lookup_limit: usize,
    pub redirect_mode: RedirectProcessingMode,
    pub max_redirect_depth: usize,
    pub min_token_match_factor: f64,
    pub min_label_score: f64,
    pub min_text_score: f64,
    pub min_match_score: f64,
    pub case_sensitive: bool,
    /// Use token lemmas (when present) for lookup and matching.
    pub lemma_matching: bool,
    /// Language of the fallback labels. `None` means labels without a
    /// language tag.
    pub default_language: Option<String>,
    pub ranking_merge: RankingMerge,
    pub ranking_weight: f64,
    pub rank_equal_scores_by_ranking: bool,
    /// Entity type → `dc:type` of the linked entity.
    pub type_mappings: BTreeMap<String, String>,
    pub default_dc_type: Option<String>,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            include_similar_score: false,
            min_found_tokens: 1,
            max_search_tokens: 2,
            lookup_limit: 20,
            redirect_mode: RedirectProcessingMode::Ignore,
            max_redirect_depth: 3,
            min_token_match_factor: 0.7,
            min_label_score: 0.75,
            min_text_score: 0.4,
            min_match_score: 0.3,
            case_sensitive: false,
            lemma_matching: false,
            default_language: None,
            ranking_merge: RankingMerge::Ignore,
            ranking_weight: 0.1,
            rank_equal_scores_by_ranking: false,
            type_mappings: default_type_mappings(),
            default_dc_type: None,
        }
    }
}

pub fn default_type_mappings() -> BTreeMap<String, String> {
    let pairs = [
        (DBPEDIA_PERSON, DBPEDIA_PERSON),
        ("http://xmlns.com/foaf/0.1/Person", DBPEDIA_PERSON),
        ("http://schema.org/Person", DBPEDIA_PERSON),
        (DBPEDIA_ORGANISATION, DBPEDIA_ORGANISATION),
        ("http://dbpedia.org/ontology/Newspaper", DBPEDIA_ORGANISATION),
        ("http://schema.org/Organization", DBPEDIA_ORGANISATION),
        (DBPEDIA_PLACE, DBPEDIA_PLACE),
        ("http://schema.org/Place", DBPEDIA_PLACE),
        ("http://www.geonames.org/ontology#Feature", DBPEDIA_PLACE),
        (SKOS_CONCEPT, SKOS_CONCEPT),
    ];
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A set of lexical categories, POS types and raw tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySet {
    pub categories: BTreeSet<LexicalCategory>,
    pub pos: BTreeSet<Pos>,
    pub tags: BTreeSet<String>,
}

impl CategorySet {
    pub fn new(categories: &[LexicalCategory], pos: &[Pos]) -> Self {
        Self {
            categories: categories.iter().copied().collect(),
            pos: pos.iter().copied().collect(),
            tags: BTreeSet::new(),
        }
    }

    pub fn matches(&self, tag: &PosTag) -> bool {
        tag.categories().any(|c| self.categories.contains(&c))
            || tag.pos.is_some_and(|p| self.pos.contains(&p))
            || self.tags.contains(&tag.tag)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.pos.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextProcessingConfig {
    /// Only link proper nouns, foreign words and acronyms.
    pub proper_nouns_only: bool,
    pub linked: CategorySet,
    pub matched: CategorySet,
    /// Tokens that may continue a span inside a chunk without being
    /// matchable themselves.
    pub chunkable: CategorySet,
    pub min_pos_score: f64,
    /// Defaults to half of `min_pos_score`.
    pub min_exclude_pos_score: Option<f64>,
    pub ignore_chunks: bool,
    pub phrase_categories: BTreeSet<LexicalCategory>,
    pub phrase_tags: BTreeSet<String>,
    pub min_phrase_score: f64,
    pub link_upper_case: bool,
    pub match_upper_case: bool,
    pub link_only_upper_case_with_unknown_pos: bool,
    pub link_multi_matchable_in_chunk: bool,
    pub min_search_token_length: usize,
    pub allow_single_token_spans: bool,
    /// Size of the context window when a document has no sentences.
    pub context_chars: usize,
}

impl Default for TextProcessingConfig {
    fn default() -> Self {
        use LexicalCategory as C;
        Self {
            proper_nouns_only: false,
            linked: CategorySet::new(&[C::Noun, C::Residual], &[]),
            matched: CategorySet::new(
                &[C::Noun, C::Quantifier, C::Residual],
                &[Pos::Gerund],
            ),
            chunkable: CategorySet::new(
                &[C::Noun, C::Punctuation, C::Conjunction],
                &[Pos::Preposition],
            ),
            min_pos_score: 0.75,
            min_exclude_pos_score: None,
            ignore_chunks: false,
            phrase_categories: [C::Noun].into_iter().collect(),
            phrase_tags: BTreeSet::new(),
            min_phrase_score: 0.75,
            link_upper_case: false,
            match_upper_case: true,
            link_only_upper_case_with_unknown_pos: true,
            link_multi_matchable_in_chunk: true,
            min_search_token_length: 3,
            allow_single_token_spans: false,
            context_chars: crate::text_util::DEFAULT_CONTEXT_CHARS,
        }
    }
}

impl TextProcessingConfig {
    /// The set of linkable categories, honouring `proper_nouns_only`.
    pub fn linked_set(&self) -> CategorySet {
        if self.proper_nouns_only {
            CategorySet::new(&[], &[Pos::ProperNoun, Pos::Foreign, Pos::Acronym])
        } else {
            self.linked.clone()
        }
    }

    pub fn exclude_pos_score(&self) -> f64 {
        self.min_exclude_pos_score
            .unwrap_or(self.min_pos_score / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Size of the worker pool building label corpora.
    pub threads: usize,
    /// Label field used when a language has no `field` parameter.
    pub default_field: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            default_field: crate::entity::DEFAULT_LABEL_FIELD.to_string(),
        }
    }
}

/// A complete linking profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub languages: Vec<String>,
    #[serde(default)]
    pub linker: LinkerConfig,
    #[serde(default)]
    pub text: TextProcessingConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            languages: vec!["*".to_string()],
            linker: LinkerConfig::default(),
            text: TextProcessingConfig::default(),
            corpus: CorpusConfig::default(),
        }
    }
}

impl Settings {
    /// Parse and validate settings.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn language_configuration(&self) -> Result<LanguageConfiguration> {
        LanguageConfiguration::from_items(&self.languages)
    }

    pub fn validate(&self) -> Result<()> {
        self.language_configuration()?;

        let l = &self.linker;
        for (name, value) in [
            ("min_token_match_factor", l.min_token_match_factor),
            ("min_label_score", l.min_label_score),
            ("min_text_score", l.min_text_score),
            ("min_match_score", l.min_match_score),
            ("ranking_weight", l.ranking_weight),
            ("min_pos_score", self.text.min_pos_score),
            ("min_exclude_pos_score", self.text.exclude_pos_score()),
            ("min_phrase_score", self.text.min_phrase_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if l.min_token_match_factor == 0.0 {
            return Err(Error::Config(
                "min_token_match_factor must be greater than 0".into(),
            ));
        }

        for (name, value) in [
            ("max_suggestions", l.max_suggestions),
            ("min_found_tokens", l.min_found_tokens),
            ("max_search_tokens", l.max_search_tokens),
            ("lookup_limit", l.lookup_limit),
            ("max_redirect_depth", l.max_redirect_depth),
            ("corpus.threads", self.corpus.threads),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be at least 1")));
            }
        }

        if self.corpus.default_field.trim().is_empty() {
            return Err(Error::Config("corpus.default_field is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let s = Settings::from_json(r#"{"languages": ["en", "!de"]}"#).unwrap();
        assert_eq!(s.linker, LinkerConfig::default());
        assert_eq!(s.text, TextProcessingConfig::default());
        assert_eq!(s.corpus.threads, 1);
    }

    #[test]
    fn missing_language_list_fails_fast() {
        let err = Settings::from_json(r#"{"linker": {}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_language_list_fails_fast() {
        let err = Settings::from_json(r#"{"languages": []}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_language_item_fails() {
        assert!(Settings::from_json(r#"{"languages": ["en", "!en"]}"#).is_err());
    }

    #[test]
    fn out_of_range_score_fails() {
        let json = r#"{"languages": ["*"], "linker": {"min_label_score": 1.5}}"#;
        assert!(Settings::from_json(json).is_err());
    }

    #[test]
    fn zero_suggestions_fails() {
        let json = r#"{"languages": ["*"], "linker": {"max_suggestions": 0}}"#;
        assert!(Settings::from_json(json).is_err());
    }

    #[test]
    fn redirect_mode_names() {
        let json = r#"{"languages": ["*"], "linker": {"redirect_mode": "add_both", "ranking_merge": "multiply"}}"#;
        let s = Settings::from_json(json).unwrap();
        assert_eq!(s.linker.redirect_mode, RedirectProcessingMode::AddBoth);
        assert_eq!(s.linker.ranking_merge, RankingMerge::Multiply);
    }

    #[test]
    fn settings_json_roundtrip() {
        let mut s = Settings::default();
        s.linker.min_found_tokens = 2;
        s.text.allow_single_token_spans = true;
        let parsed = Settings::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn proper_noun_mode_replaces_linked_set() {
        let mut text = TextProcessingConfig::default();
        let proper = PosTag::new("NP").with_pos(Pos::ProperNoun);
        let common = PosTag::new("NN").with_pos(Pos::CommonNoun);
        assert!(text.linked_set().matches(&common));

        text.proper_nouns_only = true;
        assert!(text.linked_set().matches(&proper));
        assert!(!text.linked_set().matches(&common));
    }

    #[test]
    fn category_set_matches_tags() {
        let mut set = CategorySet::default();
        assert!(set.is_empty());
        set.tags.insert("NNP".into());
        assert!(set.matches(&PosTag::new("NNP")));
        assert!(!set.matches(&PosTag::new("NN")));
    }

    #[test]
    fn exclude_score_defaults_to_half() {
        let text = TextProcessingConfig::default();
        assert_eq!(text.exclude_pos_score(), 0.375);
    }

    #[test]
    fn type_mappings_cover_person_aliases() {
        let m = default_type_mappings();
        assert_eq!(
            m.get("http://xmlns.com/foaf/0.1/Person").map(String::as_str),
            Some(DBPEDIA_PERSON)
        );
    }
}
