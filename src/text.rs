//! Analysed text as produced by an external NLP pipeline.
//!
//! All offsets are byte offsets into [`AnalyzedText::text`] and must fall on
//! char boundaries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coarse lexical categories of a part-of-speech tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LexicalCategory {
    Noun,
    Verb,
    Adjective,
    Adposition,
    Adverb,
    Conjunction,
    Interjection,
    PronounOrDeterminer,
    Punctuation,
    Quantifier,
    Residual,
    Unique,
}

/// Fine-grained part-of-speech types. Each one belongs to exactly one
/// [`LexicalCategory`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Pos {
    ProperNoun,
    CommonNoun,
    Gerund,
    MainVerb,
    AuxiliaryVerb,
    ModalVerb,
    Adjective,
    Adverb,
    Preposition,
    Postposition,
    CoordinatingConjunction,
    SubordinatingConjunction,
    Article,
    Determiner,
    Pronoun,
    PersonalPronoun,
    PossessivePronoun,
    Numeral,
    CardinalNumber,
    OrdinalNumber,
    Interjection,
    Abbreviation,
    Acronym,
    Foreign,
    Symbol,
    Point,
    Comma,
    Hyphen,
    OpenBracket,
    CloseBracket,
    Quote,
    SecondaryPunctuation,
}

impl Pos {
    pub fn category(self) -> LexicalCategory {
        use LexicalCategory as C;
        match self {
            Pos::ProperNoun | Pos::CommonNoun => C::Noun,
            Pos::Gerund
            | Pos::MainVerb
            | Pos::AuxiliaryVerb
            | Pos::ModalVerb => C::Verb,
            Pos::Adjective => C::Adjective,
            Pos::Adverb => C::Adverb,
            Pos::Preposition | Pos::Postposition => C::Adposition,
            Pos::CoordinatingConjunction | Pos::SubordinatingConjunction => {
                C::Conjunction
            }
            Pos::Article
            | Pos::Determiner
            | Pos::Pronoun
            | Pos::PersonalPronoun
            | Pos::PossessivePronoun => C::PronounOrDeterminer,
            Pos::Numeral | Pos::CardinalNumber | Pos::OrdinalNumber => {
                C::Quantifier
            }
            Pos::Interjection => C::Interjection,
            Pos::Abbreviation | Pos::Acronym | Pos::Foreign | Pos::Symbol => {
                C::Residual
            }
            Pos::Point
            | Pos::Comma
            | Pos::Hyphen
            | Pos::OpenBracket
            | Pos::CloseBracket
            | Pos::Quote
            | Pos::SecondaryPunctuation => C::Punctuation,
        }
    }
}

/// One part-of-speech annotation of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosTag {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Pos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<LexicalCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl PosTag {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            pos: None,
            category: None,
            probability: None,
        }
    }

    pub fn with_pos(mut self, pos: Pos) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_category(mut self, category: LexicalCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    /// The explicit category plus the one implied by `pos`.
    pub fn categories(&self) -> impl Iterator<Item = LexicalCategory> + '_ {
        self.category
            .into_iter()
            .chain(self.pos.map(Pos::category))
    }
}

/// Phrase annotation of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseTag {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<LexicalCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub pos: Vec<PosTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
}

impl Token {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            pos: Vec::new(),
            lemma: None,
        }
    }

    pub fn tagged(start: usize, end: usize, tag: PosTag) -> Self {
        Self {
            start,
            end,
            pos: vec![tag],
            lemma: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<PhraseTag>,
}

/// A document with its sentence, chunk and token annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedText {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub sentences: Vec<Span>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl AnalyzedText {
    pub fn new(id: &str, text: &str, language: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            language: language.map(str::to_string),
            sentences: Vec::new(),
            chunks: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// Parse a document from JSON and validate its spans.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: AnalyzedText = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn add_sentence(&mut self, start: usize, end: usize) -> &mut Self {
        self.sentences.push(Span { start, end });
        self
    }

    pub fn add_chunk(
        &mut self,
        start: usize,
        end: usize,
        phrase: Option<PhraseTag>,
    ) -> &mut Self {
        self.chunks.push(Chunk { start, end, phrase });
        self
    }

    /// Add a token, keeping tokens ordered by start offset.
    pub fn add_token(&mut self, token: Token) -> &mut Self {
        let at = self.tokens.partition_point(|t| t.start <= token.start);
        self.tokens.insert(at, token);
        self
    }

    /// The text covered by `[start,end)`, or `""` when out of bounds.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.text.get(start..end).unwrap_or("")
    }

    pub fn token_text(&self, token: &Token) -> &str {
        self.slice(token.start, token.end)
    }

    /// Check that every span lies within the text and that tokens are
    /// ordered and non-overlapping.
    pub fn validate(&self) -> Result<()> {
        let check = |kind: &str, start: usize, end: usize| -> Result<()> {
            if start >= end
                || end > self.text.len()
                || !self.text.is_char_boundary(start)
                || !self.text.is_char_boundary(end)
            {
                return Err(Error::Document(format!(
                    "{kind} [{start},{end}) is not a valid span of document '{}'",
                    self.id
                )));
            }
            Ok(())
        };

        for s in &self.sentences {
            check("sentence", s.start, s.end)?;
        }
        for c in &self.chunks {
            check("chunk", c.start, c.end)?;
        }
        for t in &self.tokens {
            check("token", t.start, t.end)?;
        }
        for pair in self.tokens.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(Error::Document(format!(
                    "tokens [{},{}) and [{},{}) of document '{}' overlap or are out of order",
                    pair[0].start, pair[0].end, pair[1].start, pair[1].end, self.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_implies_category() {
        assert_eq!(Pos::ProperNoun.category(), LexicalCategory::Noun);
        assert_eq!(Pos::Preposition.category(), LexicalCategory::Adposition);
        assert_eq!(Pos::Point.category(), LexicalCategory::Punctuation);
        assert_eq!(Pos::Abbreviation.category(), LexicalCategory::Residual);
        assert_eq!(Pos::Numeral.category(), LexicalCategory::Quantifier);
    }

    #[test]
    fn tag_categories_include_explicit_and_implied() {
        let tag = PosTag::new("NP")
            .with_pos(Pos::ProperNoun)
            .with_category(LexicalCategory::Residual);
        let cats: Vec<_> = tag.categories().collect();
        assert_eq!(cats, vec![LexicalCategory::Residual, LexicalCategory::Noun]);
    }

    #[test]
    fn add_token_keeps_order() {
        let mut doc = AnalyzedText::new("d", "a b c", None);
        doc.add_token(Token::new(4, 5))
            .add_token(Token::new(0, 1))
            .add_token(Token::new(2, 3));
        let starts: Vec<_> = doc.tokens.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![0, 2, 4]);
        assert_eq!(doc.token_text(&doc.tokens[1]), "b");
    }

    #[test]
    fn validate_rejects_out_of_bounds() {
        let mut doc = AnalyzedText::new("d", "short", None);
        doc.add_token(Token::new(0, 10));
        assert!(matches!(doc.validate(), Err(Error::Document(_))));
    }

    #[test]
    fn validate_rejects_empty_span() {
        let mut doc = AnalyzedText::new("d", "short", None);
        doc.add_sentence(3, 3);
        assert!(doc.validate().is_err());
    }

    #[test]
    fn validate_rejects_overlapping_tokens() {
        let mut doc = AnalyzedText::new("d", "overlap", None);
        doc.tokens.push(Token::new(0, 4));
        doc.tokens.push(Token::new(2, 7));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn validate_rejects_split_characters() {
        let mut doc = AnalyzedText::new("d", "Zürich", None);
        doc.add_token(Token::new(0, 2));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn parse_from_json() {
        let json = r#"{
            "id": "doc-1",
            "text": "Paris is nice",
            "language": "en",
            "sentences": [{"start": 0, "end": 13}],
            "tokens": [
                {"start": 0, "end": 5, "pos": [{"tag": "NP", "pos": "ProperNoun", "probability": 0.9}]},
                {"start": 6, "end": 8, "pos": [{"tag": "V", "category": "Verb"}]},
                {"start": 9, "end": 13}
            ]
        }"#;
        let doc = AnalyzedText::from_json(json).unwrap();
        assert_eq!(doc.language.as_deref(), Some("en"));
        assert_eq!(doc.tokens.len(), 3);
        assert_eq!(doc.tokens[0].pos[0].pos, Some(Pos::ProperNoun));
        assert_eq!(doc.tokens[1].pos[0].probability, None);
        assert!(doc.tokens[2].pos.is_empty());
    }
}
