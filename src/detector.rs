//! Detection of linkable spans in analysed text.
//!
//! Every token is classified as *linkable* (worth a lookup on its own),
//! *matchable* (may be part of a label match) and *chunkable* (may connect
//! matchable tokens inside a phrase). Spans are then grown token by token
//! and closed at the first token that does not fit or at a sentence or
//! chunk boundary.

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    config::{CategorySet, TextProcessingConfig},
    language::base_language,
    text::{AnalyzedText, Chunk, PosTag, Span},
    text_util::{collapse_whitespace, context_window, has_alphanumeric, starts_upper_case},
};

/// Weight of a POS annotation that carries no probability.
pub const UNSCORED_POS_WEIGHT: f64 = 0.1;

/// Languages whose scripts have no letter case.
const UNICASE_LANGUAGES: &[&str] = &["ar", "fa", "he", "hi", "ja", "ko", "th", "ur", "zh"];

pub fn is_unicase_language(lang: Option<&str>) -> bool {
    lang.is_some_and(|l| {
        UNICASE_LANGUAGES.contains(&base_language(&l.to_lowercase()))
    })
}

/// One detected linkable span. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    pub start: usize,
    pub end: usize,
    pub selected_text: String,
    pub context: String,
    /// Indexes of the covered tokens.
    #[serde(skip)]
    pub tokens: Range<usize>,
}

impl Occurrence {
    /// The occurrence covering tokens `tokens` of `doc`. `tokens` must be a
    /// non-empty range of valid token indexes.
    pub fn from_tokens(
        doc: &AnalyzedText,
        tokens: Range<usize>,
        context_chars: usize,
    ) -> Self {
        let start = doc.tokens[tokens.start].start;
        let end = doc.tokens[tokens.end - 1].end;
        Self {
            start,
            end,
            selected_text: doc.slice(start, end).to_string(),
            context: context_of(doc, start, end, context_chars),
            tokens,
        }
    }
}

/// The enclosing sentence, or a window around the span.
fn context_of(doc: &AnalyzedText, start: usize, end: usize, chars: usize) -> String {
    doc.sentences
        .iter()
        .find(|s| s.start <= start && end <= s.end)
        .map(|s| collapse_whitespace(doc.slice(s.start, s.end)))
        .unwrap_or_else(|| context_window(&doc.text, start, end, chars))
}

/// Score of the annotations of `tags` that fall into `set`.
///
/// Unscored annotations weigh [`UNSCORED_POS_WEIGHT`]. When at least one
/// annotation has a probability the sum is normalised by
/// `max(1.0, total weight)`, otherwise it is returned as is.
pub fn pos_score(tags: &[PosTag], set: &CategorySet) -> f64 {
    let weight = |t: &PosTag| match t.probability {
        Some(p) if p.is_finite() => p.clamp(0.0, 1.0),
        Some(_) => 0.0,
        None => UNSCORED_POS_WEIGHT,
    };
    let total: f64 = tags.iter().map(weight).sum();
    let matched: f64 = tags.iter().filter(|t| set.matches(t)).map(weight).sum();
    if tags.iter().any(|t| t.probability.is_some()) {
        matched / total.max(1.0)
    } else {
        matched
    }
}

/// Whether `tags` place a token in `set`: `Some(true)` at or above `min`,
/// `Some(false)` below `min_exclude`, `None` when undecided or untagged.
///
/// Without any probability all annotations count equally and membership is
/// decided by presence alone.
pub fn pos_membership(
    tags: &[PosTag],
    set: &CategorySet,
    min: f64,
    min_exclude: f64,
) -> Option<bool> {
    if tags.is_empty() {
        return None;
    }
    if tags.iter().all(|t| t.probability.is_none()) {
        return Some(tags.iter().any(|t| set.matches(t)));
    }
    let score = pos_score(tags, set);
    if score >= min {
        Some(true)
    } else if score < min_exclude {
        Some(false)
    } else {
        None
    }
}

/// Classification of one token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenClass {
    pub linkable: bool,
    pub matchable: bool,
    pub chunkable: bool,
    pub upper_case: bool,
    pub sentence_start: bool,
    pub sentence: usize,
    /// Index into the processable (merged) chunks.
    pub chunk: Option<usize>,
}

#[derive(Debug)]
pub struct OccurrenceDetector<'a> {
    config: &'a TextProcessingConfig,
    linked: CategorySet,
}

impl<'a> OccurrenceDetector<'a> {
    pub fn new(config: &'a TextProcessingConfig) -> Self {
        Self {
            config,
            linked: config.linked_set(),
        }
    }

    fn is_processable(&self, chunk: &Chunk) -> bool {
        let Some(phrase) = &chunk.phrase else {
            return true;
        };
        let typed = phrase
            .category
            .is_some_and(|c| self.config.phrase_categories.contains(&c))
            || self.config.phrase_tags.contains(&phrase.tag);
        typed
            && phrase
                .probability
                .is_none_or(|p| p >= self.config.min_phrase_score)
    }

    /// Processable chunks ordered by start. Partly overlapping chunks are
    /// merged, fully covered ones dropped.
    pub fn processable_chunks(&self, doc: &AnalyzedText) -> Vec<Span> {
        if self.config.ignore_chunks {
            return Vec::new();
        }
        let mut chunks: Vec<&Chunk> =
            doc.chunks.iter().filter(|c| self.is_processable(c)).collect();
        chunks.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut merged: Vec<Span> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if let Some(last) = merged.last_mut()
                && chunk.start < last.end
            {
                if chunk.end > last.end {
                    debug!(
                        "merging overlapping chunks [{},{}) and [{},{})",
                        last.start, last.end, chunk.start, chunk.end
                    );
                    last.end = chunk.end;
                }
                continue;
            }
            merged.push(Span {
                start: chunk.start,
                end: chunk.end,
            });
        }
        merged
    }

    /// Classify every token of `doc`.
    pub fn classify(&self, doc: &AnalyzedText) -> Vec<TokenClass> {
        let cfg = self.config;
        let min = cfg.min_pos_score;
        let min_exclude = cfg.exclude_pos_score();
        let unicase = is_unicase_language(doc.language.as_deref());
        let chunks = self.processable_chunks(doc);

        let mut sentence_starts: Vec<usize> =
            doc.sentences.iter().map(|s| s.start).collect();
        sentence_starts.sort_unstable();

        let mut classes: Vec<TokenClass> = Vec::with_capacity(doc.tokens.len());
        for (i, token) in doc.tokens.iter().enumerate() {
            let text = doc.token_text(token);
            let sentence = sentence_starts.partition_point(|&s| s <= token.start);
            let sentence_start = i == 0 || classes[i - 1].sentence != sentence;
            let chunk = {
                let idx = chunks.partition_point(|c| c.start <= token.start);
                idx.checked_sub(1)
                    .filter(|&c| token.start < chunks[c].end)
            };

            let mut class = TokenClass {
                upper_case: starts_upper_case(text),
                sentence_start,
                sentence,
                chunk,
                chunkable: pos_membership(&token.pos, &cfg.chunkable, min, min_exclude)
                    == Some(true),
                ..TokenClass::default()
            };

            if has_alphanumeric(text) {
                let linkable_pos =
                    pos_membership(&token.pos, &self.linked, min, min_exclude);
                let matchable_pos =
                    pos_membership(&token.pos, &cfg.matched, min, min_exclude);
                class.linkable = linkable_pos == Some(true);
                class.matchable = class.linkable || matchable_pos == Some(true);

                let cased_upper = class.upper_case && !sentence_start && !unicase;
                if !class.linkable && cased_upper {
                    if cfg.link_upper_case && class.matchable {
                        class.linkable = true;
                    } else if cfg.link_upper_case || cfg.match_upper_case {
                        class.matchable = true;
                    }
                }

                if !class.linkable
                    && (linkable_pos.is_none() || matchable_pos.is_none())
                {
                    let searchable =
                        text.chars().count() >= cfg.min_search_token_length;
                    if unicase || !cfg.link_only_upper_case_with_unknown_pos {
                        if linkable_pos.is_none() && searchable {
                            class.linkable = true;
                            class.matchable = true;
                        }
                    } else if cased_upper {
                        if searchable && linkable_pos.is_none() {
                            class.linkable = true;
                            class.matchable = true;
                        } else if matchable_pos.is_none() {
                            class.matchable = true;
                        }
                    }
                }
            }

            trace!(
                "token {i} '{text}': linkable={} matchable={} chunkable={} chunk={:?}",
                class.linkable, class.matchable, class.chunkable, class.chunk
            );
            classes.push(class);
        }

        if cfg.link_multi_matchable_in_chunk {
            for c in 0..chunks.len() {
                let members: Vec<usize> = (0..classes.len())
                    .filter(|&i| classes[i].chunk == Some(c))
                    .collect();
                let has_linkable = members.iter().any(|&i| classes[i].linkable);
                let matchable = members.iter().filter(|&&i| classes[i].matchable).count();
                if !has_linkable && matchable > 1 {
                    debug!("chunk {c}: {matchable} matchable tokens become linkable");
                    for &i in &members {
                        if classes[i].matchable {
                            classes[i].linkable = true;
                        }
                    }
                }
            }
        }

        classes
    }

    /// Ordered, non-overlapping occurrences of `doc`.
    pub fn detect(&self, doc: &AnalyzedText) -> Vec<Occurrence> {
        self.detect_classified(doc, &self.classify(doc))
    }

    /// Like [`detect`](Self::detect), for tokens already classified by
    /// [`classify`](Self::classify).
    pub fn detect_classified(
        &self,
        doc: &AnalyzedText,
        classes: &[TokenClass],
    ) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();
        let mut current: Option<Range<usize>> = None;

        for (i, class) in classes.iter().enumerate() {
            if let Some(span) = current.as_mut() {
                let open = &classes[span.start];
                let same_region =
                    class.sentence == open.sentence && class.chunk == open.chunk;
                let continues = same_region
                    && (class.matchable || (class.chunk.is_some() && class.chunkable));
                if continues {
                    span.end = i + 1;
                    continue;
                }
                if let Some(span) = current.take() {
                    self.close(doc, classes, span, &mut occurrences);
                }
            }
            if class.matchable {
                current = Some(i..i + 1);
            }
        }
        if let Some(span) = current {
            self.close(doc, classes, span, &mut occurrences);
        }

        debug!(
            "document '{}': {} occurrences in {} tokens",
            doc.id,
            occurrences.len(),
            doc.tokens.len()
        );
        occurrences
    }

    fn close(
        &self,
        doc: &AnalyzedText,
        classes: &[TokenClass],
        mut span: Range<usize>,
        out: &mut Vec<Occurrence>,
    ) {
        // Spans always start on a matchable token, so trimming stops there.
        while span.end > span.start + 1 && !classes[span.end - 1].matchable {
            span.end -= 1;
        }
        if !classes[span.clone()].iter().any(|c| c.linkable) {
            return;
        }
        if span.len() == 1 && !self.config.allow_single_token_spans {
            trace!("dropping single token span at token {}", span.start);
            return;
        }
        out.push(Occurrence::from_tokens(doc, span, self.config.context_chars));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{LexicalCategory, PhraseTag, Pos, Token};

    fn tag(pos: Pos, prob: Option<f64>) -> PosTag {
        let t = PosTag::new("X").with_pos(pos);
        match prob {
            Some(p) => t.with_probability(p),
            None => t,
        }
    }

    fn noun_phrase() -> Option<PhraseTag> {
        Some(PhraseTag {
            tag: "NP".into(),
            category: Some(LexicalCategory::Noun),
            probability: Some(1.0),
        })
    }

    /// Tokenise `text` on spaces, tagging each word with the given POS.
    fn doc(text: &str, pos: &[Option<Pos>]) -> AnalyzedText {
        let mut d = AnalyzedText::new("t", text, Some("en"));
        d.add_sentence(0, text.len());
        let mut offset = 0;
        for (word, p) in text.split(' ').zip(pos) {
            let start = offset;
            let end = start + word.len();
            offset = end + 1;
            let mut token = Token::new(start, end);
            if let Some(p) = p {
                token.pos.push(tag(*p, Some(1.0)));
            }
            d.add_token(token);
        }
        d
    }

    #[test]
    fn unscored_tags_are_not_normalised() {
        let set = CategorySet::new(&[LexicalCategory::Noun], &[]);
        let tags = vec![tag(Pos::CommonNoun, None), tag(Pos::MainVerb, None)];
        assert!((pos_score(&tags, &set) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn scored_tags_are_normalised_by_total() {
        let set = CategorySet::new(&[LexicalCategory::Noun], &[]);
        let tags = vec![tag(Pos::CommonNoun, Some(0.9)), tag(Pos::MainVerb, Some(0.6))];
        assert!((pos_score(&tags, &set) - 0.6).abs() < 1e-9);

        // A total below 1.0 is not inflated.
        let tags = vec![tag(Pos::CommonNoun, Some(0.5))];
        assert!((pos_score(&tags, &set) - 0.5).abs() < 1e-9);

        // Mixed: unscored annotations add the fallback weight.
        let tags = vec![tag(Pos::CommonNoun, Some(1.0)), tag(Pos::MainVerb, None)];
        assert!((pos_score(&tags, &set) - 1.0 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn membership_thresholds() {
        let set = CategorySet::new(&[LexicalCategory::Noun], &[]);
        assert_eq!(pos_membership(&[], &set, 0.75, 0.375), None);
        assert_eq!(
            pos_membership(&[tag(Pos::CommonNoun, Some(0.8))], &set, 0.75, 0.375),
            Some(true)
        );
        assert_eq!(
            pos_membership(&[tag(Pos::CommonNoun, Some(0.5))], &set, 0.75, 0.375),
            None
        );
        assert_eq!(
            pos_membership(&[tag(Pos::CommonNoun, Some(0.2))], &set, 0.75, 0.375),
            Some(false)
        );
    }

    #[test]
    fn unscored_membership_ignores_threshold() {
        let set = CategorySet::new(&[LexicalCategory::Noun], &[]);
        let noun = [tag(Pos::CommonNoun, None)];
        let verb = [tag(Pos::MainVerb, None)];
        assert_eq!(pos_membership(&noun, &set, 1.0, 0.5), Some(true));
        assert_eq!(pos_membership(&verb, &set, 1.0, 0.5), Some(false));
    }

    #[test]
    fn min_pos_score_one_without_scores_does_not_crash() {
        let text = "Hans Meier visited Gustav Klimt";
        let mut d = AnalyzedText::new("t", text, Some("en"));
        d.add_sentence(0, text.len());
        let words = [
            (0, 4, Pos::ProperNoun),
            (5, 10, Pos::ProperNoun),
            (11, 18, Pos::MainVerb),
            (19, 25, Pos::ProperNoun),
            (26, 31, Pos::ProperNoun),
        ];
        for (s, e, p) in words {
            d.add_token(Token::tagged(s, e, tag(p, None)));
        }

        let config = TextProcessingConfig {
            min_pos_score: 1.0,
            ..TextProcessingConfig::default()
        };
        let found = OccurrenceDetector::new(&config).detect(&d);
        let texts: Vec<_> = found.iter().map(|o| o.selected_text.as_str()).collect();
        assert_eq!(texts, vec!["Hans Meier", "Gustav Klimt"]);
    }

    #[test]
    fn single_token_spans_are_dropped_by_default() {
        let d = doc("geologist", &[Some(Pos::CommonNoun)]);
        let config = TextProcessingConfig::default();
        assert!(OccurrenceDetector::new(&config).detect(&d).is_empty());

        let config = TextProcessingConfig {
            allow_single_token_spans: true,
            ..TextProcessingConfig::default()
        };
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "geologist");
        assert_eq!((found[0].start, found[0].end), (0, 9));
    }

    #[test]
    fn spans_close_on_mismatch() {
        let d = doc(
            "Barack Obama met Angela Merkel",
            &[
                Some(Pos::ProperNoun),
                Some(Pos::ProperNoun),
                Some(Pos::MainVerb),
                Some(Pos::ProperNoun),
                Some(Pos::ProperNoun),
            ],
        );
        let config = TextProcessingConfig::default();
        let found = OccurrenceDetector::new(&config).detect(&d);
        let texts: Vec<_> = found.iter().map(|o| o.selected_text.as_str()).collect();
        assert_eq!(texts, vec!["Barack Obama", "Angela Merkel"]);
        assert_eq!(found[1].tokens, 3..5);
        assert_eq!(found[0].context, "Barack Obama met Angela Merkel");
    }

    #[test]
    fn connectors_continue_only_inside_chunks() {
        let pos = [
            Some(Pos::CommonNoun),
            Some(Pos::Preposition),
            Some(Pos::ProperNoun),
        ];
        let text = "University of Otago";
        let d = doc(text, &pos);
        let config = TextProcessingConfig {
            allow_single_token_spans: true,
            ..TextProcessingConfig::default()
        };
        let detector = OccurrenceDetector::new(&config);
        let texts: Vec<_> = detector
            .detect(&d)
            .into_iter()
            .map(|o| o.selected_text)
            .collect();
        assert_eq!(texts, vec!["University", "Otago"]);

        let mut chunked = doc(text, &pos);
        chunked.add_chunk(0, text.len(), noun_phrase());
        let found = detector.detect(&chunked);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "University of Otago");
    }

    #[test]
    fn trailing_connectors_are_trimmed() {
        let text = "Bank of";
        let mut d = doc(text, &[Some(Pos::ProperNoun), Some(Pos::Preposition)]);
        d.add_chunk(0, text.len(), noun_phrase());
        let config = TextProcessingConfig {
            allow_single_token_spans: true,
            ..TextProcessingConfig::default()
        };
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "Bank");
    }

    #[test]
    fn chunk_boundary_closes_span() {
        let text = "New Zealand Otago";
        let mut d = doc(
            text,
            &[Some(Pos::CommonNoun), Some(Pos::ProperNoun), Some(Pos::ProperNoun)],
        );
        d.add_chunk(0, 11, noun_phrase());
        let config = TextProcessingConfig {
            allow_single_token_spans: true,
            ..TextProcessingConfig::default()
        };
        let found = OccurrenceDetector::new(&config).detect(&d);
        let texts: Vec<_> = found.iter().map(|o| o.selected_text.as_str()).collect();
        assert_eq!(texts, vec!["New Zealand", "Otago"]);
    }

    #[test]
    fn sentence_boundary_closes_span() {
        let text = "Otago Dunedin";
        let mut d = AnalyzedText::new("t", text, Some("en"));
        d.add_sentence(0, 5).add_sentence(6, 13);
        d.add_token(Token::tagged(0, 5, tag(Pos::ProperNoun, Some(1.0))));
        d.add_token(Token::tagged(6, 13, tag(Pos::ProperNoun, Some(1.0))));
        let config = TextProcessingConfig {
            allow_single_token_spans: true,
            ..TextProcessingConfig::default()
        };
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].context, "Dunedin");
    }

    #[test]
    fn spans_need_a_linkable_token() {
        // Numerals are matchable but not linkable.
        let d = doc("1869 1950", &[Some(Pos::Numeral), Some(Pos::Numeral)]);
        let config = TextProcessingConfig::default();
        assert!(OccurrenceDetector::new(&config).detect(&d).is_empty());
    }

    #[test]
    fn proper_nouns_only_skips_common_nouns() {
        let d = doc(
            "the geologist Patrick Marshall",
            &[
                Some(Pos::Article),
                Some(Pos::CommonNoun),
                Some(Pos::ProperNoun),
                Some(Pos::ProperNoun),
            ],
        );
        let config = TextProcessingConfig {
            proper_nouns_only: true,
            ..TextProcessingConfig::default()
        };
        let classes = OccurrenceDetector::new(&config).classify(&d);
        assert!(!classes[1].linkable);
        assert!(classes[1].matchable);
        assert!(classes[2].linkable);
        // "geologist" stays matchable, so it may lead the span.
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "geologist Patrick Marshall");
    }

    #[test]
    fn punctuation_is_never_linkable() {
        let text = "Otago .";
        let mut d = AnalyzedText::new("t", text, None);
        d.add_token(Token::tagged(0, 5, tag(Pos::ProperNoun, Some(1.0))));
        // Mis-tagged punctuation must not become matchable.
        d.add_token(Token::tagged(6, 7, tag(Pos::ProperNoun, Some(1.0))));
        let config = TextProcessingConfig::default();
        let classes = OccurrenceDetector::new(&config).classify(&d);
        assert!(classes[0].linkable);
        assert!(!classes[1].linkable && !classes[1].matchable);
    }

    #[test]
    fn unknown_pos_upper_case_tokens() {
        let text = "Yesterday we met Hildegard in town";
        let mut d = AnalyzedText::new("t", text, Some("en"));
        d.add_sentence(0, text.len());
        let mut offset = 0;
        for word in text.split(' ') {
            d.add_token(Token::new(offset, offset + word.len()));
            offset += word.len() + 1;
        }
        let config = TextProcessingConfig {
            allow_single_token_spans: true,
            ..TextProcessingConfig::default()
        };
        let detector = OccurrenceDetector::new(&config);
        let classes = detector.classify(&d);
        // Sentence start is not treated as upper case evidence.
        assert!(!classes[0].linkable);
        assert!(classes[3].linkable);
        assert!(!classes[5].linkable);

        let found = detector.detect(&d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "Hildegard");

        // Without the upper case restriction every searchable word links.
        let config = TextProcessingConfig {
            link_only_upper_case_with_unknown_pos: false,
            ..config
        };
        let classes = OccurrenceDetector::new(&config).classify(&d);
        assert!(classes[0].linkable);
        assert!(!classes[1].linkable, "too short");
        assert!(classes[5].linkable);
    }

    #[test]
    fn upper_case_rules_do_not_apply_to_unicase_languages() {
        assert!(is_unicase_language(Some("zh-CN")));
        assert!(!is_unicase_language(Some("en")));
        assert!(!is_unicase_language(None));
    }

    #[test]
    fn link_upper_case_promotes_matchable_tokens() {
        // An upper case numeral-like token inside a sentence.
        let text = "in Apollo 11";
        let mut d = AnalyzedText::new("t", text, Some("en"));
        d.add_sentence(0, text.len());
        d.add_token(Token::tagged(0, 2, tag(Pos::Preposition, Some(1.0))));
        d.add_token(Token::tagged(3, 9, tag(Pos::Gerund, Some(1.0))));
        d.add_token(Token::tagged(10, 12, tag(Pos::Numeral, Some(1.0))));

        let config = TextProcessingConfig::default();
        assert!(OccurrenceDetector::new(&config).detect(&d).is_empty());

        let config = TextProcessingConfig {
            link_upper_case: true,
            ..TextProcessingConfig::default()
        };
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "Apollo 11");
    }

    #[test]
    fn multi_matchable_chunks_become_linkable() {
        let text = "1 2 3";
        let mut d = doc(text, &[Some(Pos::Numeral), Some(Pos::Numeral), Some(Pos::Numeral)]);
        d.add_chunk(0, text.len(), noun_phrase());
        let config = TextProcessingConfig::default();
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].selected_text, "1 2 3");

        let config = TextProcessingConfig {
            link_multi_matchable_in_chunk: false,
            ..TextProcessingConfig::default()
        };
        assert!(OccurrenceDetector::new(&config).detect(&d).is_empty());
    }

    #[test]
    fn overlapping_chunks_merge() {
        let mut d = AnalyzedText::new("t", "a b c d e", None);
        d.add_chunk(0, 3, None)
            .add_chunk(2, 7, None)
            .add_chunk(4, 5, None)
            .add_chunk(8, 9, None);
        let config = TextProcessingConfig::default();
        let chunks = OccurrenceDetector::new(&config).processable_chunks(&d);
        assert_eq!(
            chunks,
            vec![Span { start: 0, end: 7 }, Span { start: 8, end: 9 }]
        );
    }

    #[test]
    fn unprocessable_chunks_are_ignored() {
        let mut d = AnalyzedText::new("t", "a b", None);
        d.add_chunk(
            0,
            3,
            Some(PhraseTag {
                tag: "VP".into(),
                category: Some(LexicalCategory::Verb),
                probability: None,
            }),
        );
        d.add_chunk(
            0,
            1,
            Some(PhraseTag {
                tag: "NP".into(),
                category: Some(LexicalCategory::Noun),
                probability: Some(0.2),
            }),
        );
        let config = TextProcessingConfig::default();
        assert!(OccurrenceDetector::new(&config).processable_chunks(&d).is_empty());

        let config = TextProcessingConfig {
            ignore_chunks: true,
            ..TextProcessingConfig::default()
        };
        d.add_chunk(2, 3, None);
        assert!(OccurrenceDetector::new(&config).processable_chunks(&d).is_empty());
    }

    #[test]
    fn occurrences_are_in_bounds_and_ordered() {
        let d = doc(
            "Rome Paris and Berlin Vienna",
            &[
                Some(Pos::ProperNoun),
                Some(Pos::ProperNoun),
                Some(Pos::CoordinatingConjunction),
                Some(Pos::ProperNoun),
                Some(Pos::ProperNoun),
            ],
        );
        let config = TextProcessingConfig::default();
        let found = OccurrenceDetector::new(&config).detect(&d);
        assert_eq!(found.len(), 2);
        let mut last_end = 0;
        for o in &found {
            assert!(o.start < o.end && o.end <= d.text.len());
            assert!(o.start >= last_end);
            last_end = o.end;
        }
    }
}
