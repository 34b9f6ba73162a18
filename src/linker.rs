//! The linking pipeline for one document.
//!
//! Occurrences are detected once; each one is then looked up, its
//! candidates are resolved through redirects and ranked. Occurrences with
//! the same text are finally merged into one [`LinkedEntity`].

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::Settings,
    detector::{Occurrence, OccurrenceDetector, TokenClass},
    error::{Error, Result},
    label_tokenizer::{LabelTokenizer, SimpleLabelTokenizer},
    language::LanguageConfiguration,
    lookup::CandidateLookup,
    ranker::{
        EntityRanking, MatchToken, RankingProvider, Suggestion, SuggestionRanker,
        sort_by_score, truncate_suggestions,
    },
    redirect::{RedirectResolver, Resolved},
    searcher::EntitySearcher,
    text::AnalyzedText,
};

/// Steps of a linking run, in order. Lookup, redirect resolution and
/// ranking repeat for every occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    DetectOccurrences,
    Lookup,
    ResolveRedirects,
    Rank,
    Merge,
    Done,
}

/// An occurrence with its ranked suggestions, before merging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedOccurrence {
    pub occurrence: Occurrence,
    pub suggestions: Vec<Suggestion>,
}

/// All occurrences of one surface text with their merged suggestions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedEntity {
    pub selected_text: String,
    pub occurrences: Vec<Occurrence>,
    pub suggestions: Vec<Suggestion>,
    pub score: f64,
    pub types: BTreeSet<String>,
    pub dc_types: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkingResult {
    pub document: String,
    pub language: Option<String>,
    pub linked_entities: Vec<LinkedEntity>,
}

impl LinkingResult {
    pub fn is_empty(&self) -> bool {
        self.linked_entities.is_empty()
    }

    /// The linked entity for `selected_text`, if any.
    pub fn get(&self, selected_text: &str) -> Option<&LinkedEntity> {
        self.linked_entities
            .iter()
            .find(|e| e.selected_text == selected_text)
    }
}

/// Bookkeeping of a single run, logging every phase transition.
struct Run<'d> {
    document: &'d str,
    phase: Phase,
}

impl<'d> Run<'d> {
    fn new(document: &'d str) -> Self {
        Self {
            document,
            phase: Phase::Init,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(document = self.document, from = ?self.phase, to = ?phase, "linking phase");
        self.phase = phase;
    }
}

/// Links analysed documents against a knowledge base.
///
/// The linker only reads its collaborators, so one instance can serve many
/// documents concurrently.
pub struct EntityLinker<'a> {
    searcher: &'a dyn EntitySearcher,
    settings: Settings,
    languages: LanguageConfiguration,
    tokenizer: Box<dyn LabelTokenizer>,
    ranking: Box<dyn RankingProvider>,
}

impl<'a> EntityLinker<'a> {
    /// Create a linker. Fails when `settings` are invalid.
    pub fn new(searcher: &'a dyn EntitySearcher, settings: Settings) -> Result<Self> {
        settings.validate()?;
        let languages = settings.language_configuration()?;
        Ok(Self {
            searcher,
            settings,
            languages,
            tokenizer: Box::new(SimpleLabelTokenizer),
            ranking: Box::new(EntityRanking),
        })
    }

    pub fn with_tokenizer(mut self, tokenizer: impl LabelTokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    pub fn with_ranking(mut self, ranking: impl RankingProvider + 'static) -> Self {
        self.ranking = Box::new(ranking);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Link one document.
    ///
    /// Documents in a language that is not enabled yield an empty result.
    /// A failing lookup aborts the run with [`Error::Linking`].
    pub fn link(&self, doc: &AnalyzedText) -> Result<LinkingResult> {
        let mut run = Run::new(&doc.id);
        doc.validate()?;
        let language = doc.language.as_deref();
        let mut result = LinkingResult {
            document: doc.id.clone(),
            language: doc.language.clone(),
            linked_entities: Vec::new(),
        };

        if !self.languages.is_language(language) {
            info!(
                "document '{}': language {} is not enabled, nothing to link",
                doc.id,
                language.unwrap_or("<none>")
            );
            run.enter(Phase::Done);
            return Ok(result);
        }

        run.enter(Phase::DetectOccurrences);
        let detector = OccurrenceDetector::new(&self.settings.text);
        let classes = detector.classify(doc);
        let occurrences = detector.detect_classified(doc, &classes);

        let linker = &self.settings.linker;
        let mut lookup = CandidateLookup::new(
            self.searcher,
            self.tokenizer.as_ref(),
            &self.languages,
            linker.lookup_limit,
        )
        .with_default_language(linker.default_language.as_deref());
        let resolver = RedirectResolver::new(
            self.searcher,
            linker.redirect_mode,
            linker.max_redirect_depth,
        );
        let ranker = SuggestionRanker::new(linker, self.tokenizer.as_ref(), self.ranking.as_ref());

        let mut linked = Vec::new();
        for occurrence in occurrences {
            let fail = |source: Error| Error::Linking {
                document: doc.id.clone(),
                selected_text: occurrence.selected_text.clone(),
                start: occurrence.start,
                end: occurrence.end,
                source: Box::new(source),
            };
            let match_tokens = self.match_tokens(doc, &classes, &occurrence);

            let mut suggestions = Vec::new();
            let searches = self.search_words(doc, &classes, &occurrence);
            for (attempt, words) in searches.iter().enumerate() {
                run.enter(Phase::Lookup);
                let candidates = lookup.lookup_words(words, language).map_err(fail)?;
                if candidates.is_empty() {
                    break;
                }

                run.enter(Phase::ResolveRedirects);
                let mut resolved: Vec<Resolved> = Vec::with_capacity(candidates.len());
                for candidate in &candidates {
                    resolved.extend(resolver.resolve(candidate).map_err(fail)?);
                }

                run.enter(Phase::Rank);
                suggestions = ranker.rank(&match_tokens, &resolved, language);
                if !suggestions.is_empty() {
                    break;
                }
                if attempt + 1 < searches.len() {
                    debug!(
                        "'{}': {} candidates but no match, retrying with the first linkable token",
                        occurrence.selected_text,
                        candidates.len()
                    );
                }
            }

            let Some(top) = suggestions.first() else {
                continue;
            };
            let first = occurrence.tokens.start;
            let narrowed = Occurrence::from_tokens(
                doc,
                first + top.covered.start..first + top.covered.end,
                self.settings.text.context_chars,
            );
            linked.push(LinkedOccurrence {
                occurrence: narrowed,
                suggestions,
            });
        }

        run.enter(Phase::Merge);
        result.linked_entities = self.merge(linked);
        run.enter(Phase::Done);
        info!(
            "document '{}': {} linked entities",
            doc.id,
            result.linked_entities.len()
        );
        Ok(result)
    }

    fn word<'d>(&self, doc: &'d AnalyzedText, index: usize) -> &'d str {
        let token = &doc.tokens[index];
        match &token.lemma {
            Some(lemma) if self.settings.linker.lemma_matching => lemma,
            _ => doc.token_text(token),
        }
    }

    fn match_tokens(
        &self,
        doc: &AnalyzedText,
        classes: &[TokenClass],
        occurrence: &Occurrence,
    ) -> Vec<MatchToken> {
        occurrence
            .tokens
            .clone()
            .map(|i| MatchToken::new(self.word(doc, i), classes[i].matchable))
            .collect()
    }

    /// The word lists to look up, in order: matchable tokens from the first
    /// linkable one on, then the first linkable token alone.
    fn search_words<'d>(
        &self,
        doc: &'d AnalyzedText,
        classes: &[TokenClass],
        occurrence: &Occurrence,
    ) -> Vec<Vec<&'d str>> {
        let Some(first) = occurrence.tokens.clone().find(|&i| classes[i].linkable) else {
            return Vec::new();
        };
        let window: Vec<&str> = (first..occurrence.tokens.end)
            .filter(|&i| classes[i].matchable)
            .take(self.settings.linker.max_search_tokens)
            .map(|i| self.word(doc, i))
            .collect();
        let mut searches = vec![window];
        if searches[0].len() > 1 {
            searches.push(vec![self.word(doc, first)]);
        }
        searches
    }

    /// Group linked occurrences by selected text.
    fn merge(&self, linked: Vec<LinkedOccurrence>) -> Vec<LinkedEntity> {
        let cfg = &self.settings.linker;
        let mut entities: Vec<LinkedEntity> = Vec::new();
        let mut by_text: HashMap<String, usize> = HashMap::new();

        for LinkedOccurrence {
            occurrence,
            suggestions,
        } in linked
        {
            let idx = *by_text
                .entry(occurrence.selected_text.clone())
                .or_insert_with(|| {
                    entities.push(LinkedEntity {
                        selected_text: occurrence.selected_text.clone(),
                        occurrences: Vec::new(),
                        suggestions: Vec::new(),
                        score: 0.0,
                        types: BTreeSet::new(),
                        dc_types: BTreeSet::new(),
                    });
                    entities.len() - 1
                });
            let entity = &mut entities[idx];
            entity.occurrences.push(occurrence);
            for suggestion in suggestions {
                match entity
                    .suggestions
                    .iter_mut()
                    .find(|s| s.entity.id == suggestion.entity.id)
                {
                    Some(existing) if existing.score < suggestion.score => {
                        *existing = suggestion;
                    }
                    Some(_) => {}
                    None => entity.suggestions.push(suggestion),
                }
            }
        }

        for entity in &mut entities {
            sort_by_score(&mut entity.suggestions);
            truncate_suggestions(
                &mut entity.suggestions,
                cfg.max_suggestions,
                cfg.include_similar_score,
            );
            entity.score = entity.suggestions.first().map_or(0.0, |s| s.score);
            entity.types = entity
                .suggestions
                .iter()
                .flat_map(|s| s.entity.types.iter().cloned())
                .collect();
            entity.dc_types = entity
                .types
                .iter()
                .filter_map(|t| cfg.type_mappings.get(t).cloned())
                .collect();
            if entity.dc_types.is_empty()
                && let Some(default) = &cfg.default_dc_type
            {
                entity.dc_types.insert(default.clone());
            }
        }
        entities
    }
}

impl std::fmt::Debug for EntityLinker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityLinker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
