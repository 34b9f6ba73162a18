use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    entity::Candidate,
    error::Result,
    label_tokenizer::LabelTokenizer,
    language::LanguageConfiguration,
    searcher::EntitySearcher,
};

type CacheKey = (Vec<String>, Option<String>);

/// Queries the searcher for entities whose labels share tokens with an
/// occurrence.
///
/// Results are cached for the lifetime of the lookup, which the linker
/// scopes to a single document.
pub struct CandidateLookup<'a> {
    searcher: &'a dyn EntitySearcher,
    tokenizer: &'a dyn LabelTokenizer,
    languages: &'a LanguageConfiguration,
    default_language: Option<&'a str>,
    limit: usize,
    cache: HashMap<CacheKey, Vec<Candidate>>,
}

impl<'a> CandidateLookup<'a> {
    pub fn new(
        searcher: &'a dyn EntitySearcher,
        tokenizer: &'a dyn LabelTokenizer,
        languages: &'a LanguageConfiguration,
        limit: usize,
    ) -> Self {
        Self {
            searcher,
            tokenizer,
            languages,
            default_language: None,
            limit,
            cache: HashMap::new(),
        }
    }

    /// Also search labels of `language` (untagged labels when `None`).
    pub fn with_default_language(mut self, language: Option<&'a str>) -> Self {
        self.default_language = language;
        self
    }

    /// Candidates for a free-text label.
    pub fn lookup(&mut self, label: &str, language: Option<&str>) -> Result<Vec<Candidate>> {
        let tokens = self.tokenizer.tokenize(label, language);
        self.lookup_tokens(tokens, language)
    }

    /// Candidates for the given occurrence words. Each word is passed
    /// through the label tokenizer first.
    pub fn lookup_words(
        &mut self,
        words: &[&str],
        language: Option<&str>,
    ) -> Result<Vec<Candidate>> {
        let tokens = words
            .iter()
            .flat_map(|w| self.tokenizer.tokenize(w, language))
            .collect();
        self.lookup_tokens(tokens, language)
    }

    fn lookup_tokens(
        &mut self,
        tokens: Vec<String>,
        language: Option<&str>,
    ) -> Result<Vec<Candidate>> {
        if !self.languages.is_language(language) {
            debug!("language {language:?} is not enabled, skipping lookup");
            return Ok(Vec::new());
        }
        if tokens.is_empty() || self.limit == 0 {
            return Ok(Vec::new());
        }

        let key = (tokens, language.map(str::to_string));
        if let Some(hit) = self.cache.get(&key) {
            trace!("lookup cache hit for {:?}", key.0);
            return Ok(hit.clone());
        }

        let mut candidates =
            self.searcher.find_by_label(&key.0, language, self.limit)?;
        if let Some(default) = self.default_language
            && language.is_none_or(|l| !l.eq_ignore_ascii_case(default))
        {
            let extra =
                self.searcher.find_by_label(&key.0, Some(default), self.limit)?;
            merge_candidates(&mut candidates, extra);
        }
        candidates.truncate(self.limit);

        debug!(
            "lookup {:?} ({}): {} candidates",
            key.0,
            language.unwrap_or("*"),
            candidates.len()
        );
        self.cache.insert(key, candidates.clone());
        Ok(candidates)
    }
}

impl std::fmt::Debug for CandidateLookup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateLookup")
            .field("limit", &self.limit)
            .field("default_language", &self.default_language)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Add `extra` to `candidates`, keeping the best score per entity, then
/// re-sort by score. Ties keep their original order.
fn merge_candidates(candidates: &mut Vec<Candidate>, extra: Vec<Candidate>) {
    for candidate in extra {
        match candidates
            .iter_mut()
            .find(|c| c.entity.id == candidate.entity.id)
        {
            Some(existing) => {
                if candidate.score > existing.score {
                    existing.score = candidate.score;
                }
            }
            None => candidates.push(candidate),
        }
    }
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
