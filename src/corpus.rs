//! In-memory label corpora, one per (language, label field).
//!
//! Corpora are built from a [`LabelSource`] on a dedicated worker pool and
//! answer label lookups without touching the backing index; only the final
//! dereferencing of entity ids goes back to the source.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    entity::{Candidate, Entity},
    error::{Error, Result},
    label_tokenizer::{LabelTokenizer, SimpleLabelTokenizer},
    language::{LanguageConfiguration, base_language},
    searcher::{EntitySearcher, LabelSource},
};

/// Identifies one corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorpusSpec {
    /// `None` holds labels without a language tag.
    pub language: Option<String>,
    pub field: String,
}

impl CorpusSpec {
    pub fn new(language: Option<&str>, field: &str) -> Self {
        Self {
            language: language.map(str::to_lowercase),
            field: field.to_string(),
        }
    }

    /// One spec per explicitly included language (its `field` parameter or
    /// `default_field`) plus, for the wildcard, one for untagged labels.
    pub fn from_languages(
        conf: &LanguageConfiguration,
        default_field: &str,
    ) -> Vec<CorpusSpec> {
        let mut specs = BTreeSet::new();
        for (lang, params) in conf.included_languages() {
            let field = params
                .get("field")
                .map(String::as_str)
                .unwrap_or(default_field);
            specs.insert(CorpusSpec::new(Some(lang), field));
        }
        if conf.is_wildcard() {
            let field = conf
                .default_parameters()
                .and_then(|p| p.get("field"))
                .map(String::as_str)
                .unwrap_or(default_field);
            specs.insert(CorpusSpec::new(None, field));
        }
        specs.into_iter().collect()
    }

    fn serves(&self, language: Option<&str>) -> bool {
        match (self.language.as_deref(), language) {
            (_, None) | (None, _) => true,
            (Some(own), Some(query)) => {
                let query = query.to_lowercase();
                own == query || own == base_language(&query)
            }
        }
    }
}

impl std::fmt::Display for CorpusSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            self.field,
            self.language.as_deref().unwrap_or("*")
        )
    }
}

#[derive(Debug, Clone)]
struct CorpusEntry {
    id: String,
}

/// An inverted index from normalised label tokens to labels.
#[derive(Debug, Clone)]
pub struct LabelCorpus {
    entries: Vec<CorpusEntry>,
    postings: HashMap<String, Vec<usize>>,
}

fn normalise(text: &str) -> Vec<String> {
    SimpleLabelTokenizer
        .tokenize(text, None)
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect()
}

impl LabelCorpus {
    /// Build a corpus from `(entity id, label)` pairs. Returns `None` when
    /// there is nothing to index.
    pub fn build(labels: Vec<(String, String)>) -> Option<Self> {
        let mut entries = Vec::new();
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();

        for (id, label) in labels {
            let tokens: BTreeSet<String> = normalise(&label).into_iter().collect();
            if tokens.is_empty() {
                continue;
            }
            let idx = entries.len();
            entries.push(CorpusEntry { id });
            for token in tokens {
                postings.entry(token).or_default().push(idx);
            }
        }

        (!entries.is_empty()).then_some(Self { entries, postings })
    }

    /// Number of indexed labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct tokens.
    pub fn terms(&self) -> usize {
        self.postings.len()
    }

    /// `(entity id, score)` for labels sharing tokens with `terms`, in
    /// label order. One entry per label, not per entity.
    fn matches(&self, terms: &HashSet<String>) -> Vec<(&str, f32)> {
        let mut hits: BTreeMap<usize, usize> = BTreeMap::new();
        for term in terms {
            if let Some(postings) = self.postings.get(term) {
                for &idx in postings {
                    *hits.entry(idx).or_default() += 1;
                }
            }
        }
        hits.into_iter()
            .map(|(idx, n)| {
                (self.entries[idx].id.as_str(), n as f32 / terms.len() as f32)
            })
            .collect()
    }
}

/// Serves lookups from label corpora and dereferences hits through the
/// wrapped searcher.
pub struct CorpusSearcher<S> {
    source: S,
    corpora: BTreeMap<CorpusSpec, LabelCorpus>,
}

impl<S> CorpusSearcher<S>
where
    S: EntitySearcher + LabelSource,
{
    /// Build one corpus per spec on a pool of `threads` workers and wait for
    /// all of them. Empty sources yield no corpus; failed builds are logged
    /// and skipped.
    pub fn build(source: S, specs: &[CorpusSpec], threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("corpus-{i}"))
            .build()
            .map_err(|e| {
                Error::Config(format!("cannot create corpus worker pool: {e}"))
            })?;

        let built: Vec<(CorpusSpec, LabelCorpus)> = pool.install(|| {
            specs
                .par_iter()
                .filter_map(|spec| {
                    match source.labels(&spec.field, spec.language.as_deref()) {
                        Ok(labels) => match LabelCorpus::build(labels) {
                            Some(corpus) => {
                                debug!(
                                    "built corpus {spec}: {} labels, {} terms",
                                    corpus.len(),
                                    corpus.terms()
                                );
                                Some((spec.clone(), corpus))
                            }
                            None => {
                                info!("no labels for corpus {spec}, skipping");
                                None
                            }
                        },
                        Err(e) => {
                            warn!("failed to build corpus {spec}: {e}");
                            None
                        }
                    }
                })
                .collect()
        });

        info!("{} of {} label corpora available", built.len(), specs.len());
        Ok(Self {
            source,
            corpora: built.into_iter().collect(),
        })
    }

    pub fn corpora(&self) -> impl Iterator<Item = (&CorpusSpec, &LabelCorpus)> {
        self.corpora.iter()
    }

    pub fn corpus(&self, spec: &CorpusSpec) -> Option<&LabelCorpus> {
        self.corpora.get(spec)
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S> EntitySearcher for CorpusSearcher<S>
where
    S: EntitySearcher + LabelSource,
{
    fn find_by_label(
        &self,
        tokens: &[String],
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let terms: HashSet<String> =
            tokens.iter().flat_map(|t| normalise(t)).collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Best score per entity, first-seen order for ties.
        let mut order: Vec<String> = Vec::new();
        let mut best: HashMap<String, f32> = HashMap::new();
        for (_, corpus) in self.corpora.iter().filter(|(s, _)| s.serves(language)) {
            for (id, score) in corpus.matches(&terms) {
                match best.get_mut(id) {
                    Some(s) => *s = s.max(score),
                    None => {
                        order.push(id.to_string());
                        best.insert(id.to_string(), score);
                    }
                }
            }
        }

        let mut ranked: Vec<(String, f32)> = order
            .into_iter()
            .map(|id| {
                let score = best.get(&id).copied().unwrap_or(0.0);
                (id, score)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut candidates = Vec::with_capacity(limit.min(ranked.len()));
        for (id, score) in ranked {
            if candidates.len() == limit {
                break;
            }
            match self.source.get(&id)? {
                Some(entity) => candidates.push(Candidate { entity, score }),
                None => debug!("corpus entry {id} no longer in the index"),
            }
        }
        Ok(candidates)
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        self.source.get(id)
    }
}

impl<S> std::fmt::Debug for CorpusSearcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusSearcher")
            .field("corpora", &self.corpora.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
