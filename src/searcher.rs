use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    entity::{Candidate, Entity},
    error::Result,
    label_tokenizer::{LabelTokenizer, SimpleLabelTokenizer},
};

/// Read access to the reference knowledge base.
///
/// Implementations return `Ok(vec![])` when nothing matches and
/// [`Error::Lookup`](crate::Error::Lookup) when the backing store cannot
/// answer.
pub trait EntitySearcher: Send + Sync {
    /// Entities with a label sharing tokens with `tokens`, best first.
    fn find_by_label(
        &self,
        tokens: &[String],
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    /// Dereference an entity by id.
    fn get(&self, id: &str) -> Result<Option<Entity>>;
}

/// Enumerates `(entity id, label)` pairs of one label field and language.
/// `None` selects labels without a language tag.
pub trait LabelSource: Send + Sync {
    fn labels(
        &self,
        field: &str,
        language: Option<&str>,
    ) -> Result<Vec<(String, String)>>;
}

/// A searcher over entities held in memory. Candidates with equal scores
/// come back in insertion order.
///
/// Labels are split with the searcher's tokenizer, which must be the one
/// queries are tokenized with ([`SimpleLabelTokenizer`] unless replaced).
#[derive(Clone)]
pub struct InMemorySearcher {
    entities: Vec<Entity>,
    by_id: HashMap<String, usize>,
    tokenizer: Arc<dyn LabelTokenizer>,
}

impl Default for InMemorySearcher {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            by_id: HashMap::new(),
            tokenizer: Arc::new(SimpleLabelTokenizer),
        }
    }
}

impl InMemorySearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokenizer(mut self, tokenizer: impl LabelTokenizer + 'static) -> Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    /// Add an entity, replacing any entity with the same id.
    pub fn add(&mut self, entity: Entity) {
        if let Some(&idx) = self.by_id.get(&entity.id) {
            self.entities[idx] = entity;
        } else {
            self.by_id.insert(entity.id.clone(), self.entities.len());
            self.entities.push(entity);
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

impl std::fmt::Debug for InMemorySearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySearcher")
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

impl FromIterator<Entity> for InMemorySearcher {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut searcher = Self::new();
        for entity in iter {
            searcher.add(entity);
        }
        searcher
    }
}

impl EntitySearcher for InMemorySearcher {
    fn find_by_label(
        &self,
        tokens: &[String],
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let query: HashSet<String> =
            tokens.iter().map(|t| t.to_lowercase()).collect();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entity in &self.entities {
            let best = entity
                .labels_for(language)
                .map(|label| {
                    let label_tokens: HashSet<String> = self
                        .tokenizer
                        .tokenize(&label.text, language)
                        .into_iter()
                        .map(|t| t.to_lowercase())
                        .collect();
                    query.intersection(&label_tokens).count()
                })
                .max()
                .unwrap_or(0);
            if best > 0 {
                results.push(Candidate {
                    entity: entity.clone(),
                    score: best as f32 / query.len() as f32,
                });
            }
        }

        // Stable: equal scores keep insertion order.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.by_id.get(id).map(|&idx| self.entities[idx].clone()))
    }
}

impl LabelSource for InMemorySearcher {
    fn labels(
        &self,
        field: &str,
        language: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        Ok(self
            .entities
            .iter()
            .flat_map(|e| {
                e.labels
                    .iter()
                    .filter(|l| {
                        l.field == field
                            && match (l.language.as_deref(), language) {
                                (None, None) => true,
                                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                                _ => false,
                            }
                    })
                    .map(|l| (e.id.clone(), l.text.clone()))
            })
            .collect())
    }
}
