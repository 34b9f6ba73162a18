use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    config::RedirectProcessingMode,
    entity::{Candidate, Entity},
    error::Result,
    searcher::EntitySearcher,
};

/// A looked-up entity after redirect processing.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The entity returned by the lookup; its labels are matched against
    /// the text.
    pub source: Entity,
    /// The entity to suggest.
    pub entity: Entity,
    pub lookup_score: f32,
}

impl Resolved {
    pub fn is_redirect(&self) -> bool {
        self.source.id != self.entity.id
    }
}

/// Resolves redirect chains through the searcher.
pub struct RedirectResolver<'a> {
    searcher: &'a dyn EntitySearcher,
    mode: RedirectProcessingMode,
    max_depth: usize,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(
        searcher: &'a dyn EntitySearcher,
        mode: RedirectProcessingMode,
        max_depth: usize,
    ) -> Self {
        Self {
            searcher,
            mode,
            max_depth,
        }
    }

    /// Follow a single redirect hop. `None` when `entity` has no redirect
    /// or its target does not exist.
    pub fn step(&self, entity: &Entity) -> Result<Option<Entity>> {
        let Some(target) = &entity.redirect else {
            return Ok(None);
        };
        let resolved = self.searcher.get(target)?;
        if resolved.is_none() {
            debug!("redirect target {target} of {} not found", entity.id);
        }
        Ok(resolved)
    }

    /// Follow redirects until an entity without one is reached.
    ///
    /// Chains longer than the configured depth and cycles stop at the last
    /// entity reached. A missing target stops at the entity pointing to it.
    pub fn follow(&self, entity: &Entity) -> Result<Entity> {
        let mut current = entity.clone();
        let mut visited: HashSet<String> = HashSet::from([current.id.clone()]);
        let mut depth = 0;

        while let Some(target) = current.redirect.as_deref() {
            if depth >= self.max_depth {
                warn!(
                    "redirect chain from {} exceeds depth {}, stopping at {}",
                    entity.id, self.max_depth, current.id
                );
                break;
            }
            if visited.contains(target) {
                warn!("redirect cycle from {} at {}", entity.id, current.id);
                break;
            }
            let Some(next) = self.step(&current)? else {
                break;
            };
            visited.insert(next.id.clone());
            current = next;
            depth += 1;
        }
        Ok(current)
    }

    /// Apply the redirect mode to a lookup result.
    pub fn resolve(&self, candidate: &Candidate) -> Result<Vec<Resolved>> {
        let source = &candidate.entity;
        let resolved = |entity: Entity| Resolved {
            source: source.clone(),
            entity,
            lookup_score: candidate.score,
        };

        Ok(match self.mode {
            RedirectProcessingMode::Ignore => vec![resolved(source.clone())],
            RedirectProcessingMode::Follow => vec![resolved(self.follow(source)?)],
            RedirectProcessingMode::AddBoth => {
                let target = self.follow(source)?;
                if target.id == source.id {
                    vec![resolved(target)]
                } else {
                    vec![resolved(source.clone()), resolved(target)]
                }
            }
        })
    }
}

impl std::fmt::Debug for RedirectResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectResolver")
            .field("mode", &self.mode)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::searcher::InMemorySearcher;

    fn searcher() -> InMemorySearcher {
        [
            Entity::new("urn:geologist-redirect")
                .with_label("Geologist", None)
                .with_redirect("urn:geologist"),
            Entity::new("urn:geologist").with_label("Geologe", None),
            Entity::new("urn:a").with_redirect("urn:b"),
            Entity::new("urn:b").with_redirect("urn:c"),
            Entity::new("urn:c").with_redirect("urn:d"),
            Entity::new("urn:d").with_redirect("urn:e"),
            Entity::new("urn:e"),
            Entity::new("urn:x").with_redirect("urn:y"),
            Entity::new("urn:y").with_redirect("urn:x"),
            Entity::new("urn:dangling").with_redirect("urn:nowhere"),
        ]
        .into_iter()
        .collect()
    }

    fn candidate(s: &InMemorySearcher, id: &str) -> Candidate {
        Candidate {
            entity: s.get(id).unwrap().unwrap(),
            score: 0.5,
        }
    }

    #[test]
    fn ignore_keeps_the_entity() {
        let s = searcher();
        let r = RedirectResolver::new(&s, RedirectProcessingMode::Ignore, 3);
        let out = r.resolve(&candidate(&s, "urn:geologist-redirect")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity.id, "urn:geologist-redirect");
        assert!(!out[0].is_redirect());
    }

    #[test]
    fn follow_replaces_the_entity() {
        let s = searcher();
        let r = RedirectResolver::new(&s, RedirectProcessingMode::Follow, 3);
        let out = r.resolve(&candidate(&s, "urn:geologist-redirect")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity.id, "urn:geologist");
        assert_eq!(out[0].source.id, "urn:geologist-redirect");
        assert_eq!(out[0].lookup_score, 0.5);
    }

    #[test]
    fn add_both_keeps_source_and_target() {
        let s = searcher();
        let r = RedirectResolver::new(&s, RedirectProcessingMode::AddBoth, 3);
        let out = r.resolve(&candidate(&s, "urn:geologist-redirect")).unwrap();
        let ids: Vec<_> = out.iter().map(|r| r.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["urn:geologist-redirect", "urn:geologist"]);

        let out = r.resolve(&candidate(&s, "urn:geologist")).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn depth_limit_stops_chain() {
        let s = searcher();
        let a = s.get("urn:a").unwrap().unwrap();
        assert_eq!(
            RedirectResolver::new(&s, RedirectProcessingMode::Follow, 2)
                .follow(&a)
                .unwrap()
                .id,
            "urn:c"
        );
        assert_eq!(
            RedirectResolver::new(&s, RedirectProcessingMode::Follow, 10)
                .follow(&a)
                .unwrap()
                .id,
            "urn:e"
        );
        assert_eq!(
            RedirectResolver::new(&s, RedirectProcessingMode::Follow, 0)
                .follow(&a)
                .unwrap()
                .id,
            "urn:a"
        );
    }

    #[test]
    fn cycles_terminate() {
        let s = searcher();
        let r = RedirectResolver::new(&s, RedirectProcessingMode::Follow, 100);
        let x = s.get("urn:x").unwrap().unwrap();
        assert_eq!(r.follow(&x).unwrap().id, "urn:y");
    }

    #[test]
    fn dangling_redirect_keeps_entity() {
        let s = searcher();
        let r = RedirectResolver::new(&s, RedirectProcessingMode::Follow, 3);
        let d = s.get("urn:dangling").unwrap().unwrap();
        assert!(r.step(&d).unwrap().is_none());
        assert_eq!(r.follow(&d).unwrap().id, "urn:dangling");
    }

    proptest! {
        // Following a chain of n hops in one go ends where following the
        // first hop and then the rest ends.
        #[test]
        fn follow_composes(len in 1usize..8, depth in 1usize..10) {
            let chain: InMemorySearcher = (0..=len)
                .map(|i| {
                    let e = Entity::new(&format!("urn:{i}"));
                    if i < len { e.with_redirect(&format!("urn:{}", i + 1)) } else { e }
                })
                .collect();
            let r = RedirectResolver::new(&chain, RedirectProcessingMode::Follow, depth);
            let start = chain.get("urn:0").unwrap().unwrap();
            let end = r.follow(&start).unwrap();
            prop_assert_eq!(end.id.clone(), format!("urn:{}", len.min(depth)));

            if depth > 1 {
                let first = r.step(&start).unwrap().unwrap();
                let rest = RedirectResolver::new(&chain, RedirectProcessingMode::Follow, depth - 1)
                    .follow(&first)
                    .unwrap();
                prop_assert_eq!(rest.id, end.id);
            }
        }
    }
}
