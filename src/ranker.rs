//! Scoring of candidate entities against an occurrence.
//!
//! Each label of a candidate is tokenised and aligned with the occurrence
//! tokens. The alignment yields a [`LabelMatch`]; the best label decides
//! the candidate's [`Suggestion`].

use std::{cmp::Ordering, collections::HashMap, ops::Range};

use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    config::{LinkerConfig, RankingMerge},
    entity::{Entity, Label, language_matches},
    label_tokenizer::LabelTokenizer,
    redirect::Resolved,
};

/// Upper bound of the factor of a label token matched out of order.
pub const OUT_OF_ORDER_FACTOR: f64 = 0.7;

/// Upper bound of the nudge applied to tied scores by entity ranking.
pub const MAX_RANKING_NUDGE: f64 = 0.1;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Partial,
    Full,
    Exact,
}

/// An occurrence token prepared for label matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchToken {
    pub text: String,
    pub matchable: bool,
}

impl MatchToken {
    pub fn new(text: &str, matchable: bool) -> Self {
        Self {
            text: text.to_string(),
            matchable,
        }
    }
}

/// Similarity of two tokens in `[0, 1]`: the longer of their common prefix
/// and common suffix, relative to the longer token. Counted in chars.
pub fn compare_tokens(a: &str, b: &str, case_sensitive: bool) -> f64 {
    let chars = |s: &str| -> Vec<char> {
        if case_sensitive {
            s.chars().collect()
        } else {
            s.chars().flat_map(char::to_lowercase).collect()
        }
    };
    let (a, b) = (chars(a), chars(b));
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    prefix.max(suffix) as f64 / longest as f64
}

/// The alignment of one label with the occurrence tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    pub match_type: MatchType,
    /// Matched matchable occurrence tokens.
    pub match_count: usize,
    pub label_score: f64,
    pub text_score: f64,
    pub match_score: f64,
    pub span_score: f64,
    /// Occurrence tokens between the first and last matched token.
    pub covered: Range<usize>,
}

impl LabelMatch {
    pub fn score(&self) -> f64 {
        self.span_score * self.span_score * self.match_score
    }
}

/// A ranked entity for one occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub entity: Entity,
    /// The looked-up entity when `entity` was reached through redirects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
    pub label: Label,
    pub match_type: MatchType,
    pub match_count: usize,
    pub score: f64,
    /// Occurrence tokens covered by the label, relative to the occurrence.
    #[serde(skip)]
    pub covered: Range<usize>,
}

/// External popularity of entities, merged into suggestion scores.
pub trait RankingProvider: Send + Sync {
    fn ranking(&self, entity: &Entity) -> Option<f64>;
}

/// Uses the ranking stored on the entity itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityRanking;

impl RankingProvider for EntityRanking {
    fn ranking(&self, entity: &Entity) -> Option<f64> {
        entity.ranking
    }
}

pub struct SuggestionRanker<'a> {
    config: &'a LinkerConfig,
    tokenizer: &'a dyn LabelTokenizer,
    ranking: &'a dyn RankingProvider,
}

impl<'a> SuggestionRanker<'a> {
    pub fn new(
        config: &'a LinkerConfig,
        tokenizer: &'a dyn LabelTokenizer,
        ranking: &'a dyn RankingProvider,
    ) -> Self {
        Self {
            config,
            tokenizer,
            ranking,
        }
    }

    /// Align `label` with `tokens`. `None` when the alignment fails any of
    /// the score thresholds.
    pub fn match_label(
        &self,
        tokens: &[MatchToken],
        label: &str,
        language: Option<&str>,
    ) -> Option<LabelMatch> {
        let cfg = self.config;
        let label_tokens = self.tokenizer.tokenize(label, language);
        if label_tokens.is_empty() || tokens.is_empty() {
            return None;
        }

        let mut used = vec![false; label_tokens.len()];
        let mut matched = vec![false; tokens.len()];
        let mut previous: Option<usize> = None;
        let mut in_order = true;
        let mut all_exact = true;
        let mut label_sum = 0.0;
        let mut matchable_sum = 0.0;
        let mut match_count = 0;

        for (i, token) in tokens.iter().enumerate() {
            let best = label_tokens
                .iter()
                .enumerate()
                .filter(|(j, _)| !used[*j])
                .map(|(j, l)| (j, compare_tokens(&token.text, l, cfg.case_sensitive)))
                .filter(|(_, f)| *f >= cfg.min_token_match_factor)
                .fold(None, |best: Option<(usize, f64)>, (j, f)| match best {
                    Some((_, bf)) if bf >= f => best,
                    _ => Some((j, f)),
                });
            let Some((j, mut factor)) = best else {
                continue;
            };
            if previous.is_some_and(|p| j < p) {
                in_order = false;
                factor = factor.min(OUT_OF_ORDER_FACTOR);
            }
            if factor < 1.0 {
                all_exact = false;
            }
            used[j] = true;
            matched[i] = true;
            previous = Some(j);
            label_sum += factor;
            if token.matchable {
                match_count += 1;
                matchable_sum += factor;
            }
        }

        let first = matched.iter().position(|&m| m)?;
        let last = matched.iter().rposition(|&m| m)?;
        let covered = first..last + 1;
        let covered_matchable = tokens[covered.clone()].iter().filter(|t| t.matchable).count();
        let total_matchable = tokens.iter().filter(|t| t.matchable).count();
        if covered_matchable == 0 {
            return None;
        }

        let label_score = label_sum / label_tokens.len() as f64;
        let text_score = matchable_sum / covered_matchable as f64;
        let exact = in_order
            && all_exact
            && matched[covered.clone()].iter().all(|&m| m)
            && covered.len() == label_tokens.len();
        let match_score = if exact { 1.0 } else { label_score * text_score };

        if label_score < cfg.min_label_score
            || text_score < cfg.min_text_score
            || match_score < cfg.min_match_score
        {
            trace!(
                "label '{label}' rejected: label={label_score:.3} text={text_score:.3} match={match_score:.3}"
            );
            return None;
        }

        let match_type = if exact {
            MatchType::Exact
        } else if match_count == total_matchable {
            MatchType::Full
        } else {
            MatchType::Partial
        };

        Some(LabelMatch {
            match_type,
            match_count,
            label_score,
            text_score,
            match_score,
            span_score: covered_matchable as f64 / total_matchable.max(1) as f64,
            covered,
        })
    }

    /// The best matching label of `entity`. Labels in the document language
    /// come first; the default language is only tried when none of them
    /// matches.
    pub fn best_label(
        &self,
        tokens: &[MatchToken],
        entity: &Entity,
        language: Option<&str>,
    ) -> Option<(Label, LabelMatch)> {
        let primary = entity.labels.iter().filter(|l| match language {
            Some(_) => l.language.is_some()
                && language_matches(l.language.as_deref(), language),
            None => true,
        });
        if let Some(found) = self.best_of(tokens, primary, language) {
            return Some(found);
        }
        let default = self.config.default_language.as_deref();
        if language.is_some() {
            let fallback = entity.labels.iter().filter(|l| match default {
                Some(d) => l.language.as_deref().is_some_and(|ll| ll.eq_ignore_ascii_case(d)),
                None => l.language.is_none(),
            });
            return self.best_of(tokens, fallback, default);
        }
        None
    }

    fn best_of<'l>(
        &self,
        tokens: &[MatchToken],
        labels: impl Iterator<Item = &'l Label>,
        language: Option<&str>,
    ) -> Option<(Label, LabelMatch)> {
        let mut best: Option<(Label, LabelMatch)> = None;
        for label in labels {
            let Some(m) = self.match_label(tokens, &label.text, language) else {
                continue;
            };
            let better = best.as_ref().is_none_or(|(_, b)| {
                m.score() > b.score()
                    || (m.score() == b.score() && m.match_type > b.match_type)
            });
            if better {
                best = Some((label.clone(), m));
            }
        }
        best
    }

    /// Score every resolved candidate against `tokens`, best first.
    pub fn rank(
        &self,
        tokens: &[MatchToken],
        resolved: &[Resolved],
        language: Option<&str>,
    ) -> Vec<Suggestion> {
        let cfg = self.config;
        let mut suggestions: Vec<Suggestion> = resolved
            .iter()
            .filter_map(|r| {
                let (label, m) = self.best_label(tokens, &r.source, language)?;
                Some(Suggestion {
                    entity: r.entity.clone(),
                    redirected_from: r.is_redirect().then(|| r.source.id.clone()),
                    label,
                    match_type: m.match_type,
                    match_count: m.match_count,
                    score: m.score(),
                    covered: m.covered,
                })
            })
            .collect();

        let best_count = suggestions.iter().map(|s| s.match_count).max().unwrap_or(0);
        suggestions.retain(|s| {
            s.match_count >= best_count || s.match_count >= cfg.min_found_tokens
        });

        if cfg.ranking_merge != RankingMerge::Ignore {
            for s in &mut suggestions {
                if let Some(r) = self.ranking_of(&s.entity) {
                    s.score = match cfg.ranking_merge {
                        RankingMerge::Multiply => s.score * r,
                        RankingMerge::Add => s.score + cfg.ranking_weight * r,
                        RankingMerge::Ignore => s.score,
                    };
                }
            }
        }

        // Redirects may resolve several candidates to one entity.
        let mut suggestions = dedup_by_entity(suggestions);
        sort_by_score(&mut suggestions);
        if cfg.rank_equal_scores_by_ranking {
            self.nudge_ties(&mut suggestions);
            sort_by_score(&mut suggestions);
        }
        truncate_suggestions(&mut suggestions, cfg.max_suggestions, cfg.include_similar_score);
        suggestions
    }

    /// The provider's ranking, ignoring values that are not finite.
    fn ranking_of(&self, entity: &Entity) -> Option<f64> {
        let ranking = self.ranking.ranking(entity)?;
        if ranking.is_finite() {
            Some(ranking)
        } else {
            debug!("ignoring ranking {ranking} of {}", entity.id);
            None
        }
    }

    /// Separate equal scores by entity ranking. A nudge never exceeds
    /// [`MAX_RANKING_NUDGE`] nor half the gap to the next higher score, so
    /// distinct scores keep their order.
    fn nudge_ties(&self, sorted: &mut [Suggestion]) {
        let mut start = 0;
        let mut higher: Option<f64> = None;
        while start < sorted.len() {
            let score = sorted[start].score;
            let end = start
                + sorted[start..]
                    .iter()
                    .take_while(|s| s.score == score)
                    .count();
            if end - start > 1 {
                let room = higher.map_or(MAX_RANKING_NUDGE, |h| ((h - score) / 2.0).min(MAX_RANKING_NUDGE));
                for s in &mut sorted[start..end] {
                    let r = self.ranking_of(&s.entity).unwrap_or(0.0).clamp(0.0, 1.0);
                    s.score += room * r;
                }
            }
            higher = Some(score);
            start = end;
        }
    }
}

impl std::fmt::Debug for SuggestionRanker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionRanker")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

/// One suggestion per resolved entity: the best scoring one, the earliest
/// on equal scores. Keeps the order of first appearance.
fn dedup_by_entity(suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut unique: Vec<Suggestion> = Vec::with_capacity(suggestions.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for s in suggestions {
        match seen.get(&s.entity.id) {
            Some(&idx) if unique[idx].score < s.score => unique[idx] = s,
            Some(_) => {}
            None => {
                seen.insert(s.entity.id.clone(), unique.len());
                unique.push(s);
            }
        }
    }
    unique
}

/// Stable sort by descending score.
pub fn sort_by_score(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Keep the `max` best suggestions, plus any following ones with the same
/// score as the last kept one when `include_similar` is set.
pub fn truncate_suggestions(suggestions: &mut Vec<Suggestion>, max: usize, include_similar: bool) {
    if suggestions.len() <= max {
        return;
    }
    let mut keep = max;
    if include_similar && max > 0 {
        let last = suggestions[max - 1].score;
        keep += suggestions[max..].iter().take_while(|s| s.score == last).count();
    }
    suggestions.truncate(keep);
}
