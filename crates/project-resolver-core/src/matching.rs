//! Exact and embedding matchers, and the thresholds that govern them.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::EmbeddingCache;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::{normalize, Project, DEFAULT_CATEGORY};
use crate::registry::Registry;

/// Tunable cut-offs for the cascade.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Embedding score at or above which a match is accepted outright.
    pub embedding_high: f32,
    /// Embedding score below which there is no candidate at all.
    pub embedding_low: f32,
    /// `should_ignore` decisions above this confidence are remembered.
    pub ignore_confidence: f64,
    /// Minimum confidence to accept a disambiguated match.
    pub match_confidence: f64,
    /// Minimum confidence to queue a new project for review.
    pub new_project_confidence: f64,
    /// Category suggested for mentions queued by the cascade.
    pub default_category: String,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            embedding_high: 0.85,
            embedding_low: 0.60,
            ignore_confidence: 0.7,
            match_confidence: 0.6,
            new_project_confidence: 0.7,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// How an embedding candidate should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    /// At or above `embedding_high`.
    Accept,
    /// In `[embedding_low, embedding_high)`: left for the disambiguator.
    Ambiguous,
}

impl MatchThresholds {
    pub fn strength(&self, score: f32) -> Option<Strength> {
        if score >= self.embedding_high {
            Some(Strength::Accept)
        } else if score >= self.embedding_low {
            Some(Strength::Ambiguous)
        } else {
            None
        }
    }
}

/// Match `mention` against active projects by name or alias.
///
/// Comparison is case-insensitive on trimmed text. An alias of two or more
/// characters contained in the mention also matches ("PG rollout" → the
/// project aliased "PG"). The first project in iteration order wins.
pub fn exact_match<'a, I>(mention: &str, projects: I) -> Option<&'a Project>
where
    I: IntoIterator<Item = &'a Project>,
{
    let key = normalize(mention);
    if key.is_empty() {
        return None;
    }
    projects.into_iter().filter(|p| p.is_active()).find(|project| {
        if normalize(&project.name) == key {
            return true;
        }
        project.aliases.iter().any(|alias| {
            let alias = normalize(alias);
            alias == key || (alias.chars().count() >= 2 && key.contains(&alias))
        })
    })
}

/// The best embedding candidate for a mention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddingMatch<'a> {
    pub project: &'a Project,
    pub score: f32,
}

/// Score `query` against every cached name and alias of each active
/// project and return the best project if it clears `low`.
///
/// A project only takes the lead with a strictly higher score, so ties go
/// to the earlier project in registry order.
pub fn best_match<'a>(
    query: &[f32],
    registry: &'a Registry,
    cache: &EmbeddingCache,
    low: f32,
) -> Option<EmbeddingMatch<'a>> {
    let mut best: Option<EmbeddingMatch<'a>> = None;
    let mut best_score = 0.0f32;

    for project in registry.active_projects() {
        for key in project.keys() {
            let Some(vector) = cache.get(key) else {
                continue;
            };
            let score = cosine_similarity(query, vector);
            if score > best_score {
                best_score = score;
                best = Some(EmbeddingMatch { project, score });
            }
        }
    }

    best.filter(|m| m.score >= low)
}

/// Embed `mention` and look for its nearest project.
///
/// Fails soft: an empty cache, a provider error, or an empty vector all
/// yield `None`. The provider is not called when the cache is empty.
pub async fn embedding_match<'a>(
    provider: &dyn EmbeddingProvider,
    mention: &str,
    registry: &'a Registry,
    cache: &EmbeddingCache,
    thresholds: &MatchThresholds,
) -> Option<EmbeddingMatch<'a>> {
    if cache.is_empty() {
        return None;
    }
    let query = match provider.embed(mention).await {
        Ok(v) if !v.is_empty() => v,
        Ok(_) => {
            debug!(mention, "provider returned no vector");
            return None;
        }
        Err(e) => {
            warn!(mention, error = %e, "embedding failed, skipping semantic match");
            return None;
        }
    };
    best_match(&query, registry, cache, thresholds.embedding_low)
}
