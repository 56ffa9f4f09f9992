//! The matching cascade.
//!
//! Resolution runs in two phases so the caller never holds the registry
//! lock across a provider call:
//!
//! 1. [`Cascade::plan`] reads a registry snapshot and the embedding cache
//!    and performs every provider call (extraction, embedding,
//!    disambiguation). It produces a [`ResolutionPlan`] and mutates nothing.
//! 2. [`ResolutionPlan::apply`] is synchronous. It applies the planned
//!    rejections, pending sightings, and learned aliases to a freshly
//!    loaded registry, re-checking every membership rule against that state.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::EmbeddingCache;
use crate::completion::CompletionProvider;
use crate::disambiguate::{disambiguate, AliasSuggestion, MatchResponse, Verdict};
use crate::embedding::EmbeddingProvider;
use crate::extract::{extract_mentions, Extraction};
use crate::matching::{embedding_match, exact_match, MatchThresholds, Strength};
use crate::models::normalize;
use crate::registry::{Registry, Sighting, SightingOutcome};

/// The cascade with its providers and thresholds.
pub struct Cascade<'a> {
    embedder: &'a dyn EmbeddingProvider,
    completer: &'a dyn CompletionProvider,
    thresholds: &'a MatchThresholds,
}

/// Mentions bound to one canonical project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectMentions {
    pub name: String,
    pub mention_count: u32,
    pub matched_texts: Vec<String>,
}

/// An alias attached to a project during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnedAlias {
    pub project: String,
    pub alias: String,
}

/// Everything [`Cascade::plan`] decided, ready to be applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionPlan {
    projects: Vec<ProjectMentions>,
    work_categories: BTreeMap<String, u32>,
    rejections: Vec<String>,
    sightings: Vec<Sighting>,
    aliases: Vec<AliasSuggestion>,
    unresolved: Vec<String>,
}

/// The outcome of one resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub projects: Vec<ProjectMentions>,
    pub work_categories: BTreeMap<String, u32>,
    /// Names that entered the pending queue for the first time.
    pub new_project_names: Vec<String>,
    /// Mentions added to the rejected list.
    pub rejected: Vec<String>,
    pub learned_aliases: Vec<LearnedAlias>,
    /// Mentions left without a decision this pass.
    pub unresolved: Vec<String>,
}

/// A `{name, value}` pair for team statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameValue {
    pub name: String,
    pub value: u32,
}

/// Project involvement and work-type counts across a team's reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamSummary {
    pub project_involvement: Vec<NameValue>,
    pub work_categories: Vec<NameValue>,
    pub resolution: Resolution,
}

impl<'a> Cascade<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingProvider,
        completer: &'a dyn CompletionProvider,
        thresholds: &'a MatchThresholds,
    ) -> Self {
        Self {
            embedder,
            completer,
            thresholds,
        }
    }

    /// Run every stage against a snapshot of the registry.
    pub async fn plan(
        &self,
        text: &str,
        registry: &Registry,
        cache: &EmbeddingCache,
        today: NaiveDate,
    ) -> ResolutionPlan {
        let mut plan = ResolutionPlan::default();

        let Extraction {
            raw_mentions,
            work_categories,
        } = match extract_mentions(self.completer, text).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(error = %e, "mention extraction failed, nothing to resolve");
                return plan;
            }
        };
        plan.work_categories = work_categories;
        debug!(count = raw_mentions.len(), "mentions extracted");

        // Rejected, exact, and already-pending mentions need no provider.
        let mut carried = Vec::new();
        for mention in raw_mentions {
            if registry.is_rejected(&mention) {
                debug!(%mention, "dropped: rejected");
            } else if let Some(project) = exact_match(&mention, registry.projects()) {
                debug!(%mention, project = %project.name, "exact match");
                plan.record_match(&project.name, mention);
            } else if let Some(entry) = registry.pending_entry(&mention) {
                debug!(%mention, "already pending");
                plan.sightings.push(Sighting {
                    name: mention.clone(),
                    source_text: mention,
                    confidence: entry.confidence,
                    suggested_category: entry.suggested_category.clone(),
                    date: today,
                });
            } else {
                carried.push(mention);
            }
        }

        let mut ambiguous = Vec::new();
        for mention in carried {
            match embedding_match(self.embedder, &mention, registry, cache, self.thresholds).await {
                Some(m) if self.thresholds.strength(m.score) == Some(Strength::Accept) => {
                    info!(%mention, project = %m.project.name, score = m.score, "embedding match");
                    plan.record_match(&m.project.name, mention);
                }
                Some(m) => {
                    debug!(%mention, project = %m.project.name, score = m.score, "ambiguous embedding match");
                    ambiguous.push(mention);
                }
                None => ambiguous.push(mention),
            }
        }
        if ambiguous.is_empty() {
            return plan;
        }

        let mut batch: Vec<String> = Vec::new();
        for mention in &ambiguous {
            if !batch.iter().any(|b| normalize(b) == normalize(mention)) {
                batch.push(mention.clone());
            }
        }
        let response = match disambiguate(self.completer, &batch, registry).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, count = batch.len(), "disambiguation failed, leaving mentions unresolved");
                MatchResponse::default()
            }
        };

        for mention in ambiguous {
            let verdict = response
                .decision_for(&mention)
                .map(|d| (d.verdict(self.thresholds, registry), d.confidence));
            match verdict {
                Some((Verdict::Reject, _)) => {
                    debug!(%mention, "disambiguated: not a project");
                    if !plan.rejections.iter().any(|r| normalize(r) == normalize(&mention)) {
                        plan.rejections.push(mention);
                    }
                }
                Some((Verdict::Match(project), _)) => {
                    debug!(%mention, project = %project.name, "disambiguated: match");
                    plan.record_match(&project.name, mention);
                }
                Some((Verdict::NewProject, confidence)) => {
                    debug!(%mention, confidence, "disambiguated: new project");
                    plan.sightings.push(Sighting {
                        name: mention.clone(),
                        source_text: mention,
                        confidence,
                        suggested_category: self.thresholds.default_category.clone(),
                        date: today,
                    });
                }
                Some((Verdict::Drop, _)) | None => plan.unresolved.push(mention),
            }
        }

        plan.aliases = response
            .suggested_aliases
            .into_iter()
            .filter(|s| !s.project.trim().is_empty() && !s.new_alias.trim().is_empty())
            .collect();
        plan
    }

    /// Plan against `registry` and apply the plan to it in place.
    pub async fn resolve(
        &self,
        text: &str,
        registry: &mut Registry,
        cache: &EmbeddingCache,
        today: NaiveDate,
    ) -> Resolution {
        self.plan(text, registry, cache, today).await.apply(registry)
    }
}

impl ResolutionPlan {
    fn record_match(&mut self, project: &str, mention: String) {
        tally(&mut self.projects, project, mention);
    }

    /// True if applying the plan could change the registry.
    pub fn mutates(&self) -> bool {
        !(self.rejections.is_empty() && self.sightings.is_empty() && self.aliases.is_empty())
    }

    /// Apply the planned registry changes.
    ///
    /// Each change is re-validated against `registry`: a new-project
    /// mention that has since become a project name or alias (including an
    /// alias learned in this same plan) is counted as a match of it, a
    /// rejected one is skipped, and an alias that would collide with
    /// another project is skipped and logged.
    pub fn apply(self, registry: &mut Registry) -> Resolution {
        let mut resolution = Resolution {
            projects: self.projects,
            work_categories: self.work_categories,
            unresolved: self.unresolved,
            ..Resolution::default()
        };

        for mention in self.rejections {
            if registry.record_rejection(&mention) {
                info!(%mention, "mention rejected");
                resolution.rejected.push(mention);
            }
        }

        for suggestion in self.aliases {
            let alias = suggestion.new_alias.trim();
            let Some(project) = registry.owner_of(&suggestion.project).map(|p| p.name.clone()) else {
                warn!(project = %suggestion.project, alias, "alias suggested for unknown project");
                continue;
            };
            match registry.add_alias(&project, alias) {
                Ok(true) => {
                    info!(%project, alias, "alias learned");
                    resolution.learned_aliases.push(LearnedAlias {
                        project,
                        alias: alias.to_string(),
                    });
                }
                Ok(false) => {}
                Err(e) => warn!(%project, alias, error = %e, "alias suggestion skipped"),
            }
        }

        // Runs after alias learning; a sighting owned by a project by now
        // is a match of that project.
        for sighting in self.sightings {
            let owner = registry
                .owner_of(&sighting.name)
                .filter(|p| p.is_active())
                .map(|p| p.name.clone());
            if let Some(project) = owner {
                debug!(name = %sighting.name, %project, "sighting now owned by a project");
                tally(&mut resolution.projects, &project, sighting.source_text);
                continue;
            }
            let name = sighting.name.clone();
            if registry.record_sighting(sighting) == SightingOutcome::Created {
                info!(name = %name, "new project queued for review");
                resolution.new_project_names.push(name);
            }
        }

        resolution
    }
}

fn tally(projects: &mut Vec<ProjectMentions>, project: &str, mention: String) {
    match projects.iter_mut().find(|p| p.name == project) {
        Some(entry) => {
            entry.mention_count += 1;
            entry.matched_texts.push(mention);
        }
        None => projects.push(ProjectMentions {
            name: project.to_string(),
            mention_count: 1,
            matched_texts: vec![mention],
        }),
    }
}

/// Concatenate per-user reports under a header line each.
pub fn team_text<S: AsRef<str>>(reports: &[(S, S)]) -> String {
    reports
        .iter()
        .map(|(user, text)| format!("[{}] Work done:\n{}", user.as_ref(), text.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl TeamSummary {
    /// Involvement sorted by mention count (descending, stable) and the
    /// non-zero work categories.
    pub fn from_resolution(resolution: Resolution) -> Self {
        let mut project_involvement: Vec<NameValue> = resolution
            .projects
            .iter()
            .map(|p| NameValue {
                name: p.name.clone(),
                value: p.mention_count,
            })
            .collect();
        project_involvement.sort_by(|a, b| b.value.cmp(&a.value));
        let work_categories = resolution
            .work_categories
            .iter()
            .filter(|(_, &v)| v > 0)
            .map(|(k, &v)| NameValue {
                name: k.clone(),
                value: v,
            })
            .collect();
        Self {
            project_involvement,
            work_categories,
            resolution,
        }
    }
}
