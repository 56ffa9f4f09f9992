//! Second-stage batch disambiguation by a completion provider.
//!
//! Every mention the exact and embedding matchers could not settle is sent
//! in one request together with the active project list. The provider
//! answers per mention (match, new project, or ignore, with a confidence)
//! and may propose aliases to learn.

use serde::{Deserialize, Deserializer};

use crate::completion::{parse_json, CompletionProvider};
use crate::error::ProviderError;
use crate::matching::MatchThresholds;
use crate::models::{normalize, Project};
use crate::registry::Registry;

const SYSTEM_PROMPT: &str = "You match extracted project mentions against a list of known projects.

Rules:
1. If a mention clearly refers to a known project (including an alias, abbreviation, or short form), return that project's canonical name.
2. If a mention is a brand-new project that is not in the list, mark it as a new project.
3. If a mention is not a project at all (a work description, a meeting, routine chores), mark it as ignored.
4. Return a confidence between 0 and 1 for each decision.

Respond with strict JSON only.";

/// The provider's answer for one mention.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MentionDecision {
    pub mention: String,
    pub matched_project: Option<String>,
    pub is_new_project: bool,
    pub should_ignore: bool,
    #[serde(deserialize_with = "lenient_confidence")]
    pub confidence: f64,
    pub reason: String,
}

/// An alias the provider proposes to attach to a project.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AliasSuggestion {
    pub project: String,
    pub new_alias: String,
}

/// The whole disambiguation response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchResponse {
    pub matches: Vec<MentionDecision>,
    pub suggested_aliases: Vec<AliasSuggestion>,
}

/// What the cascade does with a decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict<'a> {
    /// Confidently not a project: remember it in the rejected list.
    Reject,
    /// Bind the mention to this project.
    Match(&'a Project),
    /// Queue the mention for review as a new project.
    NewProject,
    /// No usable decision this pass.
    Drop,
}

impl MentionDecision {
    /// Apply the decision policy.
    ///
    /// `should_ignore` wins over everything else. A `matched_project` that
    /// is not an active project's name or alias counts as no decision.
    pub fn verdict<'a>(&self, thresholds: &MatchThresholds, registry: &'a Registry) -> Verdict<'a> {
        if self.should_ignore {
            return if self.confidence > thresholds.ignore_confidence {
                Verdict::Reject
            } else {
                Verdict::Drop
            };
        }
        if let Some(name) = self.matched_project.as_deref().filter(|n| !n.trim().is_empty()) {
            if self.confidence < thresholds.match_confidence {
                return Verdict::Drop;
            }
            return registry
                .active_projects()
                .find(|p| p.answers_to(name))
                .map_or(Verdict::Drop, Verdict::Match);
        }
        if self.is_new_project && self.confidence >= thresholds.new_project_confidence {
            return Verdict::NewProject;
        }
        Verdict::Drop
    }
}

impl MatchResponse {
    /// The first decision whose mention equals `mention` (normalized).
    pub fn decision_for(&self, mention: &str) -> Option<&MentionDecision> {
        let key = normalize(mention);
        self.matches.iter().find(|d| normalize(&d.mention) == key)
    }
}

/// Render the active projects as the prompt's known-project list.
fn known_projects(registry: &Registry) -> String {
    let lines: Vec<String> = registry
        .active_projects()
        .map(|p| {
            if p.aliases.is_empty() {
                format!("- {}", p.name)
            } else {
                format!("- {} (aliases: {})", p.name, p.aliases.join(", "))
            }
        })
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn match_prompt(mentions: &[String], registry: &Registry) -> String {
    let mentions = serde_json::to_string(mentions).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"Known projects:
{known}

Mentions to match:
{mentions}

Decide for each mention and respond with JSON:
{{
  "matches": [
    {{
      "mention": "the original mention",
      "matched_project": "canonical project name" or null,
      "is_new_project": true/false,
      "should_ignore": true/false,
      "confidence": 0.0-1.0,
      "reason": "why"
    }}
  ],
  "suggested_aliases": [
    {{
      "project": "canonical project name",
      "new_alias": "alias worth adding"
    }}
  ]
}}"#,
        known = known_projects(registry),
    )
}

/// Ask the provider to settle `mentions` in one call.
///
/// An empty batch returns an empty response without calling the provider.
pub async fn disambiguate(
    provider: &dyn CompletionProvider,
    mentions: &[String],
    registry: &Registry,
) -> Result<MatchResponse, ProviderError> {
    if mentions.is_empty() {
        return Ok(MatchResponse::default());
    }
    let response = provider
        .complete(&match_prompt(mentions, registry), SYSTEM_PROMPT)
        .await?;
    parse_json(&response)
}

fn lenient_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let n = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(n.clamp(0.0, 1.0))
}
