//! First-stage extraction: pull raw project mentions out of free text.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::completion::{parse_json, CompletionProvider};
use crate::error::ProviderError;

const SYSTEM_PROMPT: &str = "You extract project information from work reports. \
Find every mention of a project, system, product, or platform.

Rules:
1. Identify the names of all projects, systems, products, and platforms.
2. Keep the original wording. Do not normalise or merge mentions.
3. Work types such as \"feature development\", \"troubleshooting\", \"meetings\", or \"communication\" are not projects.
4. Count the work items per work-type category.

Respond with strict JSON only, no other text.";

/// Result of the extraction call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub raw_mentions: Vec<String>,
    /// Coarse work-type buckets; statistics only.
    #[serde(default, deserialize_with = "lenient_counts")]
    pub work_categories: BTreeMap<String, u32>,
}

fn extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract the project information from the following work report.

Work done:
{text}

Respond with JSON:
{{
  "raw_mentions": ["mention 1", "mention 2"],
  "work_categories": {{
    "Feature development": count,
    "Troubleshooting": count,
    "Maintenance": count,
    "Requirements": count,
    "Other": count
  }}
}}"#
    )
}

/// Run the extraction call over `text`.
///
/// Empty mentions are dropped and the rest are trimmed; order and
/// duplicates are kept.
pub async fn extract_mentions(
    provider: &dyn CompletionProvider,
    text: &str,
) -> Result<Extraction, ProviderError> {
    let response = provider.complete(&extraction_prompt(text), SYSTEM_PROMPT).await?;
    let mut extraction: Extraction = parse_json(&response)?;
    extraction.raw_mentions = extraction
        .raw_mentions
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    Ok(extraction)
}

/// Accept counts given as integers, floats, or numeric strings; anything
/// else counts as zero.
fn lenient_counts<'de, D>(deserializer: D) -> Result<BTreeMap<String, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?
        .unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let n = match v {
                serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
                serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            };
            (k, n.max(0.0).round() as u32)
        })
        .collect())
}
