//! Structured parsing of a weekly report into per-project work items.
//!
//! One completion call splits the "this week" and "next week" texts into
//! items and assigns each a project from the known list. When the provider
//! is unavailable or its answer cannot be parsed, a line-based fallback
//! keeps the items without projects.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::completion::{parse_json, CompletionProvider};
use crate::registry::Registry;

const SYSTEM_PROMPT: &str = "You parse work reports into structured work items.

Rules:
1. Split the text into individual, concrete work items.
2. project_name MUST be chosen verbatim from the known project list.
3. Use the work content, project descriptions, sub-item names, and aliases to decide which project an item belongs to.
4. If an item cannot clearly be attributed to a project, set project_name to null.
5. Keep the full original description of each item.
6. Drop meaningless enumeration numbers and separators.

Respond with strict JSON only, no other text.";

/// Leading characters stripped from each line by the fallback parser.
const ENUMERATION: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', '、', '）', ')', ' ',
];

/// One work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedItem {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Parsed items for both report sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReport {
    #[serde(default)]
    pub this_week_items: Vec<ParsedItem>,
    #[serde(default)]
    pub next_week_items: Vec<ParsedItem>,
}

/// Parse a report, falling back to line splitting on any provider failure.
pub async fn parse_report(
    provider: &dyn CompletionProvider,
    registry: &Registry,
    this_week: Option<&str>,
    next_week: Option<&str>,
) -> ParsedReport {
    let this_week = this_week.map(str::trim).filter(|t| !t.is_empty());
    let next_week = next_week.map(str::trim).filter(|t| !t.is_empty());
    if this_week.is_none() && next_week.is_none() {
        return ParsedReport::default();
    }

    let prompt = parse_prompt(registry, this_week, next_week);
    let parsed = match provider.complete(&prompt, SYSTEM_PROMPT).await {
        Ok(response) => parse_json::<ParsedReport>(&response),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(raw) => {
            let report = ParsedReport {
                this_week_items: canonical_items(registry, raw.this_week_items),
                next_week_items: canonical_items(registry, raw.next_week_items),
            };
            info!(
                this_week = report.this_week_items.len(),
                next_week = report.next_week_items.len(),
                "report parsed"
            );
            report
        }
        Err(e) => {
            warn!(error = %e, "report parsing failed, splitting by line");
            fallback_parse(this_week, next_week)
        }
    }
}

/// Split each text into one item per meaningful line, without projects.
pub fn fallback_parse(this_week: Option<&str>, next_week: Option<&str>) -> ParsedReport {
    ParsedReport {
        this_week_items: this_week.map(split_lines).unwrap_or_default(),
        next_week_items: next_week.map(split_lines).unwrap_or_default(),
    }
}

fn split_lines(text: &str) -> Vec<ParsedItem> {
    text.lines()
        .map(|line| line.trim().trim_start_matches(ENUMERATION))
        .filter(|line| line.chars().count() > 2)
        .map(|line| ParsedItem {
            project_name: None,
            content: line.to_string(),
        })
        .collect()
}

/// Map the provider's project name onto a canonical active project by
/// exact name or alias; unknown names are kept verbatim for the user to
/// correct.
pub fn canonical_project(registry: &Registry, raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    let canonical = registry
        .active_projects()
        .find(|p| p.answers_to(raw))
        .map(|p| p.name.clone());
    Some(canonical.unwrap_or_else(|| raw.to_string()))
}

fn canonical_items(registry: &Registry, items: Vec<ParsedItem>) -> Vec<ParsedItem> {
    items
        .into_iter()
        .filter_map(|item| {
            let content = item.content.trim();
            (!content.is_empty()).then(|| ParsedItem {
                project_name: canonical_project(registry, item.project_name.as_deref()),
                content: content.to_string(),
            })
        })
        .collect()
}

fn known_projects(registry: &Registry) -> String {
    let lines: Vec<String> = registry
        .active_projects()
        .map(|p| {
            let mut parts = Vec::new();
            if !p.description.is_empty() {
                parts.push(p.description.clone());
            }
            if !p.sub_items.is_empty() {
                let names: Vec<&str> = p.sub_items.iter().map(|s| s.name.as_str()).collect();
                parts.push(format!("sub-items: {}", names.join(", ")));
            }
            if !p.aliases.is_empty() {
                parts.push(format!("aliases: {}", p.aliases.join(", ")));
            }
            if parts.is_empty() {
                format!("- {}", p.name)
            } else {
                format!("- {}: {}", p.name, parts.join("; "))
            }
        })
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn parse_prompt(registry: &Registry, this_week: Option<&str>, next_week: Option<&str>) -> String {
    format!(
        r#"Parse the following work report.

project_name MUST be chosen verbatim from this list. Do not invent project names.

Known projects:
{known}

Work done this week:
{this_week}

Plan for next week:
{next_week}

Respond with JSON (project_name is a canonical name from the list, or null):
{{
  "this_week_items": [
    {{"project_name": "canonical name or null", "content": "the work item"}}
  ],
  "next_week_items": [
    {{"project_name": "canonical name or null", "content": "the planned item"}}
  ]
}}"#,
        known = known_projects(registry),
        this_week = this_week.unwrap_or("(none)"),
        next_week = next_week.unwrap_or("(none)"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::ScriptedCompleter;
    use crate::models::{Project, SubItem};

    fn registry() -> Registry {
        let mut r = Registry::new();
        let mut pg = Project::new("Payment Gateway", "Business Systems").with_aliases(["PG"]);
        pg.description = "Card and wallet payments".into();
        pg.sub_items.push(SubItem::new("Refunds", ""));
        r.create_project(pg).unwrap();
        r.create_project(Project::new("Ops Dashboard", "Operations")).unwrap();
        r
    }

    #[tokio::test]
    async fn canonicalizes_project_names() {
        let provider = ScriptedCompleter::new([r#"```json
{"this_week_items": [
   {"project_name": "pg", "content": " fixed refund rounding "},
   {"project_name": "Moonshot", "content": "spike"},
   {"project_name": null, "content": "team lunch"},
   {"project_name": "Ops Dashboard", "content": "  "}
 ],
 "next_week_items": [{"project_name": "ops dashboard", "content": "alerts"}]}
```"#]);
        let out = parse_report(&provider, &registry(), Some("stuff"), Some("more")).await;

        assert_eq!(out.this_week_items.len(), 3);
        assert_eq!(out.this_week_items[0].project_name.as_deref(), Some("Payment Gateway"));
        assert_eq!(out.this_week_items[0].content, "fixed refund rounding");
        assert_eq!(out.this_week_items[1].project_name.as_deref(), Some("Moonshot"));
        assert_eq!(out.this_week_items[2].project_name, None);
        assert_eq!(out.next_week_items[0].project_name.as_deref(), Some("Ops Dashboard"));

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("- Payment Gateway: Card and wallet payments; sub-items: Refunds; aliases: PG"));
        assert!(prompt.contains("- Ops Dashboard\n"));
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_lines() {
        let provider = ScriptedCompleter::new(["Sure! Here are the items:"]);
        let out = parse_report(
            &provider,
            &registry(),
            Some("1. Fixed the PG timeout\n2、ok\n\n- Reviewed dashboards"),
            None,
        )
        .await;
        assert_eq!(
            out.this_week_items,
            vec![
                ParsedItem {
                    project_name: None,
                    content: "Fixed the PG timeout".into()
                },
                ParsedItem {
                    project_name: None,
                    content: "Reviewed dashboards".into()
                },
            ]
        );
        assert!(out.next_week_items.is_empty());
    }

    #[tokio::test]
    async fn empty_input_skips_provider() {
        let provider = ScriptedCompleter::offline();
        let out = parse_report(&provider, &registry(), Some("  "), None).await;
        assert_eq!(out, ParsedReport::default());
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn fallback_strips_enumeration() {
        let out = fallback_parse(Some("3) 完成支付网关联调\n12.\n）审核"), None);
        assert_eq!(out.this_week_items.len(), 1);
        assert_eq!(out.this_week_items[0].content, "完成支付网关联调");
    }
}
