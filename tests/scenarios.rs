//! End-to-end resolution through [`ResolverContext`] with deterministic
//! providers and a registry file in a temp directory.

use std::path::Path;
use std::sync::Arc;

use project_resolver::config::Config;
use project_resolver::context::ResolverContext;
use project_resolver_core::fake::{ScriptedCompleter, StaticEmbedder};
use project_resolver_core::{Project, ProjectStatus, RegistryError};
use serde_json::json;
use tempfile::TempDir;

fn config(dir: &Path) -> Config {
    let content = format!(
        r#"[registry]
path = "{}/data/projects.json"
"#,
        dir.display()
    );
    toml::from_str(&content).unwrap()
}

fn extraction(mentions: &[&str]) -> String {
    json!({
        "raw_mentions": mentions,
        "work_categories": {"Feature development": 1},
    })
    .to_string()
}

fn context(
    dir: &Path,
    embedder: &Arc<StaticEmbedder>,
    completer: &Arc<ScriptedCompleter>,
) -> ResolverContext {
    ResolverContext::new(config(dir), embedder.clone(), completer.clone())
}

async fn seed(ctx: &ResolverContext) {
    ctx.init().await.unwrap();
    ctx.create_project(Project::new("Payment Gateway", "Business Systems").with_aliases(["PG"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn alias_in_text_resolves_exactly() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(StaticEmbedder::new());
    let completer = Arc::new(ScriptedCompleter::new([extraction(&["PG upgrade"])]));
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let out = ctx.resolve_mentions("Finished the PG upgrade").await.unwrap();

    assert_eq!(out.projects.len(), 1);
    assert_eq!(out.projects[0].name, "Payment Gateway");
    assert_eq!(out.projects[0].mention_count, 1);
    assert_eq!(embedder.calls(), 0);
    assert_eq!(completer.calls(), 1);
}

#[tokio::test]
async fn ambiguous_similarity_is_settled_by_completion() {
    let tmp = TempDir::new().unwrap();
    let orthogonal = (1.0f32 - 0.81 * 0.81).sqrt();
    let embedder = Arc::new(
        StaticEmbedder::new()
            .with("Payment Gateway", vec![1.0, 0.0])
            .with("PG", vec![1.0, 0.0])
            .with("Paymnt Gatewy", vec![0.81, orthogonal]),
    );
    let completer = Arc::new(ScriptedCompleter::new([
        extraction(&["Paymnt Gatewy"]),
        json!({
            "matches": [{
                "mention": "Paymnt Gatewy",
                "matched_project": "Payment Gateway",
                "confidence": 0.9,
                "reason": "typo"
            }],
            "suggested_aliases": []
        })
        .to_string(),
    ]));
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let report = ctx.rebuild_embeddings(false).await.unwrap();
    assert_eq!(report.embedded, 2);

    let out = ctx.resolve_mentions("Paymnt Gatewy hotfix").await.unwrap();
    assert_eq!(out.projects[0].name, "Payment Gateway");
    assert_eq!(out.projects[0].matched_texts, vec!["Paymnt Gatewy"]);
    assert_eq!(completer.calls(), 2);
    assert!(completer.prompts()[1].contains("Paymnt Gatewy"));
}

#[tokio::test]
async fn ignored_mentions_are_filtered_on_later_calls() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(StaticEmbedder::new());
    let completer = Arc::new(ScriptedCompleter::new([
        extraction(&["quarterly all-hands"]),
        json!({
            "matches": [{
                "mention": "quarterly all-hands",
                "should_ignore": true,
                "confidence": 0.8
            }]
        })
        .to_string(),
        extraction(&["Quarterly All-Hands"]),
    ]));
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let first = ctx.resolve_mentions("Went to the quarterly all-hands").await.unwrap();
    assert_eq!(first.rejected, vec!["quarterly all-hands"]);
    assert_eq!(ctx.rejected().await.unwrap(), vec!["quarterly all-hands"]);

    let second = ctx.resolve_mentions("Quarterly All-Hands again").await.unwrap();
    assert!(second.projects.is_empty());
    assert!(second.rejected.is_empty());
    // Only the extraction call: the rejected name never reaches disambiguation.
    assert_eq!(completer.calls(), 3);
}

#[tokio::test]
async fn new_project_flows_through_review() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(StaticEmbedder::new());
    let completer = Arc::new(ScriptedCompleter::new([
        extraction(&["Inventory Sync v2"]),
        json!({
            "matches": [{
                "mention": "Inventory Sync v2",
                "is_new_project": true,
                "confidence": 0.75
            }]
        })
        .to_string(),
    ]));
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let out = ctx.resolve_mentions("Kicked off Inventory Sync v2").await.unwrap();
    assert_eq!(out.new_project_names, vec!["Inventory Sync v2"]);

    let pending = ctx.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Inventory Sync v2");
    assert_eq!(pending[0].mention_count, 1);

    ctx.approve("Inventory Sync v2", Some("Internal Tools"))
        .await
        .unwrap();

    let project = ctx.project("Inventory Sync v2").await.unwrap();
    assert_eq!(project.category, "Internal Tools");
    assert_eq!(project.status, ProjectStatus::Active);
    assert!(project.aliases.is_empty());
    assert!(ctx.pending().await.unwrap().is_empty());
    assert!(ctx
        .categories()
        .await
        .unwrap()
        .iter()
        .any(|c| c == "Internal Tools"));
}

#[tokio::test]
async fn state_survives_a_new_context() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(
        StaticEmbedder::new()
            .with("Payment Gateway", vec![1.0, 0.0])
            .with("PG", vec![0.0, 1.0]),
    );
    let completer = Arc::new(ScriptedCompleter::offline());
    {
        let ctx = context(tmp.path(), &embedder, &completer);
        seed(&ctx).await;
        ctx.suggest_project("Atlas", Some("dana")).await.unwrap();
        ctx.rebuild_embeddings(false).await.unwrap();
    }

    let ctx = context(tmp.path(), &embedder, &completer);
    let pending = ctx.pending().await.unwrap();
    assert_eq!(pending[0].suggested_by.as_deref(), Some("dana"));
    assert_eq!(ctx.projects(false).await.unwrap().len(), 1);

    // The cache was reloaded from disk: nothing left to embed.
    let report = ctx.rebuild_embeddings(false).await.unwrap();
    assert_eq!(report.requested, 0);
}

#[tokio::test]
async fn failed_operations_leave_the_file_untouched() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(StaticEmbedder::new());
    let completer = Arc::new(ScriptedCompleter::offline());
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let path = tmp.path().join("data/projects.json");
    let before = std::fs::read_to_string(&path).unwrap();

    let err = ctx
        .create_project(Project::new("Ledger", "Other").with_aliases(["pg"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RegistryError>(),
        Some(RegistryError::AliasTaken { .. })
    ));
    assert!(ctx.approve("Nobody", None).await.is_err());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn offline_completion_resolves_nothing() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(StaticEmbedder::new());
    let completer = Arc::new(ScriptedCompleter::offline());
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let out = ctx.resolve_mentions("PG work").await.unwrap();
    assert!(out.projects.is_empty());
    assert!(out.work_categories.is_empty());
    assert!(ctx.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn team_reports_are_summarised() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(StaticEmbedder::new());
    let completer = Arc::new(ScriptedCompleter::new([extraction(&[
        "PG", "payment gateway",
    ])]));
    let ctx = context(tmp.path(), &embedder, &completer);
    seed(&ctx).await;

    let reports = vec![
        ("ana".to_string(), "PG retries".to_string()),
        ("ben".to_string(), "payment gateway docs".to_string()),
    ];
    let summary = ctx.resolve_team_reports(&reports).await.unwrap();

    assert_eq!(summary.project_involvement[0].name, "Payment Gateway");
    assert_eq!(summary.project_involvement[0].value, 2);
    let prompt = &completer.prompts()[0];
    assert!(prompt.contains("[ana] Work done:\nPG retries"));
    assert!(prompt.contains("[ben] Work done:\npayment gateway docs"));
}
