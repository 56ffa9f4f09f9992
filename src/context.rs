//! The process-wide resolver context.
//!
//! [`ResolverContext`] owns the configuration, the providers, and both
//! stores. It is the single place that serialises registry
//! read-modify-write: every mutation takes the registry lock, reloads the
//! document, applies one operation, and saves before releasing it. The
//! lock is never held across a provider call; resolution plans against a
//! snapshot and only takes the lock to apply.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use project_resolver_core::cascade::TeamSummary;
use project_resolver_core::registry::{ProjectUpdate, SubItemUpdate};
use project_resolver_core::report::parse_report;
use project_resolver_core::{
    Cascade, CompletionProvider, EmbeddingCache, EmbeddingProvider, ParsedReport, PendingMention,
    Project, RebuildReport, Registry, RegistryError, Resolution, SubItem,
};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::completion::{create_completion_provider, DisabledCompleter};
use crate::config::Config;
use crate::embedding::{create_provider, DisabledProvider};
use crate::store::{CacheStore, RegistryStore};

pub struct ResolverContext {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    registry: RegistryStore,
    cache_store: CacheStore,
    cache: RwLock<Arc<EmbeddingCache>>,
    registry_lock: Mutex<()>,
    rebuild_lock: Mutex<()>,
}

impl ResolverContext {
    /// Build a context with the providers named in `config`.
    ///
    /// A provider that cannot be constructed (typically a missing API key)
    /// is replaced by the disabled one so admin operations keep working.
    pub fn from_config(config: Config) -> Self {
        let embedder: Arc<dyn EmbeddingProvider> = match create_provider(&config.embedding) {
            Ok(provider) => Arc::from(provider),
            Err(e) => {
                warn!(error = %e, "embedding provider unavailable, semantic matching disabled");
                Arc::new(DisabledProvider)
            }
        };
        let completer: Arc<dyn CompletionProvider> =
            match create_completion_provider(&config.completion) {
                Ok(provider) => Arc::from(provider),
                Err(e) => {
                    warn!(error = %e, "completion provider unavailable, extraction disabled");
                    Arc::new(DisabledCompleter)
                }
            };
        Self::new(config, embedder, completer)
    }

    /// Build a context around explicit providers.
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Self {
        let registry = RegistryStore::new(&config.registry.path);
        let cache_store = CacheStore::new(config.registry.embeddings_path());
        let cache = cache_store.load();
        Self {
            config,
            embedder,
            completer,
            registry,
            cache_store,
            cache: RwLock::new(Arc::new(cache)),
            registry_lock: Mutex::new(()),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Write a fresh registry if none exists. Returns `true` if created.
    pub async fn init(&self) -> Result<bool> {
        let _guard = self.registry_lock.lock().await;
        if self.registry.exists() {
            return Ok(false);
        }
        self.registry.save(&Registry::new())?;
        info!(path = %self.registry.path().display(), "registry initialised");
        Ok(true)
    }

    // ─── Registry access ───────────────────────────────────────────────

    /// Run `op` against the current registry without writing.
    pub async fn read<T>(&self, op: impl FnOnce(&Registry) -> T) -> Result<T> {
        let registry = self.registry.load()?;
        Ok(op(&registry))
    }

    /// Load, apply `op`, and save, all under the registry lock.
    ///
    /// Nothing is written when `op` fails; the [`RegistryError`] is
    /// returned inside the `anyhow::Error` so callers can downcast it.
    pub async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Registry) -> Result<T, RegistryError>,
    ) -> Result<T> {
        let _guard = self.registry_lock.lock().await;
        let mut registry = self.registry.load()?;
        let value = op(&mut registry)?;
        self.registry.save(&registry)?;
        Ok(value)
    }

    /// Like [`mutate`](Self::mutate), then refresh the embedding cache if
    /// `embedding.auto_refresh` is set.
    async fn mutate_names<T>(
        &self,
        op: impl FnOnce(&mut Registry) -> Result<T, RegistryError>,
    ) -> Result<T> {
        let value = self.mutate(op).await?;
        if self.config.embedding.auto_refresh {
            if let Err(e) = self.rebuild_embeddings(false).await {
                warn!(error = %e, "embedding refresh failed");
            }
        }
        Ok(value)
    }

    // ─── Resolution ────────────────────────────────────────────────────

    async fn cache_snapshot(&self) -> Arc<EmbeddingCache> {
        self.cache.read().await.clone()
    }

    /// Resolve the project mentions in `text` and persist what was learned.
    pub async fn resolve_mentions(&self, text: &str) -> Result<Resolution> {
        let snapshot = self.registry.load()?;
        let cache = self.cache_snapshot().await;
        let cascade = Cascade::new(
            self.embedder.as_ref(),
            self.completer.as_ref(),
            &self.config.matching,
        );
        let plan = cascade.plan(text, &snapshot, &cache, Self::today()).await;

        if !plan.mutates() {
            let mut untouched = snapshot;
            return Ok(plan.apply(&mut untouched));
        }

        let resolution = self.mutate(|registry| Ok(plan.apply(registry))).await?;
        if self.config.embedding.auto_refresh && !resolution.learned_aliases.is_empty() {
            if let Err(e) = self.rebuild_embeddings(false).await {
                warn!(error = %e, "embedding refresh failed");
            }
        }
        Ok(resolution)
    }

    /// Resolve several users' reports in one pass and summarise involvement.
    pub async fn resolve_team_reports(&self, reports: &[(String, String)]) -> Result<TeamSummary> {
        let text = project_resolver_core::cascade::team_text(reports);
        let resolution = self.resolve_mentions(&text).await?;
        Ok(TeamSummary::from_resolution(resolution))
    }

    pub async fn parse_report(
        &self,
        this_week: Option<&str>,
        next_week: Option<&str>,
    ) -> Result<ParsedReport> {
        let snapshot = self.registry.load()?;
        Ok(parse_report(self.completer.as_ref(), &snapshot, this_week, next_week).await)
    }

    // ─── End-user suggestions ──────────────────────────────────────────

    pub async fn suggest_project(&self, name: &str, suggested_by: Option<&str>) -> Result<()> {
        let today = Self::today();
        self.mutate(|r| r.suggest_project(name, suggested_by, today))
            .await
    }

    pub async fn suggest_sub_item(
        &self,
        parent: &str,
        name: &str,
        suggested_by: Option<&str>,
    ) -> Result<()> {
        let today = Self::today();
        self.mutate(|r| r.suggest_sub_item(parent, name, suggested_by, today))
            .await
    }

    // ─── Review workflow ───────────────────────────────────────────────

    pub async fn pending(&self) -> Result<Vec<PendingMention>> {
        self.read(|r| r.pending().to_vec()).await
    }

    pub async fn approve(&self, name: &str, category: Option<&str>) -> Result<()> {
        self.mutate_names(|r| r.approve(name, category)).await
    }

    pub async fn merge(&self, pending_name: &str, target: &str) -> Result<()> {
        self.mutate_names(|r| r.merge(pending_name, target)).await
    }

    pub async fn reject(&self, name: &str) -> Result<()> {
        self.mutate(|r| r.reject(name)).await
    }

    pub async fn approve_sub_item(&self, parent: &str, name: &str) -> Result<()> {
        self.mutate(|r| r.approve_sub_item(parent, name)).await
    }

    pub async fn reject_sub_item(&self, parent: &str, name: &str) -> Result<()> {
        self.mutate(|r| r.reject_sub_item(parent, name)).await
    }

    pub async fn rejected(&self) -> Result<Vec<String>> {
        self.read(|r| r.rejected().to_vec()).await
    }

    pub async fn unreject(&self, name: &str) -> Result<()> {
        self.mutate(|r| r.unreject(name)).await
    }

    // ─── Project administration ────────────────────────────────────────

    pub async fn projects(&self, include_archived: bool) -> Result<Vec<Project>> {
        self.read(|r| {
            r.projects()
                .iter()
                .filter(|p| include_archived || p.is_active())
                .cloned()
                .collect()
        })
        .await
    }

    pub async fn project(&self, name: &str) -> Result<Project> {
        let found = self.read(|r| r.project(name).cloned()).await?;
        Ok(found.ok_or_else(|| RegistryError::ProjectNotFound(name.to_string()))?)
    }

    pub async fn create_project(&self, project: Project) -> Result<()> {
        self.mutate_names(|r| r.create_project(project)).await
    }

    pub async fn update_project(&self, name: &str, update: ProjectUpdate) -> Result<Project> {
        self.mutate_names(|r| r.update_project(name, update).cloned())
            .await
    }

    pub async fn rename_project(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.mutate_names(|r| r.rename_project(old_name, new_name))
            .await
    }

    pub async fn delete_project(&self, name: &str) -> Result<Project> {
        self.mutate(|r| r.delete_project(name)).await
    }

    pub async fn add_alias(&self, project: &str, alias: &str) -> Result<bool> {
        self.mutate_names(|r| r.add_alias(project, alias)).await
    }

    pub async fn add_sub_item(&self, project: &str, name: &str, description: &str) -> Result<()> {
        self.mutate(|r| r.add_sub_item(project, name, description))
            .await
    }

    pub async fn remove_sub_item(&self, project: &str, name: &str) -> Result<SubItem> {
        self.mutate(|r| r.remove_sub_item(project, name)).await
    }

    pub async fn update_sub_item(
        &self,
        project: &str,
        name: &str,
        update: SubItemUpdate,
    ) -> Result<()> {
        self.mutate(|r| r.update_sub_item(project, name, update))
            .await
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        self.read(|r| r.categories().to_vec()).await
    }

    pub async fn add_category(&self, category: &str) -> Result<()> {
        self.mutate(|r| r.add_category(category)).await
    }

    pub async fn remove_category(&self, category: &str) -> Result<()> {
        self.mutate(|r| r.remove_category(category)).await
    }

    // ─── Embedding cache ───────────────────────────────────────────────

    /// Embed every active name and alias missing from the cache, or
    /// everything when `force` is set, then persist the cache.
    pub async fn rebuild_embeddings(&self, force: bool) -> Result<RebuildReport> {
        let _guard = self.rebuild_lock.lock().await;
        let snapshot = self.registry.load()?;
        let mut cache = (*self.cache_snapshot().await).clone();
        let batch_size = self.config.embedding.batch_size;

        let report = if force {
            cache
                .force_rebuild(&snapshot, self.embedder.as_ref(), batch_size)
                .await
        } else {
            cache
                .rebuild(&snapshot, self.embedder.as_ref(), batch_size)
                .await
        };

        if force || report.embedded > 0 {
            self.cache_store.save(&cache)?;
        }
        *self.cache.write().await = Arc::new(cache);
        Ok(report)
    }
}
