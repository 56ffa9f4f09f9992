//! The embedding cache aggregate and its builder.
//!
//! The cache maps a project name or alias to its embedding vector. It is
//! advisory: a missing entry only means the embedding stage cannot match
//! through that key. It is persisted independently of the registry so it
//! can be rebuilt without touching it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::{embed_chunked, EmbeddingProvider};
use crate::registry::Registry;

/// Default number of texts per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Text → vector map. Empty vectors count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingCache {
    entries: BTreeMap<String, Vec<f32>>,
}

/// Outcome of a cache rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Texts that had no usable vector before the rebuild.
    pub requested: usize,
    /// Texts that received a vector.
    pub embedded: usize,
    /// Texts whose batch failed; retried by the next rebuild.
    pub failed: usize,
    /// Entries in the cache afterwards.
    pub total_entries: usize,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &str) -> Option<&[f32]> {
        self.entries
            .get(text)
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }

    /// Store a vector; empty vectors are ignored.
    pub fn insert(&mut self, text: impl Into<String>, vector: Vec<f32>) {
        if !vector.is_empty() {
            self.entries.insert(text.into(), vector);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Names and aliases of active projects without a usable vector,
    /// in registry order, without duplicates.
    pub fn missing_texts(&self, registry: &Registry) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for key in registry.active_projects().flat_map(|p| p.keys()) {
            if self.get(key).is_none() && !missing.iter().any(|m| m == key) {
                missing.push(key.to_string());
            }
        }
        missing
    }

    /// Embed every missing name and alias, `batch_size` texts per request.
    ///
    /// Each batch is merged as soon as it returns, so a failing batch costs
    /// only its own texts.
    pub async fn rebuild(
        &mut self,
        registry: &Registry,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> RebuildReport {
        let texts = self.missing_texts(registry);
        let mut report = RebuildReport {
            requested: texts.len(),
            ..RebuildReport::default()
        };
        if texts.is_empty() {
            debug!("embedding cache already covers every active name and alias");
            report.total_entries = self.len();
            return report;
        }

        info!(count = texts.len(), batch_size, "embedding project names and aliases");
        for chunk in texts.chunks(batch_size.max(1)) {
            let vectors = embed_chunked(provider, chunk, chunk.len()).await;
            for (text, vector) in chunk.iter().zip(vectors) {
                if vector.is_empty() {
                    report.failed += 1;
                } else {
                    self.insert(text.clone(), vector);
                    report.embedded += 1;
                }
            }
        }
        report.total_entries = self.len();
        info!(
            embedded = report.embedded,
            failed = report.failed,
            total = report.total_entries,
            "embedding cache updated"
        );
        report
    }

    /// Discard every entry, then [`rebuild`](Self::rebuild).
    pub async fn force_rebuild(
        &mut self,
        registry: &Registry,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> RebuildReport {
        self.clear();
        self.rebuild(registry, provider, batch_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::StaticEmbedder;
    use crate::models::{Project, ProjectStatus};
    use crate::registry::ProjectUpdate;

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.create_project(Project::new("Payment Gateway", "Other").with_aliases(["PG"]))
            .unwrap();
        r.create_project(Project::new("Ops Dashboard", "Other")).unwrap();
        r.create_project(Project::new("Legacy CRM", "Other")).unwrap();
        r.update_project(
            "Legacy CRM",
            ProjectUpdate {
                status: Some(ProjectStatus::Archived),
                ..Default::default()
            },
        )
        .unwrap();
        r
    }

    fn embedder() -> StaticEmbedder {
        StaticEmbedder::new()
            .with("Payment Gateway", vec![1.0, 0.0])
            .with("PG", vec![0.9, 0.1])
            .with("Ops Dashboard", vec![0.0, 1.0])
    }

    #[test]
    fn missing_texts_skip_archived_and_cached() {
        let mut cache = EmbeddingCache::new();
        cache.insert("PG", vec![1.0]);
        assert_eq!(cache.missing_texts(&registry()), vec!["Payment Gateway", "Ops Dashboard"]);
    }

    #[test]
    fn empty_vectors_are_absent() {
        let mut cache = EmbeddingCache::new();
        cache.insert("x", Vec::new());
        assert!(cache.get("x").is_none());
        assert!(cache.is_empty());

        let loaded: EmbeddingCache = serde_json::from_str(r#"{"y": []}"#).unwrap();
        assert!(loaded.get("y").is_none());
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn rebuild_only_embeds_missing() {
        let provider = embedder();
        let mut cache = EmbeddingCache::new();
        cache.insert("PG", vec![0.5, 0.5]);

        let report = cache.rebuild(&registry(), &provider, 10).await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.embedded, 2);
        assert_eq!(report.total_entries, 3);
        assert_eq!(cache.get("PG"), Some(&[0.5f32, 0.5][..]));
    }

    #[tokio::test]
    async fn failed_batch_keeps_earlier_batches() {
        let provider = embedder().failing_batch(2);
        let mut cache = EmbeddingCache::new();

        let report = cache.rebuild(&registry(), &provider, 2).await;
        assert_eq!(report.requested, 3);
        assert_eq!(report.embedded, 2);
        assert_eq!(report.failed, 1);
        assert!(cache.get("Payment Gateway").is_some());
        assert!(cache.get("Ops Dashboard").is_none());

        // The failed text is retried next time.
        let retry = cache.rebuild(&registry(), &embedder(), 2).await;
        assert_eq!(retry.requested, 1);
        assert_eq!(retry.embedded, 1);
    }

    #[tokio::test]
    async fn force_rebuild_discards_stale_entries() {
        let mut cache = EmbeddingCache::new();
        cache.insert("Removed Project", vec![1.0, 1.0]);
        cache.insert("PG", vec![0.0, 0.0, 1.0]);

        let report = cache.force_rebuild(&registry(), &embedder(), 10).await;
        assert_eq!(report.requested, 3);
        assert!(cache.get("Removed Project").is_none());
        assert_eq!(cache.get("PG"), Some(&[0.9f32, 0.1][..]));
    }
}
