//! JSON file persistence for the registry and the embedding cache.
//!
//! Both documents are rewritten whole on every save: the new content goes
//! to a sibling `*.tmp` file which is then renamed over the target, so a
//! reader never sees a half-written document.

use anyhow::{Context, Result};
use project_resolver_core::{EmbeddingCache, Registry};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The registry document on disk.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the registry.
    ///
    /// A missing file yields a fresh registry with the default categories.
    /// A file that cannot be parsed is an error and is left untouched.
    pub fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no registry file, starting fresh");
            return Ok(Registry::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read registry: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry: {}", self.path.display()))
    }

    pub fn save(&self, registry: &Registry) -> Result<()> {
        let json = serde_json::to_string_pretty(registry)?;
        write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write registry: {}", self.path.display()))
    }
}

/// The embedding cache document on disk.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache. Missing or corrupt files yield an empty cache.
    pub fn load(&self) -> EmbeddingCache {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return EmbeddingCache::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read embedding cache, starting empty");
                return EmbeddingCache::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "corrupt embedding cache, starting empty");
            EmbeddingCache::new()
        })
    }

    pub fn save(&self, cache: &EmbeddingCache) -> Result<()> {
        let json = serde_json::to_string(cache)?;
        write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write embedding cache: {}", self.path.display()))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
