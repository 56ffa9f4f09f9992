//! Deterministic in-process providers for tests.
//!
//! Compiled for this crate's own tests and, outside it, only with the
//! `test-util` feature.
//!
//! [`StaticEmbedder`] answers from a fixed text → vector table and
//! [`ScriptedCompleter`] replays canned completions in order. Both count
//! their calls so tests can assert that a stage was (or was not) reached.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::ProviderError;

/// Embedding provider backed by a lookup table.
///
/// Unknown texts embed to an empty vector.
#[derive(Default)]
pub struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    unavailable: bool,
    failing_batch: Option<usize>,
    calls: AtomicUsize,
    batches: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Every call fails with [`ProviderError::Unavailable`].
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// The `n`-th `embed_batch` call (1-based) fails.
    pub fn failing_batch(mut self, n: usize) -> Self {
        self.failing_batch = Some(n);
        self
    }

    /// Total number of `embed` and `embed_batch` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, text: &str) -> Vec<f32> {
        self.vectors.get(text).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn model_name(&self) -> &str {
        "static"
    }

    fn dims(&self) -> usize {
        self.vectors.values().map(Vec::len).max().unwrap_or(0)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(ProviderError::Unavailable("static embedder offline".into()));
        }
        Ok(self.lookup(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.unavailable || self.failing_batch == Some(n) {
            return Err(ProviderError::Unavailable(format!("batch {n} failed")));
        }
        Ok(texts.iter().map(|t| self.lookup(t)).collect())
    }
}

/// Completion provider that replays canned responses in order.
///
/// Once the script runs out every call fails with
/// [`ProviderError::Unavailable`]; an empty scripted response fails with
/// [`ProviderError::Empty`].
#[derive(Default)]
pub struct ScriptedCompleter {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A completer that is always unavailable.
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        match next {
            Some(text) if text.trim().is_empty() => Err(ProviderError::Empty),
            Some(text) => Ok(text),
            None => Err(ProviderError::Unavailable("script exhausted".into())),
        }
    }
}
