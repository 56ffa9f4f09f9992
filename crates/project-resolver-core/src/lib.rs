//! # Project Resolver Core
//!
//! Provider-agnostic logic for resolving project mentions in free-text
//! work reports: the registry aggregate and its review workflow, the
//! embedding cache, the matching cascade, and the provider traits.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The application
//! crate supplies concrete providers and persistence and drives the
//! operations defined here.
//!
//! ## Cascade
//!
//! ```text
//! raw text ──▶ extract ──▶ rejected? ──▶ exact ──▶ embedding ──▶ disambiguate
//!                              │           │          │  ≥ high        │
//!                              ▼           ▼          ▼                ▼
//!                           dropped     matched    matched     match / new / ignore
//!                                                                      │
//!                                                       pending queue ◀┘
//! ```

pub mod cache;
pub mod cascade;
pub mod completion;
pub mod disambiguate;
pub mod embedding;
pub mod error;
pub mod extract;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod matching;
pub mod models;
pub mod registry;
pub mod report;

pub use cache::{EmbeddingCache, RebuildReport};
pub use cascade::{Cascade, Resolution, ResolutionPlan, TeamSummary};
pub use completion::CompletionProvider;
pub use embedding::EmbeddingProvider;
pub use error::{ProviderError, RegistryError};
pub use matching::MatchThresholds;
pub use models::{PendingMention, Project, ProjectStatus, SubItem};
pub use registry::Registry;
pub use report::{ParsedItem, ParsedReport};
