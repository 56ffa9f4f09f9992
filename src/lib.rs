//! # Project Resolver
//!
//! Resolves project mentions in free-text work reports to canonical
//! projects, and keeps the project registry and its review queue.
//!
//! The matching logic lives in `project-resolver-core`; this crate wires
//! it to configuration, HTTP providers, JSON files, a CLI, and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────────┐
//! │ CLI / HTTP   │──▶│ ResolverContext  │──▶│ projects.json      │
//! │ (projres)    │   │ lock + cascade   │   │ *_embeddings.json  │
//! └──────────────┘   └────────┬─────────┘   └────────────────────┘
//!                             │
//!                ┌────────────┴────────────┐
//!                ▼                         ▼
//!        ┌──────────────┐          ┌──────────────┐
//!        │  Embedding   │          │  Completion  │
//!        │ OpenAI/Ollama│          │ OpenAI-compat│
//!        └──────────────┘          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! projres init                                   # create the registry
//! projres project create "Payment Gateway" --alias PG
//! projres embed rebuild                          # embed names and aliases
//! projres resolve "Fixed the PG timeout, started Atlas"
//! projres pending list
//! projres serve                                  # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`embedding`] | HTTP embedding providers |
//! | [`completion`] | HTTP completion providers |
//! | [`store`] | Registry and cache files |
//! | [`context`] | Serialised access to the registry and providers |
//! | [`server`] | HTTP API |

pub mod completion;
pub mod config;
pub mod context;
pub mod embedding;
pub mod logging;
pub mod server;
pub mod store;
