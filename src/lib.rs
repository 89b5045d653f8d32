//! # QA Sync
//!
//! Keeps Weaviate collections of Q&A entries and tooltip terms in sync with
//! the Markdown files they are authored in.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐   ┌──────────┐
//! │  Markdown   │──▶│    Loader    │──▶│ Reconciliation  │──▶│ Weaviate │
//! │  sources    │   │ ### entries  │   │ engine (core)   │   │  REST v1 │
//! └─────────────┘   └──────────────┘   └─────────────────┘   └──────────┘
//! ```
//!
//! Every run converges each collection to exactly the loaded record set:
//! new entries are inserted, existing ones rewritten, and entries whose
//! heading disappeared are deleted. Identities are derived from the
//! heading text, so reruns are idempotent.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`markdown`] | Level-3-heading entry parser |
//! | [`loader`] | Filesystem walk → desired records |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`weaviate`] | Weaviate `StoreAdapter` |
//! | [`sync`] | Orchestration and summaries |
//!
//! Reconciliation itself lives in the `qa-sync-core` crate.

pub mod config;
pub mod embedding;
pub mod loader;
pub mod markdown;
pub mod sync;
pub mod weaviate;
