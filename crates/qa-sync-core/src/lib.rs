//! # QA Sync Core
//!
//! Reconciliation logic for keeping a remote keyed object store in sync
//! with a locally authored desired record set: deterministic identity,
//! desired-vs-existing diffing, and the insert/update/delete apply phase.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The store is
//! reached only through the [`store::StoreAdapter`] trait.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Record`, `FieldValue`, `Schema`, `DesiredCollection` |
//! | [`identity`] | Normalization and deterministic `Identity` derivation |
//! | [`error`] | Error taxonomy |
//! | [`store`] | `StoreAdapter` trait and in-memory implementation |
//! | [`provision`] | Create-if-absent collection bootstrap |
//! | [`plan`] | Desired-set resolution and `ReconciliationPlan` |
//! | [`report`] | `SyncReport` and its recorder |
//! | [`engine`] | `ReconciliationEngine` |

pub mod engine;
pub mod error;
pub mod identity;
pub mod models;
pub mod plan;
pub mod provision;
pub mod report;
pub mod store;

pub use engine::{ReconcileOptions, ReconciliationEngine};
pub use identity::Identity;
pub use models::{DataType, DesiredCollection, FieldValue, Record, Schema};
pub use report::SyncReport;
pub use store::{InsertOutcome, StoreAdapter};
