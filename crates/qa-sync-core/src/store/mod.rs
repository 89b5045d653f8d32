//! Store abstraction consumed by the reconciliation engine.
//!
//! The [`StoreAdapter`] trait is the engine's only view of the remote
//! keyed object store. Implementations own connection management; the
//! engine receives one adapter per run as an explicit session handle and
//! never reaches for global client state.
//!
//! Implementations must be `Send + Sync`: independent collections may be
//! reconciled concurrently over the same adapter, and per-identity
//! operations within a collection are dispatched with bounded parallelism.

pub mod memory;

use async_trait::async_trait;

use crate::error::{ProvisionError, StoreError};
use crate::identity::Identity;
use crate::models::{Record, Schema};

/// Result of an insert that reached the store.
///
/// A conflict is ordinary data: the engine branches on it and falls back
/// to an update for that identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The identity already exists in the collection.
    Conflict,
}

/// Abstract keyed object store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`collection_exists`](StoreAdapter::collection_exists) | Check for a collection |
/// | [`create_collection`](StoreAdapter::create_collection) | Create a collection with a schema |
/// | [`insert`](StoreAdapter::insert) | Create an object under an identity |
/// | [`update`](StoreAdapter::update) | Replace an existing object's properties |
/// | [`fetch_by_id`](StoreAdapter::fetch_by_id) | Point lookup |
/// | [`delete_by_id`](StoreAdapter::delete_by_id) | Remove an object |
/// | [`list_page`](StoreAdapter::list_page) | One page of member identities |
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create a collection.
    ///
    /// Must return [`ProvisionError::AlreadyExists`] when the store reports
    /// that the collection exists, so the provisioner can tell the benign
    /// check-then-create race apart from real failures.
    async fn create_collection(&self, name: &str, schema: &Schema) -> Result<(), ProvisionError>;

    async fn insert(
        &self,
        collection: &str,
        identity: Identity,
        properties: &Record,
    ) -> Result<InsertOutcome, StoreError>;

    async fn update(
        &self,
        collection: &str,
        identity: Identity,
        properties: &Record,
    ) -> Result<(), StoreError>;

    async fn fetch_by_id(
        &self,
        collection: &str,
        identity: Identity,
    ) -> Result<Option<Record>, StoreError>;

    /// Delete an object. Deleting an already-absent identity succeeds.
    async fn delete_by_id(&self, collection: &str, identity: Identity) -> Result<(), StoreError>;

    /// Return up to `page_size` identities starting at `offset`.
    ///
    /// A page shorter than `page_size` (or empty) marks the end of the
    /// collection. No total count is assumed.
    async fn list_page(
        &self,
        collection: &str,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<Identity>, StoreError>;
}
