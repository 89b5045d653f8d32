//! In-memory [`StoreAdapter`] implementation for testing and offline runs.
//!
//! Collections are `BTreeMap`s keyed by [`Identity`] behind a
//! `std::sync::RwLock`, so paginated listing walks a stable order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{ProvisionError, StoreError};
use crate::identity::Identity;
use crate::models::{Record, Schema};

use super::{InsertOutcome, StoreAdapter};

struct StoredCollection {
    schema: Schema,
    objects: BTreeMap<Identity, Record>,
}

/// In-memory store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredCollection>> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredCollection>> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// All identities currently stored in `collection`, in listing order.
    pub fn identities(&self, collection: &str) -> Vec<Identity> {
        self.read()
            .get(collection)
            .map(|c| c.objects.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Stored properties for one identity.
    pub fn get(&self, collection: &str, identity: Identity) -> Option<Record> {
        self.read()
            .get(collection)
            .and_then(|c| c.objects.get(&identity).cloned())
    }

    /// Schema a collection was created with.
    pub fn schema(&self, collection: &str) -> Option<Schema> {
        self.read().get(collection).map(|c| c.schema.clone())
    }

    /// Write an object directly, bypassing the adapter contract.
    ///
    /// Creates the collection with an empty schema if needed. Useful for
    /// seeding stale remote state.
    pub fn seed(&self, collection: &str, identity: Identity, record: Record) {
        self.write()
            .entry(collection.to_string())
            .or_insert_with(|| StoredCollection {
                schema: Schema::new(),
                objects: BTreeMap::new(),
            })
            .objects
            .insert(identity, record);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_collection(name: &str) -> StoreError {
    StoreError::NotFound(format!("collection `{}`", name))
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(name))
    }

    async fn create_collection(&self, name: &str, schema: &Schema) -> Result<(), ProvisionError> {
        let mut collections = self.write();
        if collections.contains_key(name) {
            return Err(ProvisionError::AlreadyExists(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            StoredCollection {
                schema: schema.clone(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        identity: Identity,
        properties: &Record,
    ) -> Result<InsertOutcome, StoreError> {
        let mut collections = self.write();
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        if stored.objects.contains_key(&identity) {
            return Ok(InsertOutcome::Conflict);
        }
        stored.objects.insert(identity, properties.clone());
        Ok(InsertOutcome::Created)
    }

    async fn update(
        &self,
        collection: &str,
        identity: Identity,
        properties: &Record,
    ) -> Result<(), StoreError> {
        let mut collections = self.write();
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        match stored.objects.get_mut(&identity) {
            Some(existing) => {
                *existing = properties.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "object {} in `{}`",
                identity, collection
            ))),
        }
    }

    async fn fetch_by_id(
        &self,
        collection: &str,
        identity: Identity,
    ) -> Result<Option<Record>, StoreError> {
        let collections = self.read();
        let stored = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(stored.objects.get(&identity).cloned())
    }

    async fn delete_by_id(&self, collection: &str, identity: Identity) -> Result<(), StoreError> {
        let mut collections = self.write();
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        stored.objects.remove(&identity);
        Ok(())
    }

    async fn list_page(
        &self,
        collection: &str,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<Identity>, StoreError> {
        let collections = self.read();
        let stored = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(stored
            .objects
            .keys()
            .skip(offset)
            .take(page_size)
            .copied()
            .collect())
    }
}
