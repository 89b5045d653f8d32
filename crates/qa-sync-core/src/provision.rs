//! Collection bootstrap.
//!
//! [`CollectionProvisioner::ensure`] makes sure a collection exists before
//! any data operation touches it. Existing collections are trusted as-is:
//! the schema is not compared or migrated.

use tracing::{debug, info};

use crate::error::ProvisionError;
use crate::models::Schema;
use crate::store::StoreAdapter;

/// Ensures collections exist on a [`StoreAdapter`].
pub struct CollectionProvisioner<'a> {
    store: &'a dyn StoreAdapter,
}

impl<'a> CollectionProvisioner<'a> {
    pub fn new(store: &'a dyn StoreAdapter) -> Self {
        Self { store }
    }

    /// Create `name` with `schema` unless it already exists.
    ///
    /// Idempotent. If creation reports [`ProvisionError::AlreadyExists`]
    /// (another writer created it between the existence check and the
    /// create call), that is success.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::Lookup`] or [`ProvisionError::Create`]. Either is
    /// fatal for the collection's reconciliation.
    pub async fn ensure(&self, name: &str, schema: &Schema) -> Result<(), ProvisionError> {
        let exists = self
            .store
            .collection_exists(name)
            .await
            .map_err(|source| ProvisionError::Lookup {
                collection: name.to_string(),
                source,
            })?;

        if exists {
            debug!(collection = name, "collection present, schema left untouched");
            return Ok(());
        }

        match self.store.create_collection(name, schema).await {
            Ok(()) => {
                info!(
                    collection = name,
                    properties = schema.properties().len(),
                    "created collection"
                );
                Ok(())
            }
            Err(ProvisionError::AlreadyExists(_)) => {
                debug!(collection = name, "collection created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
