//! Reconciliation engine.
//!
//! Converges one remote collection to exactly match a desired record set.
//!
//! # Algorithm
//!
//! 1. Ensure the collection exists ([`CollectionProvisioner`]).
//! 2. Resolve an [`Identity`] for every desired record. Collisions keep the
//!    later record and are noted in the report; records with an invalid
//!    identity field are reported as failed and skipped.
//! 3. Upsert every desired identity: attempt an insert, and on
//!    [`InsertOutcome::Conflict`] fall back to an update. Every desired
//!    identity that already exists is rewritten, whether or not its content
//!    changed.
//! 4. List the collection exhaustively, page by page, *after* all writes.
//! 5. Delete every listed identity that is not desired.
//!
//! Per-identity failures never abort the run. Only a provisioning failure
//! does, since no data operation is safe without the collection.
//!
//! Operations within the upsert phase and within the delete phase run
//! with bounded concurrency ([`ReconcileOptions::concurrency`]); the phases
//! themselves are strictly ordered.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{ProvisionError, StoreError};
use crate::identity::Identity;
use crate::models::{DesiredCollection, Record};
use crate::plan::{stale_identities, DesiredSet, PlannedSync, ReconciliationPlan};
use crate::provision::CollectionProvisioner;
use crate::report::{Applied, Operation, ReportRecorder, SyncReport};
use crate::store::{InsertOutcome, StoreAdapter};

/// Default number of identities requested per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default number of in-flight per-identity operations.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tunables for a reconciliation run. Zero values are treated as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub page_size: usize,
    pub concurrency: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// List every identity in `collection`.
///
/// Requests pages of `page_size` until a page comes back short or empty.
/// Never relies on a total count. Identities repeated across page
/// boundaries are returned once.
pub async fn list_all_identities(
    store: &dyn StoreAdapter,
    collection: &str,
    page_size: usize,
) -> Result<Vec<Identity>, StoreError> {
    let page_size = page_size.max(1);
    let mut seen = HashSet::new();
    let mut identities = Vec::new();
    let mut offset = 0;

    loop {
        let page = store.list_page(collection, page_size, offset).await?;
        let returned = page.len();
        identities.extend(page.into_iter().filter(|id| seen.insert(*id)));

        if returned < page_size {
            break;
        }
        offset += returned;
    }

    debug!(
        collection,
        pages = offset / page_size + 1,
        identities = identities.len(),
        "listed collection"
    );
    Ok(identities)
}

/// Drives reconciliation of desired collections against one store session.
///
/// The engine holds the session handle it was given; it opens and closes
/// nothing itself.
pub struct ReconciliationEngine {
    store: Arc<dyn StoreAdapter>,
    options: ReconcileOptions,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self {
            store,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    fn page_size(&self) -> usize {
        self.options.page_size.max(1)
    }

    fn concurrency(&self) -> usize {
        self.options.concurrency.max(1)
    }

    /// Reconcile one collection and return its report.
    ///
    /// # Errors
    ///
    /// Only [`ProvisionError`]. Every other failure is in the report.
    pub async fn reconcile(
        &self,
        desired: &DesiredCollection,
    ) -> Result<SyncReport, ProvisionError> {
        let recorder = ReportRecorder::new(&desired.name);
        self.reconcile_into(desired, &recorder).await?;
        Ok(recorder.finish())
    }

    /// Reconcile one collection, recording into a caller-owned recorder.
    ///
    /// Events land in `recorder` as each operation completes, so a caller
    /// that drops this future on a deadline can still
    /// [`snapshot`](ReportRecorder::snapshot) the partial report.
    pub async fn reconcile_into(
        &self,
        desired: &DesiredCollection,
        recorder: &ReportRecorder,
    ) -> Result<(), ProvisionError> {
        let collection = desired.name.as_str();

        CollectionProvisioner::new(self.store.as_ref())
            .ensure(collection, &desired.schema)
            .await?;

        let mut desired_set = DesiredSet::resolve(desired);
        let (collisions, invalid) = desired_set.take_issues();
        for collision in collisions {
            warn!(
                collection,
                identity = %collision.identity,
                kept = %collision.kept_record_summary,
                replaced = %collision.replaced_record_summary,
                "identity collision, later record wins"
            );
            recorder.collision(collision);
        }
        for failure in invalid {
            warn!(collection, reason = %failure.reason, "skipping record");
            recorder.fail(None, failure.operation, failure.reason);
        }

        if desired_set.is_empty() {
            info!(collection, "no desired records, every existing record is stale");
        } else {
            info!(
                collection,
                desired = desired_set.len(),
                "upserting desired records"
            );
            self.upsert_all(collection, &desired_set, recorder).await;
        }

        let existing =
            match list_all_identities(self.store.as_ref(), collection, self.page_size()).await {
                Ok(existing) => existing,
                Err(e) => {
                    warn!(collection, error = %e, "listing failed, skipping deletions");
                    recorder.fail(None, Operation::List, e.to_string());
                    return Ok(());
                }
            };

        let stale = stale_identities(&existing, |id| desired_set.contains(id));
        if !stale.is_empty() {
            info!(collection, stale = stale.len(), "deleting stale records");
        }
        self.delete_all(collection, desired.display_field(), &stale, recorder)
            .await;

        let counts = recorder.snapshot().counts();
        info!(
            collection,
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            failed = counts.failed,
            collisions = counts.collisions,
            "reconciled"
        );
        Ok(())
    }

    /// Compute what [`reconcile`](Self::reconcile) would do, without writing.
    ///
    /// A missing collection is treated as empty and is not created.
    pub async fn plan(&self, desired: &DesiredCollection) -> Result<PlannedSync, StoreError> {
        let collection = desired.name.as_str();
        let desired_set = DesiredSet::resolve(desired);

        let collection_exists = self.store.collection_exists(collection).await?;
        let existing = if collection_exists {
            list_all_identities(self.store.as_ref(), collection, self.page_size()).await?
        } else {
            Vec::new()
        };

        Ok(PlannedSync {
            collection: collection.to_string(),
            collection_exists,
            plan: ReconciliationPlan::compute(desired_set.identities(), &existing),
            collisions: desired_set.collisions().to_vec(),
            invalid: desired_set.invalid().to_vec(),
        })
    }

    async fn upsert_all(
        &self,
        collection: &str,
        desired_set: &DesiredSet<'_>,
        recorder: &ReportRecorder,
    ) {
        stream::iter(desired_set.iter())
            .map(|(identity, record)| async move {
                (identity, self.upsert(collection, identity, record).await)
            })
            .buffer_unordered(self.concurrency())
            .for_each(|(identity, result)| {
                match result {
                    Ok(outcome) => {
                        debug!(collection, %identity, ?outcome, "upserted");
                        recorder.record(identity, outcome);
                    }
                    Err((operation, e)) => {
                        warn!(collection, %identity, ?operation, error = %e, "upsert failed");
                        recorder.fail(Some(identity), operation, e.to_string());
                    }
                }
                futures::future::ready(())
            })
            .await;
    }

    async fn upsert(
        &self,
        collection: &str,
        identity: Identity,
        record: &Record,
    ) -> Result<Applied, (Operation, StoreError)> {
        match self.store.insert(collection, identity, record).await {
            Ok(InsertOutcome::Created) => Ok(Applied::Inserted),
            Ok(InsertOutcome::Conflict) => self
                .store
                .update(collection, identity, record)
                .await
                .map(|()| Applied::Updated)
                .map_err(|e| (Operation::Update, e)),
            Err(e) => Err((Operation::Insert, e)),
        }
    }

    async fn delete_all(
        &self,
        collection: &str,
        display_field: &str,
        stale: &[Identity],
        recorder: &ReportRecorder,
    ) {
        stream::iter(stale.iter().copied())
            .map(|identity| async move {
                (identity, self.delete(collection, display_field, identity).await)
            })
            .buffer_unordered(self.concurrency())
            .for_each(|(identity, result)| {
                match result {
                    Ok(()) => {
                        recorder.record(identity, Applied::Deleted);
                    }
                    Err(e) => {
                        warn!(collection, %identity, error = %e, "delete failed");
                        recorder.fail(Some(identity), Operation::Delete, e.to_string());
                    }
                }
                futures::future::ready(())
            })
            .await;
    }

    async fn delete(
        &self,
        collection: &str,
        display_field: &str,
        identity: Identity,
    ) -> Result<(), StoreError> {
        // The fetch only labels the log line; its failure never blocks the delete.
        let label = match self.store.fetch_by_id(collection, identity).await {
            Ok(Some(record)) => record.summary(display_field),
            Ok(None) => "<already absent>".to_string(),
            Err(e) => {
                debug!(collection, %identity, error = %e, "fetch before delete failed");
                "<unavailable>".to_string()
            }
        };

        self.store.delete_by_id(collection, identity).await?;
        info!(collection, %identity, record = %label, "deleted stale record");
        Ok(())
    }
}
