//! Structured result of one reconciliation run.
//!
//! A [`ReportRecorder`] accumulates events while the engine runs. It is
//! append-only, shared across concurrent per-identity operations, and can
//! be snapshotted at any point, so a caller that cancels a run still gets
//! the partial [`SyncReport`].
//!
//! Each identity settles into at most one terminal [`Outcome`] per run.
//!
//! # Serialized shape
//!
//! ```json
//! {
//!   "collection": "QAEntry",
//!   "inserted": ["…"], "updated": [], "deleted": [],
//!   "failed": [{"identity": null, "operation": "resolve", "reason": "…"}],
//!   "collisions": [{"identity": "…", "keptRecordSummary": "…", "replacedRecordSummary": "…"}],
//!   "cancelled": false,
//!   "startedAt": "…", "finishedAt": "…"
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::identity::Identity;

/// Terminal state of one identity within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Inserted,
    Updated,
    Deleted,
    Failed,
}

/// A write that took effect. Failures go through [`ReportRecorder::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Updated,
    Deleted,
}

impl From<Applied> for Outcome {
    fn from(applied: Applied) -> Self {
        match applied {
            Applied::Inserted => Outcome::Inserted,
            Applied::Updated => Outcome::Updated,
            Applied::Deleted => Outcome::Deleted,
        }
    }
}

/// The operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Resolve,
    Insert,
    Update,
    Delete,
    List,
}

/// A contained per-identity (or per-phase) failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    /// `None` when no identity could be derived or the failure is not tied
    /// to one identity (e.g. listing).
    pub identity: Option<Identity>,
    pub operation: Operation,
    pub reason: String,
}

/// Two desired records that resolved to the same identity.
///
/// The later record in loader order wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collision {
    pub identity: Identity,
    pub kept_record_summary: String,
    pub replaced_record_summary: String,
}

/// Per-outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub collisions: usize,
}

/// Caller-visible result of reconciling one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub collection: String,
    inserted: Vec<Identity>,
    updated: Vec<Identity>,
    deleted: Vec<Identity>,
    failed: Vec<Failure>,
    collisions: Vec<Collision>,
    cancelled: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    settled: HashMap<Identity, Outcome>,
}

impl SyncReport {
    fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            inserted: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            collisions: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
            settled: HashMap::new(),
        }
    }

    pub fn inserted(&self) -> &[Identity] {
        &self.inserted
    }

    pub fn updated(&self) -> &[Identity] {
        &self.updated
    }

    pub fn deleted(&self) -> &[Identity] {
        &self.deleted
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failed
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Terminal outcome recorded for `identity`, if any.
    pub fn outcome(&self, identity: &Identity) -> Option<Outcome> {
        self.settled.get(identity).copied()
    }

    pub fn counts(&self) -> Counts {
        Counts {
            inserted: self.inserted.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
            failed: self.failed.len(),
            collisions: self.collisions.len(),
        }
    }

    /// True when the run completed with no failures.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    fn settle(&mut self, identity: Identity, outcome: Outcome) -> bool {
        if let Some(previous) = self.settled.get(&identity) {
            warn!(
                collection = %self.collection,
                %identity,
                ?previous,
                ignored = ?outcome,
                "identity already settled this run"
            );
            return false;
        }
        self.settled.insert(identity, outcome);
        true
    }
}

/// Shared, append-only accumulator for a [`SyncReport`].
pub struct ReportRecorder {
    inner: Mutex<SyncReport>,
}

impl ReportRecorder {
    pub fn new(collection: &str) -> Self {
        Self {
            inner: Mutex::new(SyncReport::new(collection)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncReport> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successful write.
    ///
    /// Returns `false` (and records nothing) if `identity` already settled.
    pub fn record(&self, identity: Identity, applied: Applied) -> bool {
        let mut report = self.lock();
        if !report.settle(identity, applied.into()) {
            return false;
        }
        match applied {
            Applied::Inserted => report.inserted.push(identity),
            Applied::Updated => report.updated.push(identity),
            Applied::Deleted => report.deleted.push(identity),
        }
        true
    }

    /// Record a failure.
    ///
    /// Failures with an identity settle that identity; failures without one
    /// (unresolvable records, listing errors) are appended unconditionally.
    pub fn fail(
        &self,
        identity: Option<Identity>,
        operation: Operation,
        reason: impl Into<String>,
    ) {
        let mut report = self.lock();
        if let Some(id) = identity {
            if !report.settle(id, Outcome::Failed) {
                return;
            }
        }
        report.failed.push(Failure {
            identity,
            operation,
            reason: reason.into(),
        });
    }

    pub fn collision(&self, collision: Collision) {
        self.lock().collisions.push(collision);
    }

    /// Mark the run as cancelled. Already-recorded events are kept.
    pub fn cancel(&self) {
        self.lock().cancelled = true;
    }

    /// Copy of the report as it stands now.
    pub fn snapshot(&self) -> SyncReport {
        let mut report = self.lock().clone();
        report.finished_at = Some(Utc::now());
        report
    }

    /// Consume the recorder and return the final report.
    pub fn finish(self) -> SyncReport {
        let mut report = self
            .inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        report.finished_at = Some(Utc::now());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> Identity {
        Identity::derive(value).unwrap()
    }

    #[test]
    fn test_counts_reflect_outcomes() {
        let recorder = ReportRecorder::new("QAEntry");
        recorder.record(id("a"), Applied::Inserted);
        recorder.record(id("b"), Applied::Updated);
        recorder.record(id("c"), Applied::Deleted);
        recorder.fail(Some(id("d")), Operation::Insert, "boom");
        let report = recorder.finish();

        let counts = report.counts();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.failed, 1);
        assert!(!report.is_success());
        assert!(report.finished_at().is_some());
    }

    #[test]
    fn test_identity_settles_once() {
        let recorder = ReportRecorder::new("QAEntry");
        assert!(recorder.record(id("a"), Applied::Inserted));
        assert!(!recorder.record(id("a"), Applied::Deleted));
        recorder.fail(Some(id("a")), Operation::Delete, "ignored");
        let report = recorder.finish();

        assert_eq!(report.inserted(), &[id("a")]);
        assert!(report.deleted().is_empty());
        assert!(report.failures().is_empty());
        assert_eq!(report.outcome(&id("a")), Some(Outcome::Inserted));
    }

    #[test]
    fn test_failed_identity_blocks_later_success() {
        let recorder = ReportRecorder::new("QAEntry");
        recorder.fail(Some(id("a")), Operation::Update, "503");
        assert!(!recorder.record(id("a"), Applied::Updated));
        let report = recorder.finish();

        assert!(report.updated().is_empty());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].reason, "503");
        assert_eq!(report.outcome(&id("a")), Some(Outcome::Failed));
    }

    #[test]
    fn test_failures_without_identity_accumulate() {
        let recorder = ReportRecorder::new("QAEntry");
        recorder.fail(None, Operation::Resolve, "record #0");
        recorder.fail(None, Operation::Resolve, "record #3");
        assert_eq!(recorder.finish().failures().len(), 2);
    }

    #[test]
    fn test_cancelled_snapshot_keeps_progress() {
        let recorder = ReportRecorder::new("QAEntry");
        recorder.record(id("a"), Applied::Inserted);
        recorder.cancel();
        let report = recorder.snapshot();
        assert!(report.cancelled());
        assert!(!report.is_success());
        assert_eq!(report.inserted().len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let recorder = ReportRecorder::new("QAEntry");
        recorder.record(id("a"), Applied::Inserted);
        recorder.fail(None, Operation::Resolve, "bad record");
        recorder.collision(Collision {
            identity: id("foo"),
            kept_record_summary: "foo ".to_string(),
            replaced_record_summary: "Foo".to_string(),
        });
        let json = serde_json::to_value(recorder.finish()).unwrap();

        assert_eq!(json["collection"], "QAEntry");
        assert_eq!(json["inserted"][0], id("a").to_string());
        assert_eq!(json["updated"], serde_json::json!([]));
        assert_eq!(json["deleted"], serde_json::json!([]));
        assert_eq!(json["failed"][0]["identity"], serde_json::Value::Null);
        assert_eq!(json["failed"][0]["operation"], "resolve");
        assert_eq!(json["collisions"][0]["keptRecordSummary"], "foo ");
        assert_eq!(json["cancelled"], false);
        assert!(json.get("settled").is_none());
    }
}
