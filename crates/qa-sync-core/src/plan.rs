//! Desired-set resolution and the desired-vs-existing diff.
//!
//! [`DesiredSet::resolve`] assigns identities to the loader's records,
//! collapsing collisions (last record wins) and setting aside records with
//! no derivable identity. [`ReconciliationPlan::compute`] splits identities
//! into three disjoint sets against a listing of the store.

use std::collections::{HashMap, HashSet};

use crate::identity::{self, Identity};
use crate::models::{DesiredCollection, Record};
use crate::report::{Collision, Failure, Operation};

/// Identity → record mapping for one collection's desired records.
///
/// Iteration follows the position at which each identity first appeared
/// in loader order; the record stored is the last one seen.
#[derive(Debug)]
pub struct DesiredSet<'a> {
    order: Vec<Identity>,
    records: HashMap<Identity, &'a Record>,
    collisions: Vec<Collision>,
    invalid: Vec<Failure>,
}

impl<'a> DesiredSet<'a> {
    pub fn resolve(desired: &'a DesiredCollection) -> Self {
        let display_field = desired.display_field();
        let mut order = Vec::with_capacity(desired.records.len());
        let mut records: HashMap<Identity, &'a Record> = HashMap::new();
        let mut collisions = Vec::new();
        let mut invalid = Vec::new();

        for (index, record) in desired.records.iter().enumerate() {
            let id = match identity::resolve(record, &desired.identity_field) {
                Ok(id) => id,
                Err(e) => {
                    invalid.push(Failure {
                        identity: None,
                        operation: Operation::Resolve,
                        reason: format!("record #{}: {}", index, e),
                    });
                    continue;
                }
            };

            match records.insert(id, record) {
                Some(replaced) => collisions.push(Collision {
                    identity: id,
                    kept_record_summary: record.summary(display_field),
                    replaced_record_summary: replaced.summary(display_field),
                }),
                None => order.push(id),
            }
        }

        Self {
            order,
            records,
            collisions,
            invalid,
        }
    }

    /// Distinct desired identities.
    pub fn identities(&self) -> &[Identity] {
        &self.order
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.records.contains_key(identity)
    }

    pub fn get(&self, identity: &Identity) -> Option<&'a Record> {
        self.records.get(identity).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Identity, &'a Record)> + '_ {
        self.order.iter().map(|id| (*id, self.records[id]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Records skipped because their identity field was invalid.
    pub fn invalid(&self) -> &[Failure] {
        &self.invalid
    }

    /// Split into `(collisions, invalid)` for recording.
    pub(crate) fn take_issues(&mut self) -> (Vec<Collision>, Vec<Failure>) {
        (
            std::mem::take(&mut self.collisions),
            std::mem::take(&mut self.invalid),
        )
    }
}

/// Three disjoint identity sets derived from desired and existing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    /// Desired, not present in the store.
    pub to_insert: Vec<Identity>,
    /// Desired and present. Always written; there is no content comparison.
    pub to_update: Vec<Identity>,
    /// Present, not desired.
    pub to_delete: Vec<Identity>,
}

impl ReconciliationPlan {
    /// Diff `desired` against `existing`.
    ///
    /// Duplicates in `existing` (page-boundary drift) are collapsed.
    pub fn compute(desired: &[Identity], existing: &[Identity]) -> Self {
        let existing_set: HashSet<&Identity> = existing.iter().collect();
        let desired_set: HashSet<&Identity> = desired.iter().collect();

        let (to_update, to_insert): (Vec<Identity>, Vec<Identity>) = desired
            .iter()
            .copied()
            .partition(|id| existing_set.contains(id));

        let to_delete = stale_identities(existing, |id| desired_set.contains(id));

        Self {
            to_insert,
            to_update,
            to_delete,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Outcome of a dry run: the plan plus what resolution set aside.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSync {
    pub collection: String,
    /// Whether the collection exists yet. A dry run never creates it.
    pub collection_exists: bool,
    pub plan: ReconciliationPlan,
    pub collisions: Vec<Collision>,
    pub invalid: Vec<Failure>,
}

/// Identities in `existing` that are not desired, deduplicated, in listing order.
pub(crate) fn stale_identities(
    existing: &[Identity],
    is_desired: impl Fn(&Identity) -> bool,
) -> Vec<Identity> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .filter(|id| !is_desired(id) && seen.insert(**id))
        .copied()
        .collect()
}
