//! Deterministic record identity.
//!
//! A record's [`Identity`] is a UUID v5 computed over the normalized value
//! of its identity field, in the DNS namespace. The same normalized value
//! always yields the same identity, across runs, processes, and any other
//! client that follows the `uuid5(NAMESPACE_DNS, value)` convention.
//!
//! Normalization trims surrounding whitespace and lower-cases, so
//! `"Foo"` and `"foo "` resolve to the same identity.
//!
//! # Example
//!
//! ```rust
//! use qa_sync_core::identity::resolve;
//! use qa_sync_core::models::Record;
//!
//! let a = resolve(&Record::new().with("question", "Foo"), "question").unwrap();
//! let b = resolve(&Record::new().with("question", "foo "), "question").unwrap();
//! assert_eq!(a, b);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FieldProblem, InvalidIdentityField};
use crate::models::{FieldValue, Record};

/// Stable store identifier for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Uuid);

impl Identity {
    /// Derive an identity directly from a raw identity-field value.
    ///
    /// The value is normalized first. Returns `None` if nothing remains.
    pub fn derive(value: &str) -> Option<Self> {
        let normalized = normalize(value);
        if normalized.is_empty() {
            return None;
        }
        Some(Self(Uuid::new_v5(&Uuid::NAMESPACE_DNS, normalized.as_bytes())))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Identity {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for Identity {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Trim surrounding whitespace and lower-case.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Resolve the identity of `record` from `identity_field`.
///
/// # Errors
///
/// [`InvalidIdentityField`] if the field is missing, is not text, or is
/// empty after normalization.
pub fn resolve(record: &Record, identity_field: &str) -> Result<Identity, InvalidIdentityField> {
    let invalid = |problem| InvalidIdentityField {
        field: identity_field.to_string(),
        problem,
    };

    match record.get(identity_field) {
        None => Err(invalid(FieldProblem::Missing)),
        Some(FieldValue::Text(value)) => {
            Identity::derive(value).ok_or_else(|| invalid(FieldProblem::Empty))
        }
        Some(_) => Err(invalid(FieldProblem::NotText)),
    }
}
