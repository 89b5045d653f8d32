//! Error taxonomy for reconciliation.
//!
//! Only [`ProvisionError`] aborts a collection's run. Everything else is
//! contained per identity and surfaces as a failure entry in the
//! [`SyncReport`](crate::report::SyncReport). An insert that hits an
//! existing identity is not an error at all; see
//! [`InsertOutcome::Conflict`](crate::store::InsertOutcome::Conflict).

use std::fmt;

use thiserror::Error;

/// What was wrong with a record's identity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Missing,
    Empty,
    NotText,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => write!(f, "field is missing"),
            FieldProblem::Empty => write!(f, "value is empty after normalization"),
            FieldProblem::NotText => write!(f, "value is not text"),
        }
    }
}

/// A desired record whose identity cannot be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid identity field `{field}`: {problem}")]
pub struct InvalidIdentityField {
    pub field: String,
    pub problem: FieldProblem,
}

/// Catch-all transport or server error from a store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid store response: {0}")]
    InvalidResponse(String),

    /// A collaborator the adapter depends on (e.g. an embedding provider) failed.
    #[error("dependency failed: {0}")]
    Dependency(String),
}

/// Collection provisioning failure.
///
/// [`ProvisionError::AlreadyExists`] is reported by adapters when creation
/// loses a race with another creator. The
/// [`CollectionProvisioner`](crate::provision::CollectionProvisioner)
/// treats that one variant as success. The other variants are fatal for
/// the collection's run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("collection `{0}` already exists")]
    AlreadyExists(String),

    #[error("failed to check whether collection `{collection}` exists: {source}")]
    Lookup {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to create collection `{collection}`: {source}")]
    Create {
        collection: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identity_field_message() {
        let err = InvalidIdentityField {
            field: "question".to_string(),
            problem: FieldProblem::Empty,
        };
        assert_eq!(
            err.to_string(),
            "invalid identity field `question`: value is empty after normalization"
        );
    }

    #[test]
    fn test_provision_error_carries_source() {
        let err = ProvisionError::Create {
            collection: "QAEntry".to_string(),
            source: StoreError::Rejected {
                status: 500,
                message: "boom".to_string(),
            },
        };
        assert!(err.to_string().contains("QAEntry"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
