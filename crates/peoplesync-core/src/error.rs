//! Error types for peoplesync

use std::collections::BTreeMap;

use thiserror::Error;

use crate::imaging::ImageProcessingError;

/// Main error type for peoplesync operations
///
/// Every failure is scoped to the action that triggered it; none of these
/// variants leave canonical state (snapshot or profile) modified.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Field-level validation failed (field name -> message)
    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(BTreeMap<String, String>),

    /// Credential mismatch or password policy failure
    #[error("{0}")]
    Authentication(String),

    /// The current credential is missing or wrong for a sensitive change
    #[error("Reauthentication required: {0}")]
    Reauthentication(String),

    /// The acting identity does not own the record
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Record id no longer exists in the remote store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Avatar decode/encode failure
    #[error("Image processing failed: {0}")]
    ImageProcessing(#[from] ImageProcessingError),

    /// Transient connectivity failure, eligible for a user-initiated retry
    #[error("Network error: {0}")]
    Network(String),

    /// Operation requires an authenticated identity
    #[error("Not signed in")]
    NotSignedIn,

    /// Error during storage operations (redb)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SyncError {
    /// Build a validation error from `(field, message)` pairs.
    pub fn validation<K, V>(errors: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: ToString,
        V: Into<String>,
    {
        SyncError::Validation(
            errors
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }

    /// Only network failures are retry-eligible. The core never retries on
    /// its own; a retry is the user repeating the action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// Field errors carried by a validation failure, if any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            SyncError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;
