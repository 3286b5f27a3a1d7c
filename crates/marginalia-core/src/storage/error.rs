//! Typed errors for store and projection operations
//!
//! Every failure surfaces through this closed taxonomy; nothing is
//! logged-and-swallowed. The enum is `Clone` so a failed snapshot can
//! travel through a watch channel to every subscriber.

use std::sync::Arc;

use thiserror::Error;

use crate::models::AnnotationKind;

/// Errors produced by the annotation store and the decoration projection
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The referenced annotation does not exist
    #[error("annotation '{id}' not found")]
    NotFound { id: String },

    /// An integrity rule was breached, e.g. inserting a duplicate id
    #[error("annotation '{id}' already exists")]
    ConstraintViolation { id: String },

    /// A locator blob failed to encode or decode
    #[error("locator for annotation '{id}' could not be decoded: {details}")]
    LocatorDecode { id: String, details: String },

    /// A decoration style was handed to a template for a different kind
    #[error("expected a {expected} style, got {actual}")]
    InvalidConfigKind {
        expected: AnnotationKind,
        actual: AnnotationKind,
    },

    /// An enum code read back from storage is outside the known range
    #[error("invalid {field} code {code} on annotation '{id}'")]
    InvalidCode {
        id: String,
        field: &'static str,
        code: i64,
    },

    /// Underlying SQLite failure, with the cause preserved
    #[error("database error: {source}")]
    Storage {
        #[source]
        source: Arc<rusqlite::Error>,
    },

    /// Configuration could not be read, parsed, or applied
    #[error("configuration error: {details}")]
    Config { details: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(source: rusqlite::Error) -> Self {
        StoreError::Storage {
            source: Arc::new(source),
        }
    }
}

impl StoreError {
    /// Whether this error means the referenced record is simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
