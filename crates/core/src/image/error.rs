//! Image catalog error types.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

/// Image operation errors.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Bad upload input (empty file, disallowed type, oversized file).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Image not found, or deleted. Callers get the same answer for both so
    /// deletion history does not leak.
    #[error("image not found: {0}")]
    NotFound(Uuid),

    /// Caller does not own the image.
    #[error("forbidden: image {0} is owned by another user")]
    Forbidden(Uuid),

    /// Object store failure.
    #[error("storage error: {0}")]
    Provider(#[from] StorageError),

    /// Catalog persistence failure.
    #[error("repository error: {0}")]
    Repository(String),
}

impl ImageError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound(id)
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}
