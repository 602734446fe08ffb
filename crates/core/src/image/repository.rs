//! Repository traits for image catalog persistence.
//!
//! These traits are implemented by the db crate to provide actual database
//! operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::ImageError;
use super::types::{CreateImageInput, Image, ImageStatus, ReferenceUsage};

/// Repository trait for image catalog rows.
pub trait ImageRepository: Send + Sync {
    /// Create a new image row with `active` status.
    fn create(
        &self,
        input: CreateImageInput,
    ) -> impl std::future::Future<Output = Result<Image, ImageError>> + Send;

    /// Find an image by ID.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Image>, ImageError>> + Send;

    /// Find an image by its provider name and storage key.
    fn find_by_storage_key(
        &self,
        provider: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Image>, ImageError>> + Send;

    /// List all non-deleted images owned by a user.
    fn list_by_owner(
        &self,
        owner_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Image>, ImageError>> + Send;

    /// Update an image's status. Sets `orphaned_at` when moving to
    /// `orphaned`, clears it when moving back to `active`.
    fn set_status(
        &self,
        id: Uuid,
        status: ImageStatus,
    ) -> impl std::future::Future<Output = Result<(), ImageError>> + Send;

    /// Remove the catalog row entirely. Returns whether a row was removed.
    fn delete(&self, id: Uuid)
    -> impl std::future::Future<Output = Result<bool, ImageError>> + Send;

    /// Images marked orphaned at or before `cutoff`, awaiting reclaim.
    fn list_overdue_orphans(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Image>, ImageError>> + Send;

    /// Active images with zero references created at or before `cutoff`.
    ///
    /// These are upload-then-never-referenced assets (including blobs whose
    /// compensating delete failed) that the periodic sweep picks up.
    fn list_unreferenced_active(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Image>, ImageError>> + Send;
}

/// Input for creating a reference row.
#[derive(Debug, Clone)]
pub struct CreateReferenceInput {
    /// The referenced image.
    pub image_id: Uuid,
    /// The referencing entity.
    pub owner_entity_id: Uuid,
    /// Usage kind.
    pub usage: ReferenceUsage,
    /// Position within the content.
    pub position: i32,
}

/// Repository trait for image reference rows.
pub trait ImageReferenceRepository: Send + Sync {
    /// Insert a reference if the (image, entity, usage) tuple does not
    /// already exist. Returns `true` if a row was created.
    fn create_if_absent(
        &self,
        input: CreateReferenceInput,
    ) -> impl std::future::Future<Output = Result<bool, ImageError>> + Send;

    /// Count live references to an image across all entities.
    fn count_for_image(
        &self,
        image_id: Uuid,
    ) -> impl std::future::Future<Output = Result<u64, ImageError>> + Send;

    /// Delete one reference. Returns whether a row was removed.
    fn delete_one(
        &self,
        image_id: Uuid,
        owner_entity_id: Uuid,
        usage: ReferenceUsage,
    ) -> impl std::future::Future<Output = Result<bool, ImageError>> + Send;

    /// Delete every reference owned by an entity. Returns the distinct image
    /// IDs that lost references.
    fn delete_for_entity(
        &self,
        owner_entity_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Uuid>, ImageError>> + Send;

    /// Delete every reference to an image (bulk owner purge path).
    fn delete_for_image(
        &self,
        image_id: Uuid,
    ) -> impl std::future::Future<Output = Result<u64, ImageError>> + Send;

    /// Distinct image IDs currently referenced by an entity.
    fn image_ids_for_entity(
        &self,
        owner_entity_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Uuid>, ImageError>> + Send;
}
