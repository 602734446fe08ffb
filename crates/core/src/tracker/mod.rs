//! Reference tracker.
//!
//! Keeps the reference table consistent with content: at most one reference
//! row per (image, owning entity, usage) tuple. Recording a reference for an
//! image that was already marked orphaned revives it, so a re-added image is
//! never left collectible.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::image::{
    CreateReferenceInput, ImageError, ImageReferenceRepository, ImageRepository, ImageStatus,
    ReferenceUsage,
};

/// Tracks which entities use which images.
pub struct ReferenceTracker<I, R> {
    images: Arc<I>,
    refs: Arc<R>,
}

impl<I, R> ReferenceTracker<I, R>
where
    I: ImageRepository,
    R: ImageReferenceRepository,
{
    /// Create a new tracker.
    #[must_use]
    pub fn new(images: Arc<I>, refs: Arc<R>) -> Self {
        Self { images, refs }
    }

    /// Record references from an entity to the given images, in content
    /// order. Idempotent: existing tuples are left alone, so re-saving the
    /// same content never duplicates rows.
    ///
    /// Unknown or deleted image IDs are skipped with a warning rather than
    /// failing the save; a dangling marker must not break persistence.
    ///
    /// Returns the number of rows actually created.
    ///
    /// # Errors
    ///
    /// Returns an error only on repository failure.
    pub async fn record_references(
        &self,
        image_ids: &[Uuid],
        owner_entity_id: Uuid,
        usage: ReferenceUsage,
    ) -> Result<usize, ImageError> {
        let mut created = 0;
        for (position, &image_id) in image_ids.iter().enumerate() {
            let Some(image) = self.images.find_by_id(image_id).await? else {
                warn!(image_id = %image_id, "Skipping reference to unknown image");
                continue;
            };
            if image.status == ImageStatus::Deleted {
                warn!(image_id = %image_id, "Skipping reference to deleted image");
                continue;
            }

            let inserted = self
                .refs
                .create_if_absent(CreateReferenceInput {
                    image_id,
                    owner_entity_id,
                    usage,
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    position: position as i32,
                })
                .await?;

            if inserted {
                created += 1;
                // Self-healing: a fresh reference to an orphan revives it
                // before any scheduled reclaim can act on it.
                if image.status == ImageStatus::Orphaned {
                    self.images.set_status(image_id, ImageStatus::Active).await?;
                    info!(image_id = %image_id, "Orphaned image revived by new reference");
                }
            }
        }
        Ok(created)
    }

    /// Remove a single reference. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure.
    pub async fn remove_reference(
        &self,
        image_id: Uuid,
        owner_entity_id: Uuid,
        usage: ReferenceUsage,
    ) -> Result<bool, ImageError> {
        self.refs.delete_one(image_id, owner_entity_id, usage).await
    }

    /// Remove every reference owned by an entity, returning the distinct
    /// image IDs that lost references.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure.
    pub async fn remove_entity_references(
        &self,
        owner_entity_id: Uuid,
    ) -> Result<Vec<Uuid>, ImageError> {
        self.refs.delete_for_entity(owner_entity_id).await
    }

    /// Live reference count for an image across all entities.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure.
    pub async fn reference_count(&self, image_id: Uuid) -> Result<u64, ImageError> {
        self.refs.count_for_image(image_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{CreateImageInput, ImageKind};
    use crate::testutil::{MemoryImageRepository, MemoryReferenceRepository, memory_repos};

    async fn seed_image(repo: &MemoryImageRepository) -> Uuid {
        let id = Uuid::new_v4();
        repo.create(CreateImageInput {
            id,
            storage_key: format!("owner/20260829/content/{id}.png"),
            storage_provider: "mem".to_string(),
            owner_id: Uuid::new_v4(),
            kind: ImageKind::Content,
            content_type: "image/png".to_string(),
            file_size: 1,
            width: None,
            height: None,
            alt: None,
        })
        .await
        .expect("seed image");
        id
    }

    fn tracker(
        images: Arc<MemoryImageRepository>,
        refs: Arc<MemoryReferenceRepository>,
    ) -> ReferenceTracker<MemoryImageRepository, MemoryReferenceRepository> {
        ReferenceTracker::new(images, refs)
    }

    #[tokio::test]
    async fn test_recording_twice_never_duplicates() {
        let (images, refs) = memory_repos();
        let tracker = tracker(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;
        let entity = Uuid::new_v4();

        let created = tracker
            .record_references(&[image_id], entity, ReferenceUsage::Content)
            .await
            .unwrap();
        assert_eq!(created, 1);

        let created = tracker
            .record_references(&[image_id], entity, ReferenceUsage::Content)
            .await
            .unwrap();
        assert_eq!(created, 0);

        assert_eq!(refs.all().len(), 1);
        assert_eq!(tracker.reference_count(image_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_image_different_entities_fan_out() {
        let (images, refs) = memory_repos();
        let tracker = tracker(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;

        tracker
            .record_references(&[image_id], Uuid::new_v4(), ReferenceUsage::Content)
            .await
            .unwrap();
        tracker
            .record_references(&[image_id], Uuid::new_v4(), ReferenceUsage::Content)
            .await
            .unwrap();

        assert_eq!(tracker.reference_count(image_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_image_is_skipped() {
        let (images, refs) = memory_repos();
        let tracker = tracker(images.clone(), refs.clone());
        let known = seed_image(&images).await;

        let created = tracker
            .record_references(
                &[Uuid::new_v4(), known],
                Uuid::new_v4(),
                ReferenceUsage::Content,
            )
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(refs.all().len(), 1);
    }

    #[tokio::test]
    async fn test_new_reference_revives_orphan() {
        let (images, refs) = memory_repos();
        let tracker = tracker(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;

        images
            .set_status(image_id, ImageStatus::Orphaned)
            .await
            .unwrap();

        tracker
            .record_references(&[image_id], Uuid::new_v4(), ReferenceUsage::Content)
            .await
            .unwrap();

        let image = images.find_by_id(image_id).await.unwrap().unwrap();
        assert_eq!(image.status, ImageStatus::Active);
        assert!(image.orphaned_at.is_none());
    }

    #[tokio::test]
    async fn test_positions_follow_content_order() {
        let (images, refs) = memory_repos();
        let tracker = tracker(images.clone(), refs.clone());
        let first = seed_image(&images).await;
        let second = seed_image(&images).await;
        let entity = Uuid::new_v4();

        tracker
            .record_references(&[first, second], entity, ReferenceUsage::Content)
            .await
            .unwrap();

        let mut rows = refs.all();
        rows.sort_by_key(|r| r.position);
        assert_eq!(rows[0].image_id, first);
        assert_eq!(rows[0].position, 0);
        assert_eq!(rows[1].image_id, second);
        assert_eq!(rows[1].position, 1);
    }
}
