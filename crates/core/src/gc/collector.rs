//! The garbage collector.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::content::MarkerPolicy;
use crate::image::{
    ImageError, ImageReferenceRepository, ImageRepository, ImageStatus, ReferenceUsage,
};
use crate::storage::ProviderRegistry;
use crate::tracker::ReferenceTracker;

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Overdue orphans whose blobs were reclaimed.
    pub reclaimed: usize,
    /// Unreferenced active images newly marked orphaned.
    pub marked: usize,
}

struct GcInner<I, R> {
    images: Arc<I>,
    refs: Arc<R>,
    registry: Arc<ProviderRegistry>,
    tracker: ReferenceTracker<I, R>,
    policy: MarkerPolicy,
    grace: Duration,
}

/// Reference-count driven garbage collector for the image catalog.
///
/// A cheap clonable handle over shared state; scheduled reclaim tasks hold
/// their own clone. All public entry points are inexpensive to call from
/// request handlers, and the `on_*` variants spawn the work onto a
/// background task so the originating request never blocks on cleanup.
pub struct GarbageCollector<I, R> {
    inner: Arc<GcInner<I, R>>,
}

impl<I, R> Clone for GarbageCollector<I, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, R> GarbageCollector<I, R>
where
    I: ImageRepository + 'static,
    R: ImageReferenceRepository + 'static,
{
    /// Create a collector with the given grace window.
    #[must_use]
    pub fn new(
        images: Arc<I>,
        refs: Arc<R>,
        registry: Arc<ProviderRegistry>,
        grace: Duration,
    ) -> Self {
        let tracker = ReferenceTracker::new(images.clone(), refs.clone());
        Self {
            inner: Arc::new(GcInner {
                images,
                refs,
                registry,
                tracker,
                policy: MarkerPolicy::default(),
                grace,
            }),
        }
    }

    /// The configured grace window.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.inner.grace
    }

    /// Fire-and-forget wrapper around [`Self::process_entity_updated`].
    pub fn on_entity_updated(&self, entity_id: Uuid, old_content: String, new_content: String) {
        let gc = self.clone();
        tokio::spawn(async move {
            if let Err(e) = gc
                .process_entity_updated(entity_id, &old_content, &new_content)
                .await
            {
                warn!(entity_id = %entity_id, error = %e, "Entity update cleanup failed");
            }
        });
    }

    /// Fire-and-forget wrapper around [`Self::process_entity_deleted`].
    pub fn on_entity_deleted(&self, entity_id: Uuid) {
        let gc = self.clone();
        tokio::spawn(async move {
            if let Err(e) = gc.process_entity_deleted(entity_id).await {
                warn!(entity_id = %entity_id, error = %e, "Entity delete cleanup failed");
            }
        });
    }

    /// Handle an entity content edit: record a reference for every image the
    /// edit added (reviving orphans), drop this entity's reference to every
    /// image it removed, then orphan any image left with zero references
    /// globally.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure.
    pub async fn process_entity_updated(
        &self,
        entity_id: Uuid,
        old_content: &str,
        new_content: &str,
    ) -> Result<(), ImageError> {
        let diff = self.inner.policy.diff(old_content, new_content);
        if !diff.added.is_empty() {
            self.inner
                .tracker
                .record_references(&diff.added, entity_id, ReferenceUsage::Content)
                .await?;
        }
        for &image_id in &diff.removed {
            self.inner
                .refs
                .delete_one(image_id, entity_id, ReferenceUsage::Content)
                .await?;
        }
        self.sweep_candidates(&diff.removed).await
    }

    /// Handle an entity deletion: drop every reference the entity owned,
    /// then orphan any image left with zero references globally.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure.
    pub async fn process_entity_deleted(&self, entity_id: Uuid) -> Result<(), ImageError> {
        let image_ids = self.inner.refs.delete_for_entity(entity_id).await?;
        self.sweep_candidates(&image_ids).await
    }

    /// Re-check each candidate's global reference count; zero-reference
    /// images are marked orphaned and queued for delayed reclaim.
    async fn sweep_candidates(&self, image_ids: &[Uuid]) -> Result<(), ImageError> {
        for &image_id in image_ids {
            if self.inner.refs.count_for_image(image_id).await? > 0 {
                continue;
            }
            let Some(image) = self.inner.images.find_by_id(image_id).await? else {
                continue;
            };
            if image.status == ImageStatus::Deleted {
                continue;
            }
            if image.status == ImageStatus::Active {
                self.inner
                    .images
                    .set_status(image_id, ImageStatus::Orphaned)
                    .await?;
                info!(image_id = %image_id, "Image marked orphaned");
            }
            self.schedule_reclaim(image_id);
        }
        Ok(())
    }

    /// Spawn a delayed reclaim for one image: sleep out the grace window,
    /// then re-check and delete. One task per candidate; independent images
    /// complete in any order.
    pub fn schedule_reclaim(&self, image_id: Uuid) {
        let gc = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(gc.inner.grace).await;
            match gc.reclaim(image_id).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(image_id = %image_id, "Scheduled reclaim aborted");
                }
                Err(e) => {
                    warn!(image_id = %image_id, error = %e, "Scheduled reclaim failed");
                }
            }
        });
    }

    /// Reclaim one orphaned image, with a fresh zero-reference check
    /// immediately before the provider delete.
    ///
    /// Returns `Ok(false)` when reclaim was aborted: the image regained a
    /// reference, was already deleted, or is no longer orphaned.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider delete fails; the image stays
    /// `orphaned` so a later sweep can retry.
    pub async fn reclaim(&self, image_id: Uuid) -> Result<bool, ImageError> {
        if self.inner.refs.count_for_image(image_id).await? > 0 {
            // Revived by a new save. The tracker restored its status when
            // the reference was recorded.
            return Ok(false);
        }
        let Some(image) = self.inner.images.find_by_id(image_id).await? else {
            return Ok(false);
        };
        if image.status != ImageStatus::Orphaned {
            return Ok(false);
        }

        let provider = self.inner.registry.get(&image.storage_provider)?;
        provider.delete(&image.storage_key).await?;
        self.inner
            .images
            .set_status(image_id, ImageStatus::Deleted)
            .await?;

        info!(
            image_id = %image_id,
            key = %image.storage_key,
            "Orphaned image reclaimed"
        );
        Ok(true)
    }

    /// One pass of the periodic sweep: reclaim overdue orphans and orphan
    /// unreferenced active images older than the grace window.
    ///
    /// The catalog row (`status = orphaned` + `orphaned_at`) is the durable
    /// pending-deletion queue, so deletions scheduled before a restart are
    /// picked up here. The second half catches assets that never got an
    /// event: uploads that were never referenced, and blobs left behind by
    /// a failed compensating delete.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure; individual reclaim failures
    /// are logged and skipped.
    pub async fn sweep_once(&self) -> Result<SweepStats, ImageError> {
        // A grace too large for TimeDelta clamps the cutoff to the floor,
        // which makes nothing overdue.
        let cutoff = TimeDelta::from_std(self.inner.grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut stats = SweepStats::default();

        for image in self.inner.images.list_overdue_orphans(cutoff).await? {
            match self.reclaim(image.id).await {
                Ok(true) => stats.reclaimed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(image_id = %image.id, error = %e, "Sweep reclaim failed");
                }
            }
        }

        for image in self.inner.images.list_unreferenced_active(cutoff).await? {
            self.inner
                .images
                .set_status(image.id, ImageStatus::Orphaned)
                .await?;
            info!(image_id = %image.id, "Unreferenced image marked orphaned by sweep");
            self.schedule_reclaim(image.id);
            stats.marked += 1;
        }

        Ok(stats)
    }

    /// Run the periodic sweep until the task is aborted.
    pub fn run_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let gc = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match gc.sweep_once().await {
                    Ok(stats) if stats.reclaimed > 0 || stats.marked > 0 => {
                        info!(
                            reclaimed = stats.reclaimed,
                            marked = stats.marked,
                            "Orphan sweep completed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Orphan sweep failed");
                    }
                }
            }
        })
    }

    /// Delete every image a user owns: references, blobs, and catalog
    /// status, bypassing the grace window. Returns the number of images
    /// reclaimed.
    ///
    /// Per-image provider failures are logged and leave that image
    /// `orphaned` for a later sweep; the bulk operation continues.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure.
    pub async fn purge_user(&self, owner_id: Uuid) -> Result<u64, ImageError> {
        let mut reclaimed = 0;
        for image in self.inner.images.list_by_owner(owner_id).await? {
            self.inner.refs.delete_for_image(image.id).await?;
            if image.status == ImageStatus::Active {
                self.inner
                    .images
                    .set_status(image.id, ImageStatus::Orphaned)
                    .await?;
            }
            match self.reclaim(image.id).await {
                Ok(true) => reclaimed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        image_id = %image.id,
                        owner_id = %owner_id,
                        error = %e,
                        "User purge could not reclaim image"
                    );
                }
            }
        }
        info!(owner_id = %owner_id, reclaimed, "User images purged");
        Ok(reclaimed)
    }
}
