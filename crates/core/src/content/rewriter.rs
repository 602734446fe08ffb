//! Bidirectional content transforms with reference bookkeeping.

use std::sync::Arc;

use uuid::Uuid;

use crate::image::{ImageError, ImageReferenceRepository, ImageRepository, ReferenceUsage};
use crate::tracker::ReferenceTracker;

use super::policy::{MarkerPolicy, ReferenceDiff};

/// Rewrites content between display and canonical storage forms.
///
/// `to_storage_form` is not pure: it registers references as a side effect.
/// Re-running it with the same owner is safe (no duplicate rows); re-running
/// it with a different owner records that owner's own references.
pub struct ContentRewriter<I, R> {
    policy: MarkerPolicy,
    tracker: Arc<ReferenceTracker<I, R>>,
}

impl<I, R> ContentRewriter<I, R>
where
    I: ImageRepository,
    R: ImageReferenceRepository,
{
    /// Create a rewriter with the default marker policy.
    #[must_use]
    pub fn new(tracker: Arc<ReferenceTracker<I, R>>) -> Self {
        Self::with_policy(MarkerPolicy::default(), tracker)
    }

    /// Create a rewriter with a custom marker policy.
    #[must_use]
    pub fn with_policy(policy: MarkerPolicy, tracker: Arc<ReferenceTracker<I, R>>) -> Self {
        Self { policy, tracker }
    }

    /// The active marker policy.
    #[must_use]
    pub fn policy(&self) -> &MarkerPolicy {
        &self.policy
    }

    /// Rewrite canonical markers to inline tags with serving URLs.
    ///
    /// Pure: unknown or malformed IDs are left untouched so a dangling
    /// reference does not break rendering.
    #[must_use]
    pub fn to_display_form(&self, content: &str) -> String {
        self.policy.to_display(content)
    }

    /// Rewrite inline serving-URL tags back to canonical markers and record
    /// a `content` reference for each referenced image.
    ///
    /// # Errors
    ///
    /// Returns an error on repository failure. Reference registration is
    /// idempotent, so a retry after a partial failure is safe.
    pub async fn to_storage_form(
        &self,
        content: &str,
        owner_entity_id: Uuid,
    ) -> Result<String, ImageError> {
        let (canonical, ids) = self.policy.canonicalize(content);
        self.tracker
            .record_references(&ids, owner_entity_id, ReferenceUsage::Content)
            .await?;
        Ok(canonical)
    }

    /// Image IDs referenced by the new version only / the old version only.
    #[must_use]
    pub fn diff_references(&self, old_content: &str, new_content: &str) -> ReferenceDiff {
        self.policy.diff(old_content, new_content)
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

    fn rewriter(
        images: Arc<MemoryImageRepository>,
        refs: Arc<MemoryReferenceRepository>,
    ) -> ContentRewriter<MemoryImageRepository, MemoryReferenceRepository> {
        ContentRewriter::new(Arc::new(ReferenceTracker::new(images, refs)))
    }

    #[tokio::test]
    async fn test_to_storage_form_registers_reference() {
        let (images, refs) = memory_repos();
        let rewriter = rewriter(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;
        let entity = Uuid::new_v4();

        let content = format!("<p>post</p><img src=\"/images/v2/{image_id}\">");
        let canonical = rewriter.to_storage_form(&content, entity).await.unwrap();

        assert!(canonical.contains(&format!("data-image-id=\"{image_id}\"")));
        let rows = refs.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].image_id, image_id);
        assert_eq!(rows[0].owner_entity_id, entity);
        assert_eq!(rows[0].usage, ReferenceUsage::Content);
    }

    #[tokio::test]
    async fn test_to_storage_form_rerun_is_idempotent() {
        let (images, refs) = memory_repos();
        let rewriter = rewriter(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;
        let entity = Uuid::new_v4();

        let content = format!("<img src=\"/images/v2/{image_id}\">");
        rewriter.to_storage_form(&content, entity).await.unwrap();
        rewriter.to_storage_form(&content, entity).await.unwrap();

        assert_eq!(refs.all().len(), 1);
    }

    #[tokio::test]
    async fn test_to_storage_form_second_owner_gets_own_reference() {
        let (images, refs) = memory_repos();
        let rewriter = rewriter(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;

        let content = format!("<img src=\"/images/v2/{image_id}\">");
        rewriter
            .to_storage_form(&content, Uuid::new_v4())
            .await
            .unwrap();
        rewriter
            .to_storage_form(&content, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(refs.all().len(), 2);
    }

    #[tokio::test]
    async fn test_display_then_storage_roundtrip() {
        let (images, refs) = memory_repos();
        let rewriter = rewriter(images.clone(), refs.clone());
        let image_id = seed_image(&images).await;

        let stored = format!("<p>a</p><img data-image-id=\"{image_id}\"><p>b</p>");
        let display = rewriter.to_display_form(&stored);
        let back = rewriter
            .to_storage_form(&display, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(back, stored);
    }
}
