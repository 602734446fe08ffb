//! Storage manager: upload, serve, and delete orchestration.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::ProviderRegistry;

use super::error::ImageError;
use super::repository::ImageRepository;
use super::types::{CreateImageInput, Image, ImageKind, ImageStatus, UploadInput, UploadResult};

/// Path prefix for the synthesized serving URL.
pub const SERVING_PATH_PREFIX: &str = "/images/v2/";

/// Serving URL for an image ID.
///
/// Clients always get this URL, never the raw provider URL, so the serving
/// path can be redirected or proxied without client changes.
#[must_use]
pub fn serving_url(id: Uuid) -> String {
    format!("{SERVING_PATH_PREFIX}{id}")
}

/// Upload validation limits.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    /// Maximum upload size in bytes.
    pub max_file_size: u64,
    /// Allowed MIME types.
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/gif".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

/// Image service orchestrating the object store and the catalog.
pub struct ImageService<R: ImageRepository> {
    registry: Arc<ProviderRegistry>,
    repo: Arc<R>,
    limits: UploadLimits,
}

impl<R: ImageRepository> ImageService<R> {
    /// Create a new image service.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, repo: Arc<R>, limits: UploadLimits) -> Self {
        Self {
            registry,
            repo,
            limits,
        }
    }

    /// Validate upload input against configured limits.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Validation`] for an empty file, a disallowed
    /// MIME type, or an oversized file. No side effects on failure.
    pub fn validate_upload(&self, input: &UploadInput) -> Result<(), ImageError> {
        if input.data.is_empty() {
            return Err(ImageError::validation("empty file"));
        }
        if !self
            .limits
            .allowed_mime_types
            .iter()
            .any(|t| t == &input.content_type)
        {
            return Err(ImageError::validation(format!(
                "content type '{}' is not allowed",
                input.content_type
            )));
        }
        let size = input.data.len() as u64;
        if size > self.limits.max_file_size {
            return Err(ImageError::validation(format!(
                "file size {size} bytes exceeds maximum {} bytes",
                self.limits.max_file_size
            )));
        }
        Ok(())
    }

    /// Upload an image: write the blob, then insert the catalog row.
    ///
    /// If the catalog insert fails after a successful blob write, the blob is
    /// deleted best-effort (compensating action) and the error propagates; an
    /// orphaned blob is never paired with a silent success. A failed
    /// compensating delete is logged and left for the periodic sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, the provider, or the catalog fails.
    pub async fn upload_image(
        &self,
        input: UploadInput,
        provider_name: Option<&str>,
    ) -> Result<UploadResult, ImageError> {
        self.validate_upload(&input)?;

        let provider = self.registry.resolve(provider_name)?;
        let image_id = Uuid::new_v4();
        let key = generate_storage_key(input.owner_id, input.kind, &input.filename);

        let stored = provider
            .upload(&key, input.data.clone(), &input.content_type)
            .await?;

        let create_input = CreateImageInput {
            id: image_id,
            storage_key: stored.key.clone(),
            storage_provider: provider.name().to_string(),
            owner_id: input.owner_id,
            kind: input.kind,
            content_type: input.content_type.clone(),
            #[allow(clippy::cast_possible_wrap)]
            file_size: stored.size as i64,
            width: input.width,
            height: input.height,
            alt: input.alt.clone(),
        };

        match self.repo.create(create_input).await {
            Ok(image) => {
                info!(image_id = %image.id, key = %image.storage_key, "Image uploaded");
                Ok(UploadResult {
                    image_id: image.id,
                    serving_url: serving_url(image.id),
                    storage_key: image.storage_key,
                    content_type: image.content_type,
                    size: stored.size,
                })
            }
            Err(e) => {
                // Compensating delete for the blob we just wrote. Failure here
                // is logged, not escalated; the sweep catches the leftover.
                if let Err(del_err) = provider.delete(&stored.key).await {
                    warn!(
                        key = %stored.key,
                        error = %del_err,
                        "Compensating blob delete failed after catalog insert error"
                    );
                }
                Err(e)
            }
        }
    }

    /// Get an image by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::NotFound`] if the row is missing.
    pub async fn get_image(&self, id: Uuid) -> Result<Image, ImageError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ImageError::not_found(id))
    }

    /// Read an image's bytes for serving.
    ///
    /// A missing row and a `deleted` row both answer [`ImageError::NotFound`]
    /// so deletion history does not leak.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is unknown/deleted or the provider
    /// read fails.
    pub async fn open_image(&self, id: Uuid) -> Result<(Image, Bytes), ImageError> {
        let image = self.get_image(id).await?;
        if image.status == ImageStatus::Deleted {
            return Err(ImageError::not_found(id));
        }

        let provider = self.registry.get(&image.storage_provider)?;
        let bytes = provider.read(&image.storage_key).await?;
        Ok((image, bytes))
    }

    /// Delete an image on behalf of its owner.
    ///
    /// The blob delete runs first; the catalog row is only removed after the
    /// provider call returns, so a retry never finds an `active` row whose
    /// blob is already gone.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Forbidden`] on owner mismatch,
    /// [`ImageError::NotFound`] for an unknown image, or a provider error.
    pub async fn delete_image(&self, id: Uuid, caller_id: Uuid) -> Result<(), ImageError> {
        let image = self.get_image(id).await?;
        if image.owner_id != caller_id {
            return Err(ImageError::Forbidden(id));
        }

        let provider = self.registry.get(&image.storage_provider)?;
        provider.delete(&image.storage_key).await?;
        self.repo.delete(id).await?;

        info!(image_id = %id, owner_id = %caller_id, "Image deleted");
        Ok(())
    }
}

/// Generate the storage key for an upload.
///
/// Format: `{owner_id}/{date}/{kind}/{random_prefix}_{sanitized_filename}`
#[must_use]
pub(crate) fn generate_storage_key(owner_id: Uuid, kind: ImageKind, filename: &str) -> String {
    let date = Utc::now().format("%Y%m%d");
    let prefix = Uuid::new_v4().simple().to_string();
    format!(
        "{owner_id}/{date}/{}/{}_{}",
        kind.as_str(),
        &prefix[..8],
        sanitize_filename(filename)
    )
}

/// Sanitize a filename for use in a storage key.
///
/// Strips whitespace and replaces any character outside
/// `[A-Za-z0-9._-]`, preventing key injection through client filenames.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryImageRepository, memory_registry};

    fn service(repo: Arc<MemoryImageRepository>) -> ImageService<MemoryImageRepository> {
        ImageService::new(memory_registry(), repo, UploadLimits::default())
    }

    fn upload_input() -> UploadInput {
        UploadInput {
            owner_id: Uuid::new_v4(),
            kind: ImageKind::Content,
            filename: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"png-bytes"),
            alt: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo.png"), "photo.png");
        assert_eq!(sanitize_filename("my photo (1).png"), "myphoto_1_.png");
        assert_eq!(sanitize_filename("a/../b.png"), "a_.._b.png");
        assert_eq!(sanitize_filename("日本語.png"), "___.png");
    }

    #[test]
    fn test_generate_storage_key_shape() {
        let owner = Uuid::new_v4();
        let key = generate_storage_key(owner, ImageKind::Content, "pic.png");
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], owner.to_string());
        assert_eq!(parts[2], "content");
        assert!(parts[3].ends_with("_pic.png"));
    }

    #[test]
    fn test_serving_url_shape() {
        let id = Uuid::new_v4();
        assert_eq!(serving_url(id), format!("/images/v2/{id}"));
    }

    #[tokio::test]
    async fn test_upload_creates_active_row() {
        let repo = Arc::new(MemoryImageRepository::new());
        let service = service(repo.clone());

        let result = service
            .upload_image(upload_input(), None)
            .await
            .expect("upload should succeed");

        assert_eq!(result.serving_url, serving_url(result.image_id));
        let image = repo
            .find_by_id(result.image_id)
            .await
            .unwrap()
            .expect("row should exist");
        assert_eq!(image.status, ImageStatus::Active);
        assert_eq!(image.file_size, 9);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let service = service(Arc::new(MemoryImageRepository::new()));
        let mut input = upload_input();
        input.data = Bytes::new();

        let err = service.upload_image(input, None).await.unwrap_err();
        assert!(matches!(err, ImageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_type() {
        let service = service(Arc::new(MemoryImageRepository::new()));
        let mut input = upload_input();
        input.content_type = "application/x-executable".to_string();

        let err = service.upload_image(input, None).await.unwrap_err();
        assert!(matches!(err, ImageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_compensates_on_catalog_failure() {
        let repo = Arc::new(MemoryImageRepository::new());
        repo.fail_next_create();
        let registry = memory_registry();
        let service = ImageService::new(registry.clone(), repo, UploadLimits::default());

        let err = service.upload_image(upload_input(), None).await.unwrap_err();
        assert!(matches!(err, ImageError::Repository(_)));

        // The compensating delete removed the just-written blob.
        let key = service
            .repo
            .last_rejected_key()
            .expect("rejected create should be recorded");
        let provider = registry.resolve(None).unwrap();
        let meta_err = provider.metadata(&key).await.unwrap_err();
        assert!(meta_err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_enforces_ownership() {
        let repo = Arc::new(MemoryImageRepository::new());
        let service = service(repo);

        let input = upload_input();
        let owner = input.owner_id;
        let result = service.upload_image(input, None).await.unwrap();

        let stranger = Uuid::new_v4();
        let err = service
            .delete_image(result.image_id, stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Forbidden(_)));

        service
            .delete_image(result.image_id, owner)
            .await
            .expect("owner delete should succeed");
    }

    #[tokio::test]
    async fn test_open_image_hides_deleted() {
        let repo = Arc::new(MemoryImageRepository::new());
        let service = service(repo.clone());

        let result = service.upload_image(upload_input(), None).await.unwrap();
        let (_, bytes) = service.open_image(result.image_id).await.unwrap();
        assert_eq!(&bytes[..], b"png-bytes");

        repo.set_status(result.image_id, ImageStatus::Orphaned)
            .await
            .unwrap();
        repo.set_status(result.image_id, ImageStatus::Deleted)
            .await
            .unwrap();

        let err = service.open_image(result.image_id).await.unwrap_err();
        assert!(matches!(err, ImageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_image_unknown_id() {
        let service = service(Arc::new(MemoryImageRepository::new()));
        let err = service.open_image(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ImageError::NotFound(_)));
    }
}
