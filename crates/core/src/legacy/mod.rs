//! Backfill of catalog rows for assets created under the legacy URL scheme.
//!
//! Older content linked images directly as `/proxy/{owner}/{date}/{kind}/
//! {filename}`, with no catalog row behind them. The migrator parses that
//! shape into the equivalent storage key, probes the provider for the blob's
//! metadata, and creates the missing row. No bytes are moved.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::image::{CreateImageInput, ImageError, ImageKind, ImageRepository};
use crate::storage::ProviderRegistry;

use std::sync::Arc;

static LEGACY_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/proxy/([0-9a-fA-F-]{36})/([^/]+)/([^/]+)/([^/?#]+)$")
        .expect("legacy url regex is valid")
});

/// A legacy URL decomposed into its storage-key parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAsset {
    /// Owner from the URL's first path segment.
    pub owner_id: Uuid,
    /// Date segment, kept verbatim.
    pub date: String,
    /// Classification from the type segment.
    pub kind: ImageKind,
    /// Filename segment.
    pub filename: String,
}

impl LegacyAsset {
    /// Parse a legacy `/proxy/...` URL path. Returns `None` when the path
    /// does not match the legacy shape.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let caps = LEGACY_URL_RE.captures(path)?;
        let owner_id = Uuid::parse_str(&caps[1]).ok()?;
        let kind = ImageKind::parse(&caps[3])?;
        Some(Self {
            owner_id,
            date: caps[2].to_string(),
            kind,
            filename: caps[4].to_string(),
        })
    }

    /// The storage key the legacy proxy resolved this URL to.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.owner_id,
            self.date,
            self.kind.as_str(),
            self.filename
        )
    }
}

/// Outcome counts of one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Catalog rows newly created.
    pub migrated: u64,
    /// Assets that already had a catalog row.
    pub skipped: u64,
    /// Assets that could not be migrated.
    pub failed: u64,
}

/// One-shot adapter that backfills catalog rows for legacy assets.
pub struct LegacyMigrator<I> {
    images: Arc<I>,
    registry: Arc<ProviderRegistry>,
}

impl<I> LegacyMigrator<I>
where
    I: ImageRepository,
{
    /// Create a migrator.
    #[must_use]
    pub fn new(images: Arc<I>, registry: Arc<ProviderRegistry>) -> Self {
        Self { images, registry }
    }

    /// Backfill catalog rows for a user's legacy URLs.
    ///
    /// Idempotent: URLs whose storage key already has a catalog row are
    /// skipped, so the same batch can be replayed safely. Individual assets
    /// fail without aborting the run: unparseable URLs, URLs owned by a
    /// different user, and keys with no blob behind them are logged and
    /// counted as failed.
    ///
    /// # Errors
    ///
    /// Returns an error only on repository failure or when the named
    /// provider is not registered.
    pub async fn migrate_urls(
        &self,
        owner_id: Uuid,
        urls: &[String],
        provider_name: Option<&str>,
    ) -> Result<MigrationReport, ImageError> {
        let provider = self.registry.resolve(provider_name)?;
        let mut report = MigrationReport::default();

        for url in urls {
            let Some(asset) = LegacyAsset::parse(url) else {
                warn!(url = %url, "Skipping unparseable legacy URL");
                report.failed += 1;
                continue;
            };
            if asset.owner_id != owner_id {
                warn!(
                    url = %url,
                    owner_id = %owner_id,
                    "Legacy URL belongs to a different owner"
                );
                report.failed += 1;
                continue;
            }

            let key = asset.storage_key();
            if self
                .images
                .find_by_storage_key(provider.name(), &key)
                .await?
                .is_some()
            {
                report.skipped += 1;
                continue;
            }

            let meta = match provider.metadata(&key).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(key = %key, error = %e, "Legacy asset has no blob behind it");
                    report.failed += 1;
                    continue;
                }
            };

            let content_type = meta.content_type.unwrap_or_else(|| {
                mime_guess::from_path(&asset.filename)
                    .first_or_octet_stream()
                    .to_string()
            });
            let created = self
                .images
                .create(CreateImageInput {
                    id: Uuid::new_v4(),
                    storage_key: key.clone(),
                    storage_provider: provider.name().to_string(),
                    owner_id,
                    kind: asset.kind,
                    content_type,
                    file_size: i64::try_from(meta.size).unwrap_or(i64::MAX),
                    width: None,
                    height: None,
                    alt: None,
                })
                .await;
            match created {
                Ok(image) => {
                    info!(image_id = %image.id, key = %key, "Legacy asset migrated");
                    report.migrated += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to create catalog row for legacy asset");
                    report.failed += 1;
                }
            }
        }

        info!(
            owner_id = %owner_id,
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed,
            "Legacy migration run finished"
        );
        Ok(report)
    }
}
