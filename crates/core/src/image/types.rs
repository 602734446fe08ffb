//! Image catalog types and data structures.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Image lifecycle status.
///
/// Only forward transitions are valid: `active -> orphaned -> deleted`,
/// plus the self-healing `orphaned -> active` when a fresh reference
/// appears before the blob is reclaimed. `deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Referenced, or unreferenced but still inside the grace window.
    Active,
    /// Zero references; eligible for reclaim after the grace window.
    Orphaned,
    /// Blob removed from the provider. Terminal.
    Deleted,
}

impl ImageStatus {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Orphaned => "orphaned",
            Self::Deleted => "deleted",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "orphaned" => Some(Self::Orphaned),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether a transition to `next` is allowed.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Orphaned)
                | (Self::Orphaned, Self::Deleted)
                // Self-healing revival of an orphan that regained a reference.
                | (Self::Orphaned, Self::Active)
        )
    }
}

/// Image classification. A hint for clients, not a storage rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    /// User avatar.
    Avatar,
    /// Post title image.
    Title,
    /// Inline post content image.
    Content,
    /// Anything else.
    #[default]
    General,
}

impl ImageKind {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Title => "title",
            Self::Content => "content",
            Self::General => "general",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "avatar" => Some(Self::Avatar),
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// How a content-bearing entity uses an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceUsage {
    /// Title image of the entity.
    Title,
    /// Inline image in the entity body.
    Content,
}

impl ReferenceUsage {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            _ => None,
        }
    }
}

/// Image catalog row for one uploaded asset.
#[derive(Debug, Clone)]
pub struct Image {
    /// Unique identifier, assigned at upload time.
    pub id: Uuid,
    /// Provider-specific key. Immutable once written.
    pub storage_key: String,
    /// Name of the provider that owns the key.
    pub storage_provider: String,
    /// The uploading user.
    pub owner_id: Uuid,
    /// Classification.
    pub kind: ImageKind,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Pixel width, if known.
    pub width: Option<i32>,
    /// Pixel height, if known.
    pub height: Option<i32>,
    /// Alt text, if provided.
    pub alt: Option<String>,
    /// Lifecycle status.
    pub status: ImageStatus,
    /// When the image was marked orphaned, if it is.
    pub orphaned_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A use of an image by a content-bearing entity.
///
/// The (`image_id`, `owner_entity_id`, `usage`) tuple is unique: re-saving
/// the same content never duplicates references.
#[derive(Debug, Clone)]
pub struct ImageReference {
    /// Unique identifier.
    pub id: Uuid,
    /// The referenced image.
    pub image_id: Uuid,
    /// The referencing entity (e.g. a post).
    pub owner_entity_id: Uuid,
    /// How the entity uses the image.
    pub usage: ReferenceUsage,
    /// Position of the image within the content, from first occurrence.
    pub position: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a catalog row.
#[derive(Debug, Clone)]
pub struct CreateImageInput {
    /// Image ID.
    pub id: Uuid,
    /// Storage key.
    pub storage_key: String,
    /// Provider name.
    pub storage_provider: String,
    /// Uploading user.
    pub owner_id: Uuid,
    /// Classification.
    pub kind: ImageKind,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Pixel width, if known.
    pub width: Option<i32>,
    /// Pixel height, if known.
    pub height: Option<i32>,
    /// Alt text, if provided.
    pub alt: Option<String>,
}

/// Input for uploading an image.
#[derive(Debug, Clone)]
pub struct UploadInput {
    /// Uploading user.
    pub owner_id: Uuid,
    /// Classification.
    pub kind: ImageKind,
    /// Original filename.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// File bytes.
    pub data: Bytes,
    /// Alt text, if provided.
    pub alt: Option<String>,
    /// Pixel width, if known.
    pub width: Option<i32>,
    /// Pixel height, if known.
    pub height: Option<i32>,
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Catalog ID of the new image.
    pub image_id: Uuid,
    /// Synthesized serving URL (`/images/v2/{id}`), never the raw provider URL.
    pub serving_url: String,
    /// Provider storage key.
    pub storage_key: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}
