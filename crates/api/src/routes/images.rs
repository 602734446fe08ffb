//! Image upload, serving, deletion, and legacy migration routes.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{AppState, middleware::AuthUser, routes::error_response};
use fable_core::image::{Image, ImageKind, ImageService, UploadInput, serving_url};
use fable_core::legacy::LegacyMigrator;

/// Creates the image routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/images/v2", post(upload_image).get(list_my_images))
        .route(
            "/images/v2/{image_id}",
            get(serve_image).delete(delete_image),
        )
        .route("/images/v2/migrate-legacy", post(migrate_legacy))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Catalog ID of the new image.
    pub image_id: Uuid,
    /// Stable serving URL.
    pub serving_url: String,
    /// Provider storage key.
    pub storage_key: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// Response entry for an owned image.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Catalog ID.
    pub id: Uuid,
    /// Stable serving URL.
    pub serving_url: String,
    /// Classification.
    pub kind: &'static str,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Lifecycle status.
    pub status: &'static str,
    /// Alt text, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Created at timestamp (ISO 8601).
    pub created_at: String,
}

/// Request body for legacy migration.
#[derive(Debug, Deserialize)]
pub struct MigrateLegacyRequest {
    /// Legacy `/proxy/...` URLs to backfill.
    pub urls: Vec<String>,
    /// Provider to probe; the default provider when omitted.
    #[serde(default)]
    pub provider: Option<String>,
}

/// Response for a legacy migration run.
#[derive(Debug, Serialize)]
pub struct MigrateLegacyResponse {
    /// Catalog rows newly created.
    pub migrated: u64,
    /// Assets that already had a catalog row.
    pub skipped: u64,
    /// Assets that could not be migrated.
    pub failed: u64,
}

fn to_image_response(image: Image) -> ImageResponse {
    ImageResponse {
        id: image.id,
        serving_url: serving_url(image.id),
        kind: image.kind.as_str(),
        content_type: image.content_type,
        file_size: image.file_size,
        status: image.status.as_str(),
        alt: image.alt,
        created_at: image.created_at.to_rfc3339(),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/images/v2`
/// Upload an image as multipart form data.
///
/// Expects a `file` part; optional `kind` and `alt` text parts.
async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut data = None;
    let mut filename = String::new();
    let mut content_type = String::new();
    let mut kind = ImageKind::default();
    let mut alt = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "validation_error",
                        "message": format!("Malformed multipart body: {e}")
                    })),
                )
                    .into_response();
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or("upload").to_string();
                content_type = field.content_type().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => data = Some(bytes),
                    Err(e) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "validation_error",
                                "message": format!("Failed to read file part: {e}")
                            })),
                        )
                            .into_response();
                    }
                }
            }
            "kind" => {
                if let Ok(text) = field.text().await {
                    kind = ImageKind::parse(&text).unwrap_or_default();
                }
            }
            "alt" => {
                if let Ok(text) = field.text().await {
                    alt = Some(text);
                }
            }
            _ => {}
        }
    }

    let Some(data) = data else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "validation_error",
                "message": "Missing file part"
            })),
        )
            .into_response();
    };

    let service = ImageService::new(
        state.registry.clone(),
        state.images.clone(),
        state.limits.clone(),
    );
    let input = UploadInput {
        owner_id: auth.user_id(),
        kind,
        filename,
        content_type,
        data,
        alt,
        width: None,
        height: None,
    };

    match service.upload_image(input, None).await {
        Ok(result) => {
            info!(
                image_id = %result.image_id,
                owner_id = %auth.user_id(),
                size = result.size,
                "Image uploaded"
            );
            let response = UploadResponse {
                image_id: result.image_id,
                serving_url: result.serving_url,
                storage_key: result.storage_key,
                content_type: result.content_type,
                size: result.size,
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, owner_id = %auth.user_id(), "Upload failed");
            error_response(&e)
        }
    }
}

/// GET `/images/v2/{image_id}`
/// Serve an image's bytes from the backing provider.
///
/// Deleted and unknown images both answer 404; the distinction is not
/// observable from outside.
async fn serve_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = ImageService::new(
        state.registry.clone(),
        state.images.clone(),
        state.limits.clone(),
    );

    match service.open_image(image_id).await {
        Ok((image, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, image.content_type),
                (
                    header::CACHE_CONTROL,
                    "public, max-age=31536000, immutable".to_string(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, image_id = %image_id, "Serve failed");
            error_response(&e)
        }
    }
}

/// GET `/images/v2`
/// List the caller's non-deleted images.
async fn list_my_images(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    use fable_core::image::ImageRepository as _;

    match state.images.list_by_owner(auth.user_id()).await {
        Ok(images) => {
            let body: Vec<ImageResponse> = images.into_iter().map(to_image_response).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!(error = %e, owner_id = %auth.user_id(), "Listing images failed");
            error_response(&e)
        }
    }
}

/// DELETE `/images/v2/{image_id}`
/// Delete an image the caller owns: blob first, then the catalog row.
async fn delete_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(image_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = ImageService::new(
        state.registry.clone(),
        state.images.clone(),
        state.limits.clone(),
    );

    match service.delete_image(image_id, auth.user_id()).await {
        Ok(()) => {
            info!(image_id = %image_id, owner_id = %auth.user_id(), "Image deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(error = %e, image_id = %image_id, "Delete failed");
            error_response(&e)
        }
    }
}

/// POST `/images/v2/migrate-legacy`
/// Backfill catalog rows for the caller's legacy `/proxy/...` URLs.
async fn migrate_legacy(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<MigrateLegacyRequest>,
) -> impl IntoResponse {
    let migrator = LegacyMigrator::new(state.images.clone(), state.registry.clone());

    match migrator
        .migrate_urls(auth.user_id(), &payload.urls, payload.provider.as_deref())
        .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(MigrateLegacyResponse {
                migrated: report.migrated,
                skipped: report.skipped,
                failed: report.failed,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, owner_id = %auth.user_id(), "Legacy migration failed");
            error_response(&e)
        }
    }
}
