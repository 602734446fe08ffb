//! Internal entity-event hooks.
//!
//! Called service-to-service by the content platform when a post or other
//! content-bearing entity changes. The handlers hand the event to the
//! garbage collector and answer immediately; cleanup runs on background
//! tasks that outlive the request.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{AppState, routes::error_response};

/// Creates the internal entity-event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/internal/entities/{entity_id}/updated", post(entity_updated))
        .route("/internal/entities/{entity_id}/deleted", post(entity_deleted))
        .route("/internal/users/{user_id}/images", delete(purge_user_images))
}

/// Request body for an entity content update event.
#[derive(Debug, Deserialize)]
pub struct EntityUpdatedRequest {
    /// Canonical content before the edit.
    pub old_content: String,
    /// Canonical content after the edit.
    pub new_content: String,
}

/// Response for a user purge.
#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    /// Number of images whose blobs were reclaimed.
    pub reclaimed: u64,
}

/// POST `/internal/entities/{entity_id}/updated`
/// Feed a content edit to the garbage collector.
async fn entity_updated(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
    Json(payload): Json<EntityUpdatedRequest>,
) -> impl IntoResponse {
    state
        .gc
        .on_entity_updated(entity_id, payload.old_content, payload.new_content);
    info!(entity_id = %entity_id, "Entity update event accepted");

    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

/// POST `/internal/entities/{entity_id}/deleted`
/// Feed an entity deletion to the garbage collector.
async fn entity_deleted(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
) -> impl IntoResponse {
    state.gc.on_entity_deleted(entity_id);
    info!(entity_id = %entity_id, "Entity delete event accepted");

    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

/// DELETE `/internal/users/{user_id}/images`
/// Remove every image a deleted user owned, bypassing the grace window.
///
/// Runs synchronously: account deletion is rare and the caller wants the
/// count.
async fn purge_user_images(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.gc.purge_user(user_id).await {
        Ok(reclaimed) => (StatusCode::OK, Json(PurgeResponse { reclaimed })).into_response(),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "User purge failed");
            error_response(&e)
        }
    }
}
