//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for upload, serving, deletion, and legacy migration
//! - Internal entity-event hooks that feed the garbage collector
//! - Identity middleware
//! - Response types

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use fable_core::gc::GarbageCollector;
use fable_core::image::UploadLimits;
use fable_core::storage::ProviderRegistry;
use fable_db::{ImageReferenceRepository, ImageRepository};

/// The garbage collector over the database-backed repositories.
pub type Gc = GarbageCollector<ImageRepository, ImageReferenceRepository>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Object store providers by name.
    pub registry: Arc<ProviderRegistry>,
    /// Image catalog repository.
    pub images: Arc<ImageRepository>,
    /// Garbage collector driving orphan cleanup.
    pub gc: Arc<Gc>,
    /// Upload validation limits.
    pub limits: UploadLimits,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
