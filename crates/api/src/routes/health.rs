//! Health check endpoints.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Configured object store providers.
    pub providers: Vec<String>,
}

/// Health check handler. Lists the registered providers so a probe can tell
/// a misconfigured instance from a healthy one.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut providers: Vec<String> = state.registry.names().map(str::to_string).collect();
    providers.sort_unstable();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        providers,
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
