//! Caller identity extraction.
//!
//! This service sits behind the platform gateway, which authenticates the
//! session and forwards the caller's ID in the `x-user-id` header. Handlers
//! that need an identity take [`AuthUser`] as an extractor; requests without
//! a valid header are rejected with 401 before the handler runs.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Header carrying the gateway-authenticated user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the authenticated caller.
///
/// Use this in handlers to get the calling user's ID:
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     let user_id = auth.user_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(Uuid);

impl AuthUser {
    /// Returns the authenticated user's ID.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.0
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Err(unauthorized("Missing user identity header"));
        };
        let id = value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| unauthorized("Malformed user identity header"))?;
        Ok(Self(id))
    }
}
