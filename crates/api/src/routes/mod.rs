//! API route definitions.

use axum::{Json, Router, http::StatusCode, response::IntoResponse, response::Response};
use serde_json::json;

use crate::AppState;
use fable_core::image::ImageError;
use fable_shared::AppError;

pub mod entities;
pub mod health;
pub mod images;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(images::routes())
        .merge(entities::routes())
}

/// Map a domain error onto the application error taxonomy.
///
/// Messages are generic by class; details go to the log at the call site,
/// not to the client.
fn to_app_error(e: &ImageError) -> AppError {
    match e {
        ImageError::Validation(msg) => AppError::Validation(msg.clone()),
        ImageError::NotFound(_) => AppError::NotFound("Image not found".to_string()),
        ImageError::Forbidden(_) => AppError::Forbidden("You do not own this image".to_string()),
        ImageError::Provider(_) => {
            AppError::ExternalService("Storage backend error".to_string())
        }
        ImageError::Repository(_) => AppError::Database("An error occurred".to_string()),
    }
}

/// Build the JSON error response for a domain error.
pub(crate) fn error_response(e: &ImageError) -> Response {
    let app_error = to_app_error(e);
    let status =
        StatusCode::from_u16(app_error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        Json(json!({
            "error": app_error.error_code(),
            "message": app_error.to_string()
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_response_status_mapping() {
        let id = Uuid::new_v4();
        let cases = [
            (ImageError::validation("bad"), StatusCode::BAD_REQUEST),
            (ImageError::not_found(id), StatusCode::NOT_FOUND),
            (ImageError::Forbidden(id), StatusCode::FORBIDDEN),
            (
                ImageError::repository("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error_response(&error).status(), expected);
        }
    }

    #[test]
    fn test_repository_details_do_not_leak() {
        let app_error = to_app_error(&ImageError::repository("connection refused to 10.0.0.3"));
        assert!(!app_error.to_string().contains("10.0.0.3"));
    }
}
