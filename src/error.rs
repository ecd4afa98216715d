use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// ApiError
///
/// The single error taxonomy used by every fallible operation in the application.
/// Business violations (Validation, Conflict, NotFound) are raised at the point of
/// violation and propagate unmodified to the HTTP boundary, where the `IntoResponse`
/// implementation below maps each variant to its status code and a structured
/// `{ "message": ... }` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input. Maps to 400 Bad Request.
    #[error("{0}")]
    Validation(String),

    /// A unique key (username, email, book title+author) is already taken.
    /// Maps to 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// A referenced entity does not exist. Maps to 404 Not Found.
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid credentials/token. Maps to 401 Unauthorized.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role or ownership. Maps to 403 Forbidden.
    #[error("{0}")]
    Forbidden(String),

    /// Any unexpected failure from the persistence layer (or another infrastructure
    /// component) not otherwise classified. The failed operation and underlying
    /// cause are kept for diagnostics; the client only sees a generic 500.
    #[error("operation failed: {operation}")]
    Storage {
        operation: &'static str,
        detail: String,
    },
}

impl ApiError {
    /// Builds the canonical not-found error for an entity referenced by id.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("{entity} not found with ID: {id}"))
    }

    /// Wraps an unclassified infrastructure failure, preserving the cause for logs.
    pub fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        ApiError::Storage {
            operation,
            detail: err.to_string(),
        }
    }
}

/// ErrorBody
///
/// The structured JSON body returned for every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Storage { operation, detail } => {
                // Log the real cause but never leak internal detail to the client.
                tracing::error!(%operation, %detail, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
