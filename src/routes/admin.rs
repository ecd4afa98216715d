use crate::{AppState, handlers};
use axum::{Router, routing::delete};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to principals with the ADMIN role.
///
/// Access Control:
/// Authentication happens through the `AuthUser` extractor in the handler
/// signature (401 on a missing/invalid token); the explicit ADMIN role check
/// (`auth::require_admin`) runs inside the handler before any repository call
/// and answers 403 otherwise.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // DELETE /api/books/{id}
        // Removes a book from the catalog; cascades deletion of its reviews.
        .route("/api/books/{id}", delete(handlers::delete_book))
}
