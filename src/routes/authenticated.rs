use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any principal who has passed the
/// authentication layer, regardless of role: submitting books and creating or
/// mutating reviews.
///
/// Access Control Strategy:
/// Every handler in this module relies on the auth middleware layered above it,
/// plus the `AuthUser` extractor, which guarantees a validated principal
/// (id, username, role). Review mutation additionally applies the
/// owner-or-admin policy check inside the handler, because it depends on the
/// loaded resource.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/books
        // Catalog submission; open to any authenticated role.
        .route("/api/books", post(handlers::create_book))
        // POST /api/books/{book_id}/reviews
        // Creates a review linked to the book and to the acting principal.
        .route("/api/books/{book_id}/reviews", post(handlers::add_review))
        // PUT/DELETE /api/books/{book_id}/reviews/{review_id}
        // Mutation of an existing review. The handler enforces the
        // owner-or-admin ownership check (403 on failure, never 404).
        .route(
            "/api/books/{book_id}/reviews/{review_id}",
            put(handlers::update_review).delete(handlers::delete_review),
        )
}
