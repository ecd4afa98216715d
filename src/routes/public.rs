use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in): the account gateway (register/login) and all
/// read-only catalog and review data.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates a new USER account. Uniqueness of username/email enforced by the store.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Verifies credentials and issues the signed bearer token.
        .route("/auth/login", post(handlers::login))
        // GET /api/books
        // Lists the whole catalog.
        .route("/api/books", get(handlers::get_books))
        // GET /api/books/{id}
        // Retrieves a single book.
        .route("/api/books/{id}", get(handlers::get_book))
        // GET /api/books/{id}/average-rating
        // The book's mean rating; 0.0 when it has no reviews.
        .route(
            "/api/books/{id}/average-rating",
            get(handlers::get_average_rating),
        )
        // GET /api/books/{book_id}/reviews
        // The book's review collection in creation order.
        .route("/api/books/{book_id}/reviews", get(handlers::get_reviews))
}
