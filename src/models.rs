use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field carried by every account and embedded in issued tokens.
/// Stored in the `users.role` column as the uppercase strings `USER` / `ADMIN`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User
///
/// The canonical account record stored in the `users` table. The password hash
/// never leaves the server: it is skipped during serialization and only the
/// `UserView` projection is returned by handlers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    // Unique login identifier, also shown as the reviewer name on reviews.
    pub username: String,
    // Unique; accepted as an alternative login identifier.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

/// Book
///
/// A catalog entry from the `books` table. The pair (title, author) is unique,
/// enforced by the `books_title_author_key` constraint rather than an
/// application-level check, so concurrent duplicate submissions cannot both
/// succeed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
}

/// Review
///
/// A review row from the `reviews` table. Reviews are stored once, keyed by id,
/// with foreign keys to their book and authoring user; a book's review collection
/// is a query by `book_id`, not a maintained in-memory list. Both links are fixed
/// at creation and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Review {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub comment: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Loaded via a JOIN on users; absent when the row is built without one.
    #[sqlx(default)]
    pub reviewer_name: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for POST /auth/register. The password is hashed before
/// persistence and is never logged or echoed back.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() {
            return Err(ApiError::Validation(
                "Username cannot be empty".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation(
                "Email address is not valid".to_string(),
            ));
        }
        if self.password.len() < 8 {
            return Err(ApiError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// LoginRequest
///
/// Input payload for POST /auth/login. The identifier may be either the
/// username or the email address.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// CreateBookRequest
///
/// Input payload for POST /api/books.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub genre: String,
}

impl CreateBookRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation(
                "Book title cannot be empty".to_string(),
            ));
        }
        if self.author.trim().is_empty() {
            return Err(ApiError::Validation(
                "Book author cannot be empty".to_string(),
            ));
        }
        if self.genre.trim().is_empty() {
            return Err(ApiError::Validation(
                "Book genre cannot be empty".to_string(),
            ));
        }
        if self.title.len() > 255 {
            return Err(ApiError::Validation(
                "Book title cannot exceed 255 characters".to_string(),
            ));
        }
        if self.author.len() > 255 {
            return Err(ApiError::Validation(
                "Book author cannot exceed 255 characters".to_string(),
            ));
        }
        if self.genre.len() > 50 {
            return Err(ApiError::Validation(
                "Book genre cannot exceed 50 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// ReviewPayload
///
/// Input payload shared by review creation (POST) and update (PUT); both carry
/// exactly a comment and a rating. The book and author links are never part of
/// the payload: they come from the URL and the authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ReviewPayload {
    pub comment: String,
    pub rating: i32,
}

impl ReviewPayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.comment.trim().is_empty() {
            return Err(ApiError::Validation(
                "Review comment cannot be empty".to_string(),
            ));
        }
        if self.comment.len() > 1000 {
            return Err(ApiError::Validation(
                "Review comment cannot exceed 1000 characters".to_string(),
            ));
        }
        if self.rating < 1 || self.rating > 5 {
            return Err(ApiError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Response Views (Output Schemas) ---

/// UserView
///
/// Registration response projection: everything about the account except the
/// password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

/// TokenResponse
///
/// Login response carrying the signed bearer token. The token is opaque to the
/// client and must be presented as `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// ReviewView
///
/// Review response projection, enriched with the reviewer's username. If the
/// linked user can somehow not be resolved the name falls back to "Unknown";
/// the id is still reported as stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: Uuid,
    pub comment: String,
    pub rating: i32,
    pub reviewer_name: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            comment: review.comment,
            rating: review.rating,
            reviewer_name: review
                .reviewer_name
                .unwrap_or_else(|| "Unknown".to_string()),
            user_id: Some(review.user_id),
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// Minimal syntactic email check: one '@' with a non-empty local part and a
/// domain containing a dot. Full RFC validation is deliberately out of scope.
fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
