use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Book, Review, User},
};

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres, in-memory).
///
/// Every mutation executes as a single statement against the store, so the
/// invariant checks (uniqueness, foreign keys) and the write commit or fail
/// together; check-then-act races are closed by store-level constraints, not
/// application-level lookups.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users / Credential Store ---
    /// Persists a new account. Fails with Conflict if the username or email is taken.
    async fn create_user(&self, user: User) -> Result<User, ApiError>;
    /// Resolves an account by username **or** email (the login identifier).
    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, ApiError>;

    // --- Book Catalog ---
    /// Persists a new book. Fails with Conflict if (title, author) already exists.
    async fn create_book(&self, book: Book) -> Result<Book, ApiError>;
    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, ApiError>;
    async fn list_books(&self) -> Result<Vec<Book>, ApiError>;
    /// Deletes a book and, through the cascade, all of its reviews.
    /// Returns false if no book with that id existed.
    async fn delete_book(&self, id: Uuid) -> Result<bool, ApiError>;

    // --- Review Ledger ---
    /// Persists a new review, returning it enriched with the reviewer's username.
    async fn insert_review(&self, review: Review) -> Result<Review, ApiError>;
    async fn get_review(&self, id: Uuid) -> Result<Option<Review>, ApiError>;
    /// Updates comment, rating and `updated_at`; the book/author linkage is immutable.
    /// Returns None if no review with that id exists.
    async fn update_review(
        &self,
        id: Uuid,
        comment: &str,
        rating: i32,
    ) -> Result<Option<Review>, ApiError>;
    /// Returns false if no review with that id existed.
    async fn delete_review(&self, id: Uuid) -> Result<bool, ApiError>;
    /// A book's current review collection, in creation order. Empty, never null.
    async fn list_reviews_for_book(&self, book_id: Uuid) -> Result<Vec<Review>, ApiError>;

    // --- Rating Aggregator ---
    /// Arithmetic mean of the book's ratings as sum/count in floating point,
    /// no rounding. Exactly 0.0 when the book has no reviews. Existence of the
    /// book itself is checked by the caller.
    async fn average_rating(&self, book_id: Uuid) -> Result<f64, ApiError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres Implementation ---

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Uniqueness and referential integrity are delegated to the schema constraints
/// (`users_username_key`, `users_email_key`, `books_title_author_key`, the review
/// foreign keys with ON DELETE CASCADE); this type only translates constraint
/// violations into the business error taxonomy.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique-constraint violation to Conflict using the violated constraint's
/// name; anything else becomes a Storage failure tagged with the operation.
fn map_write_err(operation: &'static str, err: sqlx::Error) -> ApiError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some("users_username_key") => "Username already exists",
                Some("users_email_key") => "Email already exists",
                Some("books_title_author_key") => {
                    "A book with this title and author already exists"
                }
                _ => "Resource already exists",
            };
            return ApiError::Conflict(message.to_string());
        }
        if db_err.is_foreign_key_violation() {
            // The referenced book or user vanished between the handler's check
            // and this insert.
            let message = match db_err.constraint() {
                Some("reviews_user_id_fkey") => "User no longer exists",
                _ => "Book no longer exists",
            };
            return ApiError::NotFound(message.to_string());
        }
    }
    ApiError::storage(operation, err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, role
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_err("create user", e))
    }

    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role
            FROM users
            WHERE username = $1 OR email = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::storage("find user by login", e))
    }

    async fn create_book(&self, book: Book) -> Result<Book, ApiError> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, genre)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, author, genre
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_err("create book", e))
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, ApiError> {
        sqlx::query_as::<_, Book>("SELECT id, title, author, genre FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::storage("get book", e))
    }

    async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        sqlx::query_as::<_, Book>("SELECT id, title, author, genre FROM books")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApiError::storage("list books", e))
    }

    async fn delete_book(&self, id: Uuid) -> Result<bool, ApiError> {
        // The reviews go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| ApiError::storage("delete book", e))
    }

    async fn insert_review(&self, review: Review) -> Result<Review, ApiError> {
        // CTE so the insert and the reviewer-name join happen in one round-trip.
        sqlx::query_as::<_, Review>(
            r#"
            WITH inserted AS (
                INSERT INTO reviews (id, book_id, user_id, comment, rating, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, book_id, user_id, comment, rating, created_at, updated_at
            )
            SELECT i.id, i.book_id, i.user_id, i.comment, i.rating, i.created_at, i.updated_at,
                   u.username AS reviewer_name
            FROM inserted i
            JOIN users u ON i.user_id = u.id
            "#,
        )
        .bind(review.id)
        .bind(review.book_id)
        .bind(review.user_id)
        .bind(&review.comment)
        .bind(review.rating)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_err("insert review", e))
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>, ApiError> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT r.id, r.book_id, r.user_id, r.comment, r.rating, r.created_at, r.updated_at,
                   u.username AS reviewer_name
            FROM reviews r
            LEFT JOIN users u ON r.user_id = u.id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::storage("get review", e))
    }

    async fn update_review(
        &self,
        id: Uuid,
        comment: &str,
        rating: i32,
    ) -> Result<Option<Review>, ApiError> {
        sqlx::query_as::<_, Review>(
            r#"
            WITH updated AS (
                UPDATE reviews
                SET comment = $2, rating = $3, updated_at = NOW()
                WHERE id = $1
                RETURNING id, book_id, user_id, comment, rating, created_at, updated_at
            )
            SELECT up.id, up.book_id, up.user_id, up.comment, up.rating, up.created_at,
                   up.updated_at, u.username AS reviewer_name
            FROM updated up
            LEFT JOIN users u ON up.user_id = u.id
            "#,
        )
        .bind(id)
        .bind(comment)
        .bind(rating)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::storage("update review", e))
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool, ApiError> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| ApiError::storage("delete review", e))
    }

    async fn list_reviews_for_book(&self, book_id: Uuid) -> Result<Vec<Review>, ApiError> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT r.id, r.book_id, r.user_id, r.comment, r.rating, r.created_at, r.updated_at,
                   u.username AS reviewer_name
            FROM reviews r
            LEFT JOIN users u ON r.user_id = u.id
            WHERE r.book_id = $1
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiError::storage("list reviews for book", e))
    }

    async fn average_rating(&self, book_id: Uuid) -> Result<f64, ApiError> {
        sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(AVG(rating)::DOUBLE PRECISION, 0.0) FROM reviews WHERE book_id = $1",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::storage("average rating", e))
    }
}

// --- In-Memory Implementation ---

/// MemoryRepository
///
/// An in-process implementation of `Repository` used by the integration tests,
/// mirroring the same invariants the Postgres schema enforces (unique username,
/// email and (title, author); cascade delete of a book's reviews). All state
/// sits behind a single mutex so each operation is atomic.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    books: Vec<Book>,
    // Insertion order doubles as creation order for review listings.
    reviews: Vec<Review>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        let mut state = self.inner.lock().unwrap();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(ApiError::Conflict("Username already exists".to_string()));
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, ApiError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn create_book(&self, book: Book) -> Result<Book, ApiError> {
        let mut state = self.inner.lock().unwrap();
        if state
            .books
            .iter()
            .any(|b| b.title == book.title && b.author == book.author)
        {
            return Err(ApiError::Conflict(
                "A book with this title and author already exists".to_string(),
            ));
        }
        state.books.push(book.clone());
        Ok(book)
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, ApiError> {
        let state = self.inner.lock().unwrap();
        Ok(state.books.iter().find(|b| b.id == id).cloned())
    }

    async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        let state = self.inner.lock().unwrap();
        Ok(state.books.clone())
    }

    async fn delete_book(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut state = self.inner.lock().unwrap();
        let before = state.books.len();
        state.books.retain(|b| b.id != id);
        let deleted = state.books.len() < before;
        if deleted {
            // Cascade: the book's reviews go with it.
            state.reviews.retain(|r| r.book_id != id);
        }
        Ok(deleted)
    }

    async fn insert_review(&self, mut review: Review) -> Result<Review, ApiError> {
        let mut state = self.inner.lock().unwrap();
        if !state.books.iter().any(|b| b.id == review.book_id) {
            return Err(ApiError::NotFound("Book no longer exists".to_string()));
        }
        let Some(author) = state.users.iter().find(|u| u.id == review.user_id) else {
            return Err(ApiError::NotFound("User no longer exists".to_string()));
        };
        review.reviewer_name = Some(author.username.clone());
        state.reviews.push(review.clone());
        Ok(review)
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>, ApiError> {
        let state = self.inner.lock().unwrap();
        Ok(state.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn update_review(
        &self,
        id: Uuid,
        comment: &str,
        rating: i32,
    ) -> Result<Option<Review>, ApiError> {
        let mut state = self.inner.lock().unwrap();
        let Some(review) = state.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        review.comment = comment.to_string();
        review.rating = rating;
        review.updated_at = Utc::now();
        Ok(Some(review.clone()))
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut state = self.inner.lock().unwrap();
        let before = state.reviews.len();
        state.reviews.retain(|r| r.id != id);
        Ok(state.reviews.len() < before)
    }

    async fn list_reviews_for_book(&self, book_id: Uuid) -> Result<Vec<Review>, ApiError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn average_rating(&self, book_id: Uuid) -> Result<f64, ApiError> {
        let state = self.inner.lock().unwrap();
        let ratings: Vec<i32> = state
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .map(|r| r.rating)
            .collect();
        if ratings.is_empty() {
            return Ok(0.0);
        }
        let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
        Ok(sum as f64 / ratings.len() as f64)
    }
}
