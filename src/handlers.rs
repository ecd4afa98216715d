use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    models::{
        Book, CreateBookRequest, LoginRequest, RegisterRequest, Review, ReviewPayload, ReviewView,
        TokenResponse, User, UserView,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a new account with role USER. The raw password is
/// hashed (salted Argon2id) before persistence and never logged or echoed back.
/// Username and email uniqueness are enforced by the store constraints, so two
/// concurrent registrations for the same identifier cannot both succeed.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = UserView),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserView>, ApiError> {
    payload.validate()?;

    let user = User {
        id: Uuid::new_v4(),
        username: payload.username,
        email: payload.email,
        password_hash: auth::hash_password(&payload.password)?,
        role: Default::default(),
    };

    let created = state.repo.create_user(user).await?;
    Ok(Json(UserView::from(created)))
}

/// login
///
/// [Public Route] Resolves the account by username or email and verifies the
/// password against the stored hash. On success issues a signed bearer token
/// embedding the principal's identity and role.
///
/// The same Unauthorized response covers an unknown identifier and a wrong
/// password, so the endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Unknown account or wrong password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .repo
        .find_user_by_login(&payload.username_or_email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = auth::issue_token(&user, &state.config)?;
    Ok(Json(TokenResponse { token }))
}

// --- Book Handlers ---

/// create_book
///
/// [Authenticated Route] Submits a new book to the catalog. Field validation
/// runs first; the (title, author) uniqueness check and the insert are a single
/// statement against the store's unique constraint.
#[utoipa::path(
    post,
    path = "/api/books",
    request_body = CreateBookRequest,
    responses(
        (status = 200, description = "Created", body = Book),
        (status = 400, description = "Invalid book data"),
        (status = 409, description = "Book with same title and author already exists")
    )
)]
pub async fn create_book(
    _principal: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<Json<Book>, ApiError> {
    payload.validate()?;

    let book = Book {
        id: Uuid::new_v4(),
        title: payload.title,
        author: payload.author,
        genre: payload.genre,
    };

    let created = state.repo.create_book(book).await?;
    Ok(Json(created))
}

/// get_books
///
/// [Public Route] Lists every book in the catalog; may be empty.
#[utoipa::path(
    get,
    path = "/api/books",
    responses((status = 200, description = "All books", body = [Book]))
)]
pub async fn get_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.repo.list_books().await?))
}

/// get_book
///
/// [Public Route] Retrieves a single book by id.
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Found", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Book>, ApiError> {
    let book = state
        .repo
        .get_book(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book", id))?;
    Ok(Json(book))
}

/// delete_book
///
/// [Admin Route] Removes a book from the catalog. The ownership invariant makes
/// this cascade: all of the book's reviews are deleted with it.
///
/// *RBAC*: strict enforcement of the ADMIN role before touching the repository.
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth::require_admin(&principal)?;

    if state.repo.delete_book(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Book", id))
    }
}

/// get_average_rating
///
/// [Public Route] The arithmetic mean of the book's current ratings, computed
/// as sum/count in floating point with no rounding. A book with no reviews
/// reports exactly 0.0.
#[utoipa::path(
    get,
    path = "/api/books/{id}/average-rating",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Average rating", body = f64),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_average_rating(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<f64>, ApiError> {
    state
        .repo
        .get_book(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book", id))?;

    Ok(Json(state.repo.average_rating(id).await?))
}

// --- Review Handlers ---

/// add_review
///
/// [Authenticated Route] Submits a review against an existing book. The review
/// is linked to that book and to the authenticated principal at creation; both
/// links are immutable afterwards. `created_at` and `updated_at` are set to now.
#[utoipa::path(
    post,
    path = "/api/books/{book_id}/reviews",
    params(("book_id" = Uuid, Path, description = "Book ID")),
    request_body = ReviewPayload,
    responses(
        (status = 200, description = "Review created", body = ReviewView),
        (status = 400, description = "Invalid review data"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn add_review(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<ReviewPayload>,
) -> Result<Json<ReviewView>, ApiError> {
    state
        .repo
        .get_book(book_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book", book_id))?;

    payload.validate()?;

    // A token always carries the username it was issued with; an empty one
    // would make the review unattributable.
    if principal.username.trim().is_empty() {
        return Err(ApiError::Validation(
            "Reviewer username cannot be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4(),
        book_id,
        user_id: principal.id,
        comment: payload.comment,
        rating: payload.rating,
        created_at: now,
        updated_at: now,
        reviewer_name: Some(principal.username),
    };

    let created = state.repo.insert_review(review).await?;
    Ok(Json(ReviewView::from(created)))
}

/// update_review
///
/// [Owner-or-Admin Route] Replaces a review's comment and rating and bumps
/// `updated_at`. The acting principal must be the review's author or an ADMIN;
/// a failed ownership check is 403, not 404 — the resource's existence is not
/// hidden.
#[utoipa::path(
    put,
    path = "/api/books/{book_id}/reviews/{review_id}",
    params(
        ("book_id" = Uuid, Path, description = "Book ID"),
        ("review_id" = Uuid, Path, description = "Review ID")
    ),
    request_body = ReviewPayload,
    responses(
        (status = 200, description = "Updated", body = ReviewView),
        (status = 403, description = "Not the author and not an admin"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    principal: AuthUser,
    State(state): State<AppState>,
    Path((_book_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewPayload>,
) -> Result<Json<ReviewView>, ApiError> {
    let existing = state
        .repo
        .get_review(review_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", review_id))?;

    auth::require_owner_or_admin(&principal, existing.user_id)?;
    payload.validate()?;

    let updated = state
        .repo
        .update_review(review_id, &payload.comment, payload.rating)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", review_id))?;

    Ok(Json(ReviewView::from(updated)))
}

/// delete_review
///
/// [Owner-or-Admin Route] Removes a review, and with it its membership in the
/// book's and user's collections.
#[utoipa::path(
    delete,
    path = "/api/books/{book_id}/reviews/{review_id}",
    params(
        ("book_id" = Uuid, Path, description = "Book ID"),
        ("review_id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author and not an admin"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    principal: AuthUser,
    State(state): State<AppState>,
    Path((_book_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let existing = state
        .repo
        .get_review(review_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", review_id))?;

    auth::require_owner_or_admin(&principal, existing.user_id)?;

    if state.repo.delete_review(review_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Review", review_id))
    }
}

/// get_reviews
///
/// [Public Route] The book's current review collection in creation order.
/// Empty array (never null) when the book has no reviews; 404 when the book
/// itself does not exist.
#[utoipa::path(
    get,
    path = "/api/books/{book_id}/reviews",
    params(("book_id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Reviews", body = [ReviewView]),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewView>>, ApiError> {
    state
        .repo
        .get_book(book_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book", book_id))?;

    let reviews = state.repo.list_reviews_for_book(book_id).await?;
    Ok(Json(reviews.into_iter().map(ReviewView::from).collect()))
}
