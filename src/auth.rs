use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ApiError,
    models::{Role, User},
};

/// Claims
///
/// The payload structure signed into every issued JSON Web Token (JWT).
/// The claims fully describe the principal, so authenticating a request is a
/// pure signature + expiry check with no database round-trip: the token stays
/// valid until `exp` regardless of later server state (no revocation list).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user.
    pub sub: Uuid,
    /// The username at issue time, surfaced as the reviewer name.
    pub username: String,
    /// The role at issue time, used for all RBAC decisions.
    pub role: Role,
    /// Expiration Time (exp): timestamp after which the JWT must not be accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the JWT was issued.
    pub iat: usize,
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request — the "principal".
/// Handlers use this struct for ownership comparisons and role checks.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// issue_token
///
/// Signs a bearer token for a successfully authenticated user. The expiry is
/// `now + token_ttl_secs` from the loaded configuration.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        iat: now as usize,
        exp: (now + config.token_ttl_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::storage("issue token", e))
}

/// decode_token
///
/// Verifies a token's signature and expiry and returns its claims.
/// Any failure (expired, malformed, bad signature) is Unauthorized.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    // Ensure expiration time validation is always active.
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                ApiError::Unauthorized("Token has expired".to_string())
            }
            _ => ApiError::Unauthorized("Invalid authentication token".to_string()),
        })
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a function
/// argument in any authenticated handler. This cleanly separates authentication
/// (extractor) from business logic (the handler).
///
/// The process:
/// 1. Dependency Resolution: pulling AppConfig (JWT secret) from the app state.
/// 2. Token Extraction: `Authorization: Bearer <token>` header parsing.
/// 3. Token Validation: signature and expiry verification, pure computation.
///
/// Rejection: 401 Unauthorized with a structured message body on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;

        let claims = decode_token(token, &config.jwt_secret)?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        })
    }
}

// --- Authorization Policy ---
//
// Every role/ownership rule lives here so handlers apply them uniformly instead
// of re-deriving the checks inline.

/// Denies with Forbidden unless the principal holds the ADMIN role.
pub fn require_admin(principal: &AuthUser) -> Result<(), ApiError> {
    if principal.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }
    Ok(())
}

/// Denies with Forbidden unless the principal owns the resource or is an ADMIN.
/// The resource's existence is not hidden: a failed ownership check is 403,
/// never 404.
pub fn require_owner_or_admin(principal: &AuthUser, owner_id: Uuid) -> Result<(), ApiError> {
    if principal.id != owner_id && principal.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "You are not allowed to modify this resource".to_string(),
        ));
    }
    Ok(())
}

// --- Password Hashing ---

/// Hashes a raw password with Argon2id and a per-password random salt.
/// The raw password is consumed here and never stored or logged.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::storage("hash password", e))
}

/// Verifies a raw password against a stored hash. Comparison is constant-time
/// inside the argon2 crate. A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
