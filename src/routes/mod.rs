/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// The three modules map directly to the authorization policy table.

/// Routes accessible to all clients (registration, login, read-only catalog data).
pub mod public;

/// Routes protected by the auth middleware. Requires a valid bearer token.
pub mod authenticated;

/// Routes whose handlers additionally require the ADMIN role.
pub mod admin;
