//! services/api/src/web/middleware.rs
//!
//! Identifies the calling user on protected routes.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::warn;
use uuid::Uuid;

/// The header carrying the user id issued by the external auth backend.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that reads the `x-user-id` header and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If missing or malformed, returns 401 Unauthorized.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    // 1. Extract the header
    let user_id_str = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                "x-user-id header is required".to_string(),
            )
        })?;

    // 2. Parse and validate it
    let user_id = Uuid::parse_str(user_id_str)
        .ok()
        .filter(|id| !id.is_nil())
        .ok_or_else(|| {
            warn!("Rejected malformed user id header: {}", user_id_str);
            (
                StatusCode::UNAUTHORIZED,
                "Invalid x-user-id format".to_string(),
            )
        })?;

    // 3. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
