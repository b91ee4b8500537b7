//! Authentication middleware
//!
//! Validates bearer JWTs and exposes the caller as [`AuthenticatedUser`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::{error::AppError, AppState};

/// Caller identity, inserted into request extensions by [`auth_middleware`].
///
/// Only the id is trusted from the token; the role is read from the record.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

/// Extract the Authorization header and return the bearer token
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = extract_bearer_token(auth_header).ok_or(AppError::InvalidToken)?;

    let claims = state.auth.keys().verify(token).map_err(|e| {
        warn!(error = %e, "JWT validation failed");
        AppError::InvalidToken
    })?;
    let user_id = claims.user_id().ok_or(AppError::InvalidToken)?;

    debug!(user_id, role = %claims.role, "User authenticated");

    request.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

/// Admin guard; runs after [`auth_middleware`].
///
/// The role is read from the current record rather than the token, so a
/// demotion takes effect before the token expires.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;

    let user = match state.users.get_user_by_id(caller.user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::Unauthorized),
        Err(e) => return Err(e),
    };

    if !user.is_admin() {
        warn!(user_id = caller.user_id, role = %user.role, "Admin role required");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
