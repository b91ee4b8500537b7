//! Registration and login endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::users::PublicUser;
use crate::{auth::Authentication, error::AppResult, users::CreateUserInput, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Credentials plus the account they belong to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: Authentication,
    pub user: PublicUser,
}

/// POST /api/v1/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (token, user) = state.auth.register(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (token, user) = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}
