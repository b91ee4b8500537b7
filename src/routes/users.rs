//! User CRUD endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    users::{validation::resolve_pagination, CreateUserInput, UpdateUserInput, User, UserPage},
    AppState,
};

/// A user as returned over HTTP; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone_number: user.phone_number,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub data: Vec<PublicUser>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl From<UserPage> for UserListResponse {
    fn from(page: UserPage) -> Self {
        Self {
            data: page.users.into_iter().map(PublicUser::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<UserListResponse>> {
    let (page, page_size) = resolve_pagination(query.page, query.page_size)
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;
    let page = state.users.list_users(page, page_size).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<PublicUser>> {
    let user = state.users.get_user_by_id(id).await?;
    Ok(Json(user.into()))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = state.users.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// PUT /api/v1/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(changes): Json<UpdateUserInput>,
) -> AppResult<Json<PublicUser>> {
    let user = state.users.update_user(id, changes).await?;
    Ok(Json(user.into()))
}

/// DELETE /api/v1/users/:id (admin only)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.users.delete_user(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
