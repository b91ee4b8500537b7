//! Cache-aside user service
//!
//! The repository is always written first; the cache is only touched after
//! the repository has acknowledged the mutation. Cache failures are logged
//! and absorbed here, so nothing above this layer ever sees a `CacheError`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::model::{CreateUserInput, NewUser, UpdateUserInput, User, UserPage, DEFAULT_ROLE};
use super::repository::UserRepository;
use super::validation::{
    is_valid_email, is_valid_role, normalize_email, validate_password_strength,
};
use crate::auth::password::hash_password;
use crate::cache::UserCache;
use crate::error::{AppError, AppResult};

/// User operations backed by the repository, fronted by the user cache
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    cache: UserCache,
    ttl: Duration,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, cache: UserCache, ttl: Duration) -> Self {
        Self { repo, cache, ttl }
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repo
    }

    pub fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// Validate, hash, insert, then warm both cache keys
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        if !is_valid_email(&input.email) {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }
        validate_password_strength(&input.password)
            .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

        let role = input.role.unwrap_or_else(|| DEFAULT_ROLE.to_string());
        if !is_valid_role(&role) {
            return Err(AppError::BadRequest("Invalid role".to_string()));
        }

        if self.repo.exists_by_email(&input.email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = self
            .repo
            .create(NewUser {
                first_name: input.first_name,
                last_name: input.last_name,
                email: normalize_email(&input.email),
                password_hash: hash_password(&input.password)?,
                phone_number: input.phone_number,
                role,
            })
            .await?;

        self.populate(&user).await;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_id(&self, id: i64) -> AppResult<User> {
        match self.cache.get_by_id(id).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => warn!(user_id = id, error = %e, "User cache read failed; using database"),
        }

        let user = self.repo.find_by_id(id).await?;
        self.populate(&user).await;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        match self.cache.get_by_email(email).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => warn!(email, error = %e, "User cache read failed; using database"),
        }

        let user = self.repo.find_by_email(email).await?;
        self.populate(&user).await;
        Ok(user)
    }

    /// One page of users, read straight from the repository
    #[instrument(skip(self))]
    pub async fn list_users(&self, page: u32, page_size: u32) -> AppResult<UserPage> {
        let limit = i64::from(page_size.max(1));
        let offset = i64::from(page.saturating_sub(1)) * limit;

        let total = self.repo.count().await?;
        let users = self.repo.list(limit, offset).await?;

        Ok(UserPage {
            users,
            total,
            page,
            page_size: page_size.max(1),
            total_pages: (total + limit - 1) / limit,
        })
    }

    /// Apply a partial update.
    ///
    /// Works on a fresh repository copy so the old email is known. After the
    /// write, the stale keys are removed before the new record is cached.
    #[instrument(skip(self, changes))]
    pub async fn update_user(&self, id: i64, changes: UpdateUserInput) -> AppResult<User> {
        if changes.is_empty() {
            return Err(AppError::BadRequest(
                "At least one field must be provided".to_string(),
            ));
        }

        let current = self.repo.find_by_id(id).await?;
        let old_email = current.email.clone();
        let mut updated = current;

        if let Some(email) = changes.email {
            let email = normalize_email(&email);
            if email != old_email {
                if !is_valid_email(&email) {
                    return Err(AppError::BadRequest("Invalid email format".to_string()));
                }
                if self.repo.exists_by_email(&email).await? {
                    return Err(AppError::Conflict("Email already registered".to_string()));
                }
            }
            updated.email = email;
        }
        if let Some(password) = changes.password {
            validate_password_strength(&password)
                .map_err(|msg| AppError::BadRequest(msg.to_string()))?;
            updated.password_hash = hash_password(&password)?;
        }
        if let Some(role) = changes.role {
            if !is_valid_role(&role) {
                return Err(AppError::BadRequest("Invalid role".to_string()));
            }
            updated.role = role;
        }
        if let Some(first_name) = changes.first_name {
            updated.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            updated.last_name = last_name;
        }
        if let Some(phone_number) = changes.phone_number {
            updated.phone_number = phone_number;
        }

        let updated = self.repo.update(&updated).await?;

        if updated.email != old_email {
            debug!(user_id = id, "Email changed; dropping old cache keys");
            if let Err(e) = self.cache.invalidate_by_email(&old_email).await {
                warn!(user_id = id, error = %e, "Failed to invalidate old email key");
            }
            if let Err(e) = self.cache.invalidate_by_id(id).await {
                warn!(user_id = id, error = %e, "Failed to invalidate id key");
            }
        } else if let Err(e) = self.cache.invalidate(id, &old_email).await {
            warn!(user_id = id, error = %e, "Failed to invalidate user cache");
        }

        self.populate(&updated).await;
        Ok(updated)
    }

    /// Delete a user and both of its cache keys
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        let user = self.repo.find_by_id(id).await?;

        // A concurrent delete that got there first surfaces as NotFound
        self.repo.delete(id).await?;

        if let Err(e) = self.cache.invalidate(id, &user.email).await {
            warn!(user_id = id, error = %e, "Failed to invalidate user cache");
        }
        Ok(())
    }

    /// Best-effort write of both keys from one record
    async fn populate(&self, user: &User) {
        if let Err(e) = self.cache.set_by_id(user.id, user, self.ttl).await {
            warn!(user_id = user.id, error = %e, "Failed to cache user by id");
        }
        if let Err(e) = self.cache.set_by_email(&user.email, user, self.ttl).await {
            warn!(user_id = user.id, error = %e, "Failed to cache user by email");
        }
    }
}
