//! Authoritative user store
//!
//! [`UserRepository`] is the source of truth the cache is derived from.
//! [`PgUserRepository`] implements it on Postgres. Emails are stored
//! normalized, so every lookup by email is case-insensitive.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use super::model::{NewUser, User};
use super::validation::normalize_email;

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Database(err),
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// User data operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return it with its assigned ID and timestamps
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: i64) -> StoreResult<User>;

    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> StoreResult<User>;

    /// Users ordered by ID
    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>>;

    async fn count(&self) -> StoreResult<i64>;

    /// Persist every mutable field of `user`, returning the stored row
    async fn update(&self, user: &User) -> StoreResult<User>;

    async fn delete(&self, id: i64) -> StoreResult<()>;

    /// Case-insensitive existence check
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;

    /// Liveness probe
    async fn ping(&self) -> StoreResult<()>;
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, phone_number, role, created_at, updated_at";

/// Postgres-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, phone_number, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(normalize_email(&user.email))
            .bind(&user.password_hash)
            .bind(&user.phone_number)
            .bind(&user.role)
            .fetch_one(&self.db)
            .await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    async fn count(&self) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(total)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update(&self, user: &User) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, password_hash = $5,
                phone_number = $6, role = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(normalize_email(&user.email))
            .bind(&user.password_hash)
            .bind(&user.phone_number)
            .bind(&user.role)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(normalize_email(email))
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
