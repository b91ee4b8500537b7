//! Process-local user repository for tests and local runs

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::model::{NewUser, User};
use super::repository::{StoreError, StoreResult, UserRepository};
use super::validation::normalize_email;

/// In-memory [`UserRepository`] with the same uniqueness and
/// normalization rules as the Postgres one
#[derive(Debug)]
pub struct InMemoryUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<i64, User>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<i64, User>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn email_taken(users: &BTreeMap<i64, User>, email: &str, except: Option<i64>) -> bool {
    users
        .values()
        .any(|u| Some(u.id) != except && u.email == email)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let email = normalize_email(&user.email);
        let mut users = self.write();
        if email_taken(&users, &email, None) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let created = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            first_name: user.first_name,
            last_name: user.last_name,
            email,
            password_hash: user.password_hash,
            phone_number: user.phone_number,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<User> {
        self.read().get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<User> {
        let email = normalize_email(email);
        self.read()
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self.read().values().skip(skip).take(take).cloned().collect())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.read().len() as i64)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let email = normalize_email(&user.email);
        let mut users = self.write();
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if email_taken(&users, &email, Some(user.id)) {
            return Err(StoreError::DuplicateEmail);
        }

        let mut stored = user.clone();
        stored.email = email;
        stored.updated_at = Utc::now();
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        self.write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let email = normalize_email(email);
        Ok(email_taken(&self.read(), &email, None))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
