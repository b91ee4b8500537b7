use tracing::{info, instrument, warn};

use super::jwt::{Authentication, JwtKeys};
use super::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::users::{CreateUserInput, User, UserService};

/// Registration and login on top of [`UserService`]
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: UserService, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: CreateUserInput) -> AppResult<(Authentication, User)> {
        let user = self.users.create_user(input).await?;
        let auth = self.keys.sign(&user)?;
        info!(user_id = user.id, "User registered");
        Ok((auth, user))
    }

    /// Unknown email and wrong password are indistinguishable to the caller
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(Authentication, User)> {
        let user = match self.users.get_user_by_email(email).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(AppError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => return Err(AppError::InvalidCredentials),
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Stored password hash is unreadable");
                return Err(AppError::InvalidCredentials);
            }
        }

        let auth = self.keys.sign(&user)?;
        info!(user_id = user.id, "User logged in");
        Ok((auth, user))
    }
}
