//! HS256 session tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::users::User;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: String,
    /// Per-session identifier
    pub api_key: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// The numeric user ID carried in `sub`
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Credentials handed to a client after register or login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authentication {
    pub api_key: String,
    pub jwt_token: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expiration_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(expiration_days),
        }
    }

    pub fn sign(&self, user: &User) -> anyhow::Result<Authentication> {
        let now = Utc::now();
        let api_key = Uuid::new_v4().to_string();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.clone(),
            api_key: api_key.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let jwt_token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = user.id, "jwt signed");
        Ok(Authentication { api_key, jwt_token })
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
