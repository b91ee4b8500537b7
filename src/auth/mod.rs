//! Authentication
//!
//! Argon2 password hashing, HS256 tokens, and the register/login flows.

pub mod jwt;
pub mod password;
pub mod service;

pub use jwt::{Authentication, Claims, JwtKeys};
pub use service::AuthService;
