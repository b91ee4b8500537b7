//! User domain
//!
//! Records, the authoritative repository, validation rules, and the
//! [`UserService`] that keeps the user cache consistent with the repository.

pub mod memory;
pub mod model;
pub mod repository;
pub mod service;
pub mod validation;

pub use memory::InMemoryUserRepository;
pub use model::{CreateUserInput, NewUser, UpdateUserInput, User, UserPage};
pub use repository::{PgUserRepository, StoreError, StoreResult, UserRepository};
pub use service::UserService;
