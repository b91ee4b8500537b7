//! Integration tests for Roster
//!
//! These drive the real router end to end, with the in-memory repository and
//! counter stores standing in for Postgres and Redis.

mod cache_aside;
mod rate_limiting;
mod users;
