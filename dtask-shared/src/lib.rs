//! # dTask Shared Library
//!
//! Domain types, persistence and business logic for the dTask freelance
//! marketplace, used by the API server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, session tokens, caller identity
//! - `db`: PostgreSQL pool and migrations
//! - `error`: domain error taxonomy
//! - `models`: users, tasks, applicants and their SQL
//! - `services`: account and marketplace operations
//! - `store`: storage traits with PostgreSQL and in-memory backends

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the dTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
