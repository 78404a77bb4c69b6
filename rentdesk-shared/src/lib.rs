//! # Rentdesk Shared Library
//!
//! Types and business rules shared by the Rentdesk API server and the
//! background worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their queries
//! - `auth`: Principal extraction, signed cookies, team context, permission guard
//! - `activation`: Onboarding stage tracking and module soft-locks
//! - `db`: Connection pool and migrations

pub mod activation;
pub mod auth;
pub mod db;
pub mod models;

/// Current version of the Rentdesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
