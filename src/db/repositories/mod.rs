//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod user;

#[cfg(test)]
pub mod memory;

pub use user::{DuplicateEmail, SqlxUserRepository, UserRepository};
