//! Data models
//!
//! Database entities and the inputs used to create and change them.

mod user;

pub use user::{CreateUserInput, UpdateUserInput, User, UserChanges, UserStatus};
