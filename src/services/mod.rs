//! Services layer - Business logic
//!
//! Services implement the business rules and sit between the HTTP handlers
//! and the repositories:
//! - `user`: registration, lookup, update and delete with access checks
//! - `auth`: login, session lookup and token refresh
//! - `token`: JWT access/refresh pairs
//! - `password`: bcrypt hashing

pub mod auth;
pub mod password;
pub mod token;
pub mod user;

pub use auth::{AuthService, AuthServiceError};
pub use password::{hash_password, verify_password};
pub use token::{Claims, JwtManager, TokenError, TokenPair, TokenType};
pub use user::{UserService, UserServiceError};
