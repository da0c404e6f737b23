//! User model
//!
//! The only entity the backend persists. Rows live in `cms.users`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered dashboard user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i32,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// bcrypt hash, stored in the `password` column
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Postal address
    pub address: Option<String>,
    /// Account status
    pub status: UserStatus,
    /// Administrator flag
    pub is_admin: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        address: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            address,
            status: UserStatus::default(),
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this user may modify the record with the given id
    pub fn can_modify(&self, user_id: i32) -> bool {
        self.is_admin || self.id == user_id
    }

    /// Check if the account is active
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Account status. Stored and serialized as `Active` / `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    /// New registrations start inactive
    #[default]
    Inactive,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub address: Option<String>,
}

impl CreateUserInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// Input for updating a user. Only provided fields change.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    /// New plaintext password (will be hashed)
    pub password: Option<String>,
    pub address: Option<String>,
    pub status: Option<UserStatus>,
    pub is_admin: Option<bool>,
}

impl UpdateUserInput {
    /// Whether the update touches fields only administrators may change
    pub fn changes_privileges(&self) -> bool {
        self.status.is_some() || self.is_admin.is_some()
    }
}

/// Column changes handed to the repository, password already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    /// `Some(None)` clears the address
    pub address: Option<Option<String>>,
    pub status: Option<UserStatus>,
    pub is_admin: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.address.is_none()
            && self.status.is_none()
            && self.is_admin.is_none()
    }
}
