//! User service
//!
//! Business rules for dashboard users:
//! - Registration with bcrypt hashing and unique emails
//! - Credential checks used by login
//! - Reading, updating and deleting users, with owner-or-admin checks

use crate::db::repositories::{DuplicateEmail, UserRepository};
use crate::models::{CreateUserInput, UpdateUserInput, User, UserChanges};
use crate::services::password::{hash_password, verify_dummy, verify_password};
use anyhow::Context;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Validation error (invalid input)
    #[error("{0}")]
    ValidationError(String),

    /// Email is already registered to another user
    #[error("Email already exists")]
    EmailTaken,

    /// No user with the requested id
    #[error("User not found")]
    NotFound,

    /// Caller may not perform this change
    #[error("{0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    /// Translate repository failures, keeping unique-email violations typed
    fn from_repo(err: anyhow::Error) -> Self {
        if err.downcast_ref::<DuplicateEmail>().is_some() {
            UserServiceError::EmailTaken
        } else {
            UserServiceError::InternalError(err)
        }
    }
}

/// User service for managing users
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Register a new user.
    ///
    /// New accounts start `Inactive` and without admin rights.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if name, email or password is missing or the
    ///   email is malformed
    /// - `EmailTaken` if the email is already registered
    /// - `InternalError` for database errors
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let name = input.name.trim();
        let email = input.email.trim();
        validate_required(name, email, &input.password)?;
        validate_email(email)?;

        if self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::EmailTaken);
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let address = input.address.filter(|a| !a.trim().is_empty());
        let user = User::new(name.to_string(), email.to_string(), password_hash, address);

        // A concurrent registration can still win the race past the check above.
        let created = self
            .user_repo
            .create(&user)
            .await
            .map_err(UserServiceError::from_repo)?;

        tracing::info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Check credentials.
    ///
    /// Returns `None` for an unknown email or a wrong password; callers must
    /// not tell the two apart.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let Some(user) = self
            .user_repo
            .get_by_email(email.trim())
            .await
            .context("Failed to get user")?
        else {
            verify_dummy(password);
            return Ok(None);
        };

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        Ok(valid.then_some(user))
    }

    /// Get user by ID
    pub async fn get(&self, id: i32) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)
    }

    /// List all users ordered by id
    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }

    /// Update a user on behalf of `actor`.
    ///
    /// Only provided fields change. A new password is re-hashed. Users may
    /// edit their own profile; editing someone else or touching `status` /
    /// `is_admin` requires an administrator.
    pub async fn update(
        &self,
        actor: &User,
        id: i32,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        if !actor.can_modify(id) {
            return Err(UserServiceError::Forbidden(
                "Not allowed to modify this user".to_string(),
            ));
        }
        if input.changes_privileges() && !actor.is_admin {
            return Err(UserServiceError::Forbidden(
                "Only administrators can change status or admin rights".to_string(),
            ));
        }

        let changes = self.build_changes(id, input).await?;

        let updated = self
            .user_repo
            .update(id, &changes)
            .await
            .map_err(UserServiceError::from_repo)?
            .ok_or(UserServiceError::NotFound)?;

        tracing::info!(user_id = id, actor_id = actor.id, "User updated");
        Ok(updated)
    }

    /// Delete a user on behalf of `actor`
    pub async fn delete(&self, actor: &User, id: i32) -> Result<(), UserServiceError> {
        if !actor.can_modify(id) {
            return Err(UserServiceError::Forbidden(
                "Not allowed to delete this user".to_string(),
            ));
        }

        let deleted = self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;
        if !deleted {
            return Err(UserServiceError::NotFound);
        }

        tracing::info!(user_id = id, actor_id = actor.id, "User deleted");
        Ok(())
    }

    /// Validate the update and turn it into column changes
    async fn build_changes(
        &self,
        id: i32,
        input: UpdateUserInput,
    ) -> Result<UserChanges, UserServiceError> {
        let mut changes = UserChanges {
            status: input.status,
            is_admin: input.is_admin,
            ..Default::default()
        };

        if let Some(name) = input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(UserServiceError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            changes.name = Some(name.to_string());
        }

        if let Some(email) = input.email {
            let email = email.trim();
            validate_email(email)?;
            if let Some(existing) = self
                .user_repo
                .get_by_email(email)
                .await
                .context("Failed to check email")?
            {
                if existing.id != id {
                    return Err(UserServiceError::EmailTaken);
                }
            }
            changes.email = Some(email.to_string());
        }

        if let Some(password) = input.password {
            if password.is_empty() {
                return Err(UserServiceError::ValidationError(
                    "Password cannot be empty".to_string(),
                ));
            }
            changes.password_hash =
                Some(hash_password(&password).context("Failed to hash password")?);
        }

        // An empty address clears it.
        if let Some(address) = input.address {
            changes.address = Some(Some(address).filter(|a| !a.trim().is_empty()));
        }

        Ok(changes)
    }
}

fn validate_required(name: &str, email: &str, password: &str) -> Result<(), UserServiceError> {
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Name, email and password are required".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };
    if !valid {
        return Err(UserServiceError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    Ok(())
}
