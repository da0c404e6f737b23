//! User repository
//!
//! Database operations for `cms.users`.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for PostgreSQL

use crate::models::{User, UserChanges, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, name, email, password, address, status, is_admin, created_at, updated_at";

/// PostgreSQL `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Returned (inside `anyhow::Error`) when an insert or update collides with
/// the unique email constraint.
#[derive(Debug, thiserror::Error)]
#[error("Email already exists")]
pub struct DuplicateEmail;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `DuplicateEmail` on a taken email.
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i32) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Apply column changes and bump `updated_at`.
    ///
    /// Returns `None` if no user has the given id. Fails with
    /// `DuplicateEmail` on a taken email.
    async fn update(&self, id: i32, changes: &UserChanges) -> Result<Option<User>>;

    /// Delete a user, returning whether a row was removed
    async fn delete(&self, id: i32) -> Result<bool>;

    /// List all users ordered by id
    async fn list(&self) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: PgPool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: PgPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO cms.users (name, email, password, address, status, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.address)
            .bind(user.status.to_string())
            .bind(user.is_admin)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "Failed to create user"))?;

        row_to_user(&row)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM cms.users WHERE id = $1");

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by ID")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM cms.users WHERE email = $1");

        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get user by email")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, id: i32, changes: &UserChanges) -> Result<Option<User>> {
        if changes.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut builder = build_update(id, changes);
        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "Failed to update user"))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cms.users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM cms.users ORDER BY id ASC");

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        rows.iter().map(row_to_user).collect()
    }
}

/// Build `UPDATE cms.users SET ... WHERE id = $n RETURNING ...` with only the
/// changed columns. Column names are fixed here; values are always bound.
fn build_update(id: i32, changes: &UserChanges) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE cms.users SET ");
    let mut set = builder.separated(", ");

    if let Some(name) = &changes.name {
        set.push("name = ").push_bind_unseparated(name);
    }
    if let Some(email) = &changes.email {
        set.push("email = ").push_bind_unseparated(email);
    }
    if let Some(hash) = &changes.password_hash {
        set.push("password = ").push_bind_unseparated(hash);
    }
    if let Some(address) = &changes.address {
        set.push("address = ").push_bind_unseparated(address);
    }
    if let Some(status) = changes.status {
        set.push("status = ").push_bind_unseparated(status.to_string());
    }
    if let Some(is_admin) = changes.is_admin {
        set.push("is_admin = ").push_bind_unseparated(is_admin);
    }
    set.push("updated_at = NOW()");

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING ").push(USER_COLUMNS);
    builder
}

fn map_unique_violation(err: sqlx::Error, context: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return anyhow::Error::new(DuplicateEmail);
        }
    }
    anyhow::Error::new(err).context(context)
}

fn row_to_user(row: &PgRow) -> Result<User> {
    let status_str: String = row.try_get("status")?;
    let status = UserStatus::from_str(&status_str)
        .with_context(|| format!("Invalid status in database: {}", status_str))?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
        address: row.try_get("address")?,
        status,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}


/// Tests against a live database. Run the migrations in `migrations/` first.
#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::services::password::{hash_password, verify_password};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        SqlxUserRepository::new(pool)
    }

    fn unique_email(prefix: &str) -> String {
        format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4())
    }

    fn test_user(email: &str) -> User {
        User::new(
            "Test User".to_string(),
            email.to_string(),
            hash_password("password123").expect("Failed to hash password"),
            None,
        )
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;
        let email = unique_email("create");

        let created = repo.create(&test_user(&email)).await.expect("Failed to create user");
        assert!(created.id > 0);
        assert_eq!(created.status, UserStatus::Inactive);

        let found = repo
            .get_by_email(&email)
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(found.id, created.id);

        repo.delete(created.id).await.expect("Failed to delete user");
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_duplicate_email_is_typed() {
        let repo = setup_test_repo().await;
        let email = unique_email("dup");

        let first = repo.create(&test_user(&email)).await.expect("Failed to create user");
        let err = repo.create(&test_user(&email)).await.unwrap_err();
        assert!(err.downcast_ref::<DuplicateEmail>().is_some());

        repo.delete(first.id).await.expect("Failed to delete user");
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_update_rehashes_password() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&test_user(&unique_email("update")))
            .await
            .expect("Failed to create user");

        let changes = UserChanges {
            password_hash: Some(hash_password("new-password").unwrap()),
            ..Default::default()
        };
        let updated = repo
            .update(created.id, &changes)
            .await
            .expect("Failed to update user")
            .expect("User not found");

        assert!(!verify_password("password123", &updated.password_hash).unwrap());
        assert!(verify_password("new-password", &updated.password_hash).unwrap());
        assert!(updated.updated_at >= created.updated_at);

        repo.delete(created.id).await.expect("Failed to delete user");
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_delete_missing_returns_false() {
        let repo = setup_test_repo().await;
        assert!(!repo.delete(i32::MAX).await.expect("Failed to delete"));
    }
}
