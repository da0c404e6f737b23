//! Database connection pool
//!
//! PostgreSQL access goes through a single `sqlx::PgPool`. The pool is
//! wrapped behind the `DatabasePool` trait so HTTP handlers that only need
//! liveness information do not depend on a live connection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// Liveness and lifecycle operations on the database.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Check if the database connection is healthy
    async fn ping(&self) -> Result<()>;

    /// Close the connection pool
    async fn close(&self);
}

/// PostgreSQL connection pool implementation
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for PostgresDatabase {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Type alias for a shared database handle
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Build connection options from configuration.
///
/// `url` wins over the individual host/port/user/password/name settings.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    if let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return url
            .parse::<PgConnectOptions>()
            .context("Invalid DATABASE_URL");
    }

    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.name);
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    Ok(options)
}

/// Create the PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the options are invalid or the first connection
/// cannot be established within the connect timeout.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let options = connect_options(config)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to PostgreSQL at {}:{}/{}",
                config.host, config.port, config.name
            )
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// `DATABASE_TEST_URL`, or a local default
#[cfg(test)]
pub fn test_database_url() -> String {
    std::env::var("DATABASE_TEST_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/cms_test".to_string())
}

/// Create a pool for tests from `DATABASE_TEST_URL`.
#[cfg(test)]
pub async fn create_test_pool() -> Result<PgPool> {
    let config = DatabaseConfig {
        url: Some(test_database_url()),
        ..DatabaseConfig::default()
    };
    create_pool(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_from_parts() {
        let config = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            user: "cms".to_string(),
            password: "pw".to_string(),
            name: "cms_prod".to_string(),
            ..DatabaseConfig::default()
        };

        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "cms");
        assert_eq!(options.get_database(), Some("cms_prod"));
    }

    #[test]
    fn test_connect_options_url_takes_precedence() {
        let config = DatabaseConfig {
            url: Some("postgres://app@pg.example.com:5433/cms".to_string()),
            host: "ignored".to_string(),
            ..DatabaseConfig::default()
        };

        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "pg.example.com");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("cms"));
    }

    #[test]
    fn test_connect_options_invalid_url() {
        let config = DatabaseConfig {
            url: Some("not a url".to_string()),
            ..DatabaseConfig::default()
        };

        assert!(connect_options(&config).is_err());
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_postgres_pool_ping() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        let db = PostgresDatabase::new(pool);
        db.ping().await.expect("Ping should succeed");
        db.close().await;
    }
}
