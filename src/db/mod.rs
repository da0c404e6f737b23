//! Database layer
//!
//! PostgreSQL access for the CMS: the connection pool, the file-based
//! migration runner and the repositories used by the services.
//!
//! # Usage
//!
//! ```ignore
//! use cms_server::db::{create_pool, migrations, SqlxUserRepository};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool, Path::new("migrations")).await?;
//! let users = SqlxUserRepository::boxed(pool.clone());
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub use pool::create_test_pool;
pub use pool::{create_pool, DatabasePool, DynDatabasePool, PostgresDatabase};
pub use repositories::{DuplicateEmail, SqlxUserRepository, UserRepository};
