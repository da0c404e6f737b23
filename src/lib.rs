//! cms-server - REST backend for the CMS admin dashboard
//!
//! Authentication with JWT cookies, user management and a file-based SQL
//! migration runner over PostgreSQL.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with `RUST_LOG`, falling back to `default_filter`
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
