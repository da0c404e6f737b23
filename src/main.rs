//! cms-server - REST backend for the CMS admin dashboard

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use cms_server::{
    api::{self, AppState},
    config::Config,
    db::{self, migrations, DatabasePool, PostgresDatabase, SqlxUserRepository},
    services::{AuthService, JwtManager, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the variables may come from the environment.
    let _ = dotenvy::dotenv();

    cms_server::init_tracing("cms_server=info,tower_http=debug");

    tracing::info!("Starting cms-server...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    config.validate()?;
    tracing::info!(
        environment = %config.server.environment,
        "Configuration loaded"
    );

    // Initialize database
    let pool = db::create_pool(&config.database).await?;

    // Run migrations
    if config.migrations.run_on_startup {
        let report = migrations::run_migrations(&pool, &config.migrations.dir).await?;
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Database migrations completed"
        );
    }

    // Create repositories and services
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let jwt = JwtManager::from_config(&config.auth)?;
    let user_service = Arc::new(UserService::new(user_repo));
    let auth_service = Arc::new(AuthService::new(user_service.clone(), jwt));

    let database = Arc::new(PostgresDatabase::new(pool));
    let state = AppState {
        db: database.clone(),
        user_service,
        auth_service,
        secure_cookies: config.server.is_production(),
    };

    // Build router
    let app = api::build_router(state, config.server.cors_origin.as_deref())?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    database.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
