//! Database migration runner.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations from ./migrations (or MIGRATIONS_DIR)
//! migrate up
//!
//! # Show how many migrations are pending
//! migrate status --dir db/migrations
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use cms_server::{config::Config, db};

#[derive(Parser)]
#[command(name = "migrate")]
#[command(author, version, about = "Apply the SQL migrations in the migrations directory")]
struct Cli {
    /// Migrations directory (overrides MIGRATIONS_DIR)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations (default)
    Up,
    /// Print the number of pending migrations
    Status,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    cms_server::init_tracing("cms_server=info");

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Migration failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_with_env(&cli.config)?;
    let dir = cli.dir.unwrap_or(config.migrations.dir);
    let pool = db::create_pool(&config.database).await?;

    let result = match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => up(&pool, &dir).await,
        Commands::Status => status(&pool, &dir).await,
    };

    pool.close().await;
    result
}

async fn up(pool: &sqlx::PgPool, dir: &Path) -> Result<()> {
    let report = db::migrations::run_migrations(pool, dir).await?;
    tracing::info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "Migration run finished"
    );
    Ok(())
}

async fn status(pool: &sqlx::PgPool, dir: &Path) -> Result<()> {
    let pending = db::migrations::pending_count(pool, dir).await?;
    println!("{} pending migration(s) in {}", pending, dir.display());
    Ok(())
}
