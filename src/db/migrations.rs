//! Database migrations module
//!
//! File-based SQL migrations. Every `*.sql` file in the migrations directory
//! is applied once, in file-name order, and recorded by name in the
//! `public.migrations` table. The table is always schema-qualified: the
//! default search path starts with a schema named after the connecting role,
//! which may exist (e.g. role `cms` and schema `cms`).
//!
//! # Usage
//!
//! ```ignore
//! use cms_server::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! let report = migrations::run_migrations(&pool, Path::new("migrations")).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS public.migrations (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        run_at TIMESTAMP DEFAULT NOW()
    )
"#;

/// A migration file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, used as the migration's identity in the `migrations` table
    pub name: String,
    /// Full path to the file
    pub path: PathBuf,
}

impl MigrationFile {
    /// Read the file's SQL
    pub fn read_sql(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read migration file: {}", self.path.display()))
    }
}

/// Outcome of a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Files applied during this run, in order
    pub applied: Vec<String>,
    /// Files skipped because they were already recorded
    pub skipped: Vec<String>,
}

/// List the `*.sql` files in `dir`, sorted by file name.
pub fn discover_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read migrations directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        files.push(MigrationFile {
            name: name.to_string(),
            path: path.clone(),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Split `files` into those still to run and those already applied.
pub fn partition_pending(
    files: Vec<MigrationFile>,
    applied: &HashSet<String>,
) -> (Vec<MigrationFile>, Vec<MigrationFile>) {
    files.into_iter().partition(|f| !applied.contains(&f.name))
}

/// Run all pending migrations in `dir`.
///
/// Each file runs in its own transaction together with the insert that
/// records it, so a failing file leaves neither partial schema changes nor a
/// record behind. The run stops at the first failure.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or any migration fails
/// to apply.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<MigrationReport> {
    create_migrations_table(pool).await?;

    let files = discover_migrations(dir)?;
    let applied = get_applied_migrations(pool).await?;
    let (pending, done) = partition_pending(files, &applied);

    let mut report = MigrationReport {
        skipped: done.into_iter().map(|f| f.name).collect(),
        ..Default::default()
    };
    for name in &report.skipped {
        tracing::info!("Skipping already applied migration: {}", name);
    }

    for file in pending {
        tracing::info!("Applying migration: {}", file.name);
        apply_migration(pool, &file)
            .await
            .with_context(|| format!("Failed to apply migration: {}", file.name))?;
        report.applied.push(file.name);
    }

    if report.applied.is_empty() {
        tracing::info!("All migrations are up to date");
    } else {
        tracing::info!("Applied {} migration(s)", report.applied.len());
    }

    Ok(report)
}

/// Count migration files in `dir` not yet recorded as applied
pub async fn pending_count(pool: &PgPool, dir: &Path) -> Result<usize> {
    create_migrations_table(pool).await?;

    let files = discover_migrations(dir)?;
    let applied = get_applied_migrations(pool).await?;
    Ok(partition_pending(files, &applied).0.len())
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &PgPool) -> Result<()> {
    sqlx::query(CREATE_MIGRATIONS_TABLE)
        .execute(pool)
        .await
        .context("Failed to create migrations table")?;
    Ok(())
}

/// Names of the migrations already applied
async fn get_applied_migrations(pool: &PgPool) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT name FROM public.migrations")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
        .collect()
}

/// Apply a single migration file inside a transaction
async fn apply_migration(pool: &PgPool, file: &MigrationFile) -> Result<()> {
    let sql = file.read_sql()?;
    let mut tx = pool.begin().await?;

    // Files may hold several statements, which rules out prepared queries.
    sqlx::raw_sql(&sql).execute(&mut *tx).await?;

    sqlx::query("INSERT INTO public.migrations (name) VALUES ($1)")
        .bind(&file.name)
        .execute(&mut *tx)
        .await?;

    // Dropping an uncommitted transaction rolls it back.
    tx.commit().await?;
    Ok(())
}


#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::db::pool::test_database_url;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use std::str::FromStr;
    use tempfile::TempDir;

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let dir = TempDir::new().unwrap();
        let table = format!("mig_test_{}", uuid::Uuid::new_v4().simple());
        let file_name = format!("900_{}.sql", table);
        std::fs::write(
            dir.path().join(&file_name),
            format!("CREATE TABLE {table} (id INT); INSERT INTO {table} VALUES (1);"),
        )
        .unwrap();

        let first = run_migrations(&pool, dir.path()).await.expect("First run failed");
        assert_eq!(first.applied, vec![file_name.clone()]);

        let second = run_migrations(&pool, dir.path()).await.expect("Second run failed");
        assert!(second.applied.is_empty());
        assert!(second.skipped.contains(&file_name));
        assert_eq!(pending_count(&pool, dir.path()).await.unwrap(), 0);

        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        sqlx::raw_sql(&format!("DROP TABLE {table}"))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM public.migrations WHERE name = $1")
            .bind(&file_name)
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL server"]
    async fn test_failed_migration_is_rolled_back() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let dir = TempDir::new().unwrap();
        let table = format!("mig_fail_{}", uuid::Uuid::new_v4().simple());
        let file_name = format!("901_{}.sql", table);
        std::fs::write(
            dir.path().join(&file_name),
            format!("CREATE TABLE {table} (id INT); SELECT * FROM no_such_table_here;"),
        )
        .unwrap();

        assert!(run_migrations(&pool, dir.path()).await.is_err());

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(&table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(!exists);
        assert_eq!(pending_count(&pool, dir.path()).await.unwrap(), 1);
    }

    /// A role whose name matches an existing schema resolves unqualified
    /// names to that schema first.
    #[tokio::test]
    #[ignore = "Requires PostgreSQL server with CREATEROLE"]
    async fn test_idempotent_when_role_has_own_schema() {
        let admin = create_test_pool().await.expect("Failed to create test pool");
        create_migrations_table(&admin).await.unwrap();

        let role = format!("mig_role_{}", uuid::Uuid::new_v4().simple());
        sqlx::raw_sql(&format!(
            "CREATE ROLE {role} LOGIN PASSWORD 'pw';
             CREATE SCHEMA {role} AUTHORIZATION {role};
             GRANT USAGE, CREATE ON SCHEMA public TO {role};
             GRANT ALL ON public.migrations TO {role};
             GRANT ALL ON ALL SEQUENCES IN SCHEMA public TO {role};"
        ))
        .execute(&admin)
        .await
        .unwrap();

        let options = PgConnectOptions::from_str(&test_database_url())
            .unwrap()
            .username(&role)
            .password("pw");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();

        let dir = TempDir::new().unwrap();
        let first = format!("910_{role}.sql");
        let second = format!("911_{role}.sql");
        std::fs::write(dir.path().join(&first), "CREATE TABLE counter (n INT);").unwrap();

        let run = run_migrations(&pool, dir.path()).await.unwrap();
        assert_eq!(run.applied, vec![first.clone()]);

        std::fs::write(dir.path().join(&second), "INSERT INTO counter VALUES (1);").unwrap();
        let run = run_migrations(&pool, dir.path()).await.unwrap();
        assert_eq!(run.applied, vec![second.clone()]);

        let run = run_migrations(&pool, dir.path()).await.unwrap();
        assert!(run.applied.is_empty());
        assert!(run.skipped.contains(&first) && run.skipped.contains(&second));

        let shadow: Option<String> =
            sqlx::query_scalar(&format!("SELECT to_regclass('{role}.migrations')::text"))
                .fetch_one(&admin)
                .await
                .unwrap();
        assert!(shadow.is_none());

        pool.close().await;
        sqlx::query("DELETE FROM public.migrations WHERE name = ANY($1)")
            .bind(vec![first, second])
            .execute(&admin)
            .await
            .unwrap();
        sqlx::raw_sql(&format!("DROP SCHEMA {role} CASCADE; DROP OWNED BY {role}; DROP ROLE {role};"))
            .execute(&admin)
            .await
            .unwrap();
    }
}
