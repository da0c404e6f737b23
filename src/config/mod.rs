//! Configuration management
//!
//! Configuration is loaded from:
//! - an optional `config.yml` file
//! - environment variables (override file settings; `.env` is honoured)
//!
//! Missing optional values are filled with sensible defaults. The JWT
//! secret has no default and must be provided one way or the other.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token and cookie configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Migration runner configuration
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fixed CORS origin. When unset the request origin is mirrored back,
    /// which keeps cookie auth working for any dashboard host.
    #[serde(default)]
    pub cors_origin: Option<String>,
    /// Runtime environment (`development`, `production`, ...)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: None,
            environment: default_environment(),
        }
    }
}

impl ServerConfig {
    /// Whether the server runs in production mode (secure cookies)
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_environment() -> String {
    "development".to_string()
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual parts
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub name: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Idle connections are closed after this many seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Give up acquiring a connection after this many seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            name: default_db_name(),
            max_connections: default_max_connections(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "cms".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// Token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access and refresh tokens
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token lifetime, e.g. `24h` or `1d`
    #[serde(default = "default_jwt_expires_in")]
    pub jwt_expires_in: String,
    /// Refresh token lifetime
    #[serde(default = "default_jwt_refresh_expires_in")]
    pub jwt_refresh_expires_in: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_expires_in: default_jwt_expires_in(),
            jwt_refresh_expires_in: default_jwt_refresh_expires_in(),
        }
    }
}

impl AuthConfig {
    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> Result<u64, ConfigError> {
        parse_duration(&self.jwt_expires_in)
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_ttl_secs(&self) -> Result<u64, ConfigError> {
        parse_duration(&self.jwt_refresh_expires_in)
    }
}

fn default_jwt_expires_in() -> String {
    "1d".to_string()
}

fn default_jwt_refresh_expires_in() -> String {
    "7d".to_string()
}

/// Migration runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding the `.sql` migration files
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,
    /// Apply pending migrations when the server starts
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            run_on_startup: default_run_on_startup(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_run_on_startup() -> bool {
    true
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid duration '{0}': expected a number optionally followed by s, m, h or d")]
    InvalidDuration(String),
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })
    }

    /// Load configuration from file, then apply environment overrides.
    ///
    /// Recognised variables: `PORT`, `HOST`, `NODE_ENV`, `CORS_ORIGIN`,
    /// `JWT_SECRET`, `JWT_EXPIRES_IN`, `JWT_REFRESH_EXPIRES_IN`,
    /// `DATABASE_URL`, `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`,
    /// `DB_NAME`, `DB_MAX_CONNECTIONS`, `MIGRATIONS_DIR`, `RUN_MIGRATIONS`.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Unparseable numbers are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(env) = lookup("NODE_ENV") {
            self.server.environment = env;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = Some(origin);
        }

        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(expires_in) = lookup("JWT_EXPIRES_IN") {
            self.auth.jwt_expires_in = expires_in;
        }
        if let Some(expires_in) = lookup("JWT_REFRESH_EXPIRES_IN") {
            self.auth.jwt_refresh_expires_in = expires_in;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT").and_then(|p| p.parse().ok()) {
            self.database.port = port;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }
        if let Some(max) = lookup("DB_MAX_CONNECTIONS").and_then(|m| m.parse().ok()) {
            self.database.max_connections = max;
        }

        if let Some(dir) = lookup("MIGRATIONS_DIR") {
            self.migrations.dir = PathBuf::from(dir);
        }
        if let Some(run) = lookup("RUN_MIGRATIONS").and_then(|r| r.parse().ok()) {
            self.migrations.run_on_startup = run;
        }
    }

    /// Check values that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET must be set".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        self.auth.access_ttl_secs()?;
        self.auth.refresh_ttl_secs()?;
        Ok(())
    }
}

/// Parse a duration such as `30s`, `15m`, `24h`, `7d` or a bare number of
/// seconds into seconds.
pub fn parse_duration(value: &str) -> Result<u64, ConfigError> {
    let trimmed = value.trim();
    let invalid = || ConfigError::InvalidDuration(value.to_string());

    let (digits, multiplier) = match trimmed.chars().last() {
        Some('s') => (&trimmed[..trimmed.len() - 1], 1),
        Some('m') => (&trimmed[..trimmed.len() - 1], 60),
        Some('h') => (&trimmed[..trimmed.len() - 1], 3600),
        Some('d') => (&trimmed[..trimmed.len() - 1], 86400),
        Some(_) => (trimmed, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    amount.checked_mul(multiplier).ok_or_else(invalid)
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}
