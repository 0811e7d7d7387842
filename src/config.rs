//! Application configuration.
//!
//! Values are resolved with priority: config.toml > .env / environment > default.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::paths;

// ==================== Config File ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    database: Option<DatabaseConfig>,
    server: Option<ServerConfig>,
    session: Option<SessionConfig>,
    logging: Option<LoggingConfig>,
    migrations: Option<MigrationsConfig>,
    support: Option<SupportConfig>,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SessionConfig {
    lifetime_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LoggingConfig {
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MigrationsConfig {
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupportConfig {
    long_poll_timeout_secs: Option<u64>,
    long_poll_interval_ms: Option<u64>,
}

// ==================== Defaults ====================

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// Session lifetime in hours (one day)
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Upper bound for a single long-poll request
pub const LONG_POLL_TIMEOUT_SECS: u64 = 25;

/// Delay between database checks while long-polling
pub const LONG_POLL_INTERVAL_MS: u64 = 1000;

/// Default page size for calculation listings
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Largest page size a client may request
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Resolved runtime settings shared through `AppState`
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub server_addr: String,
    pub server_port: u16,
    pub session_lifetime_hours: i64,
    pub log_file: PathBuf,
    pub migrations_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub long_poll_timeout_secs: u64,
    pub long_poll_interval_ms: u64,
}

impl Settings {
    /// Load settings from config.toml and the environment
    pub fn load() -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let contents = std::fs::read_to_string("config.toml").ok();
        Self::resolve(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve settings from optional config.toml contents and an env lookup
    pub fn resolve(config_toml: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Self {
        let file = match config_toml.map(toml::from_str::<AppConfig>) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                tracing::warn!("Ignoring malformed config.toml: {}", e);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        let database_path = file
            .database
            .and_then(|d| d.path)
            .inspect(|p| tracing::info!("Using database from config.toml: {}", p))
            .or_else(|| env("DATABASE_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(paths::db_path()));

        let (addr, port) = file
            .server
            .map(|s| (s.addr, s.port))
            .unwrap_or((None, None));
        let server_addr = addr.unwrap_or_else(|| SERVER_ADDR.to_string());
        let server_port = port
            .or_else(|| env("PORT").and_then(|p| p.parse().ok()))
            .unwrap_or(SERVER_PORT);

        let session_lifetime_hours = file
            .session
            .and_then(|s| s.lifetime_hours)
            .or_else(|| env("SESSION_LIFETIME_HOURS").and_then(|h| h.parse().ok()))
            .filter(|h| *h > 0)
            .unwrap_or(SESSION_LIFETIME_HOURS);

        let log_file = file
            .logging
            .and_then(|l| l.file)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(paths::error_log_path()));

        let migrations_dir = file
            .migrations
            .and_then(|m| m.dir)
            .or_else(|| env("MIGRATIONS_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(paths::MIGRATIONS_DIR));

        let (timeout, interval) = file
            .support
            .map(|s| (s.long_poll_timeout_secs, s.long_poll_interval_ms))
            .unwrap_or((None, None));

        Self {
            database_path,
            server_addr,
            server_port,
            session_lifetime_hours,
            log_file,
            migrations_dir,
            uploads_dir: PathBuf::from(paths::uploads_dir()),
            long_poll_timeout_secs: timeout.unwrap_or(LONG_POLL_TIMEOUT_SECS),
            long_poll_interval_ms: interval.filter(|ms| *ms > 0).unwrap_or(LONG_POLL_INTERVAL_MS),
        }
    }

    /// Settings rooted in a scratch directory (used by tests and tooling)
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            database_path: dir.join("costing.db"),
            server_addr: SERVER_ADDR.to_string(),
            server_port: SERVER_PORT,
            session_lifetime_hours: SESSION_LIFETIME_HOURS,
            log_file: dir.join("logs").join("app.log"),
            migrations_dir: dir.join("migrations"),
            uploads_dir: dir.join("uploads"),
            long_poll_timeout_secs: 2,
            long_poll_interval_ms: 50,
        }
    }

    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_config() {
        let settings = Settings::resolve(None, no_env);
        assert_eq!(settings.server_port, SERVER_PORT);
        assert_eq!(settings.session_lifetime_hours, SESSION_LIFETIME_HOURS);
        assert_eq!(settings.migrations_dir, PathBuf::from(paths::MIGRATIONS_DIR));
        assert_eq!(settings.bind_addr(), format!("{}:{}", SERVER_ADDR, SERVER_PORT));
    }

    #[test]
    fn test_config_file_wins_over_env() {
        let toml = r#"
            [database]
            path = "/tmp/from-config.db"

            [server]
            port = 8080

            [session]
            lifetime_hours = 2
        "#;
        let env = |key: &str| match key {
            "DATABASE_PATH" => Some("/tmp/from-env.db".to_string()),
            "PORT" => Some("9090".to_string()),
            _ => None,
        };
        let settings = Settings::resolve(Some(toml), env);
        assert_eq!(settings.database_path, PathBuf::from("/tmp/from-config.db"));
        assert_eq!(settings.server_port, 8080);
        assert_eq!(settings.session_lifetime_hours, 2);
    }

    #[test]
    fn test_env_used_when_config_silent() {
        let env = |key: &str| match key {
            "DATABASE_PATH" => Some("/tmp/from-env.db".to_string()),
            "PORT" => Some("9090".to_string()),
            "MIGRATIONS_DIR" => Some("/srv/migrations".to_string()),
            _ => None,
        };
        let settings = Settings::resolve(Some("[logging]\nfile = \"x.log\""), env);
        assert_eq!(settings.database_path, PathBuf::from("/tmp/from-env.db"));
        assert_eq!(settings.server_port, 9090);
        assert_eq!(settings.migrations_dir, PathBuf::from("/srv/migrations"));
        assert_eq!(settings.log_file, PathBuf::from("x.log"));
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let settings = Settings::resolve(Some("this is not toml ["), no_env);
        assert_eq!(settings.server_port, SERVER_PORT);
    }

    #[test]
    fn test_invalid_lifetime_ignored() {
        let settings = Settings::resolve(Some("[session]\nlifetime_hours = 0"), no_env);
        assert_eq!(settings.session_lifetime_hours, SESSION_LIFETIME_HOURS);
    }
}
