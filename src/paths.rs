//! Project path functions - single source of truth for all file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data")
//! - `MIGRATIONS_DIR`: Override the SQL migrations directory (see config.rs)
//!
//! This allows running isolated server instances side by side:
//! ```bash
//! DATA_DIR=data/test PORT=3001 cargo run
//! ```

use std::env;
use std::sync::OnceLock;

/// Lazily initialized data directory from DATA_DIR env var
static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Get the base data directory (from DATA_DIR env var or default "data")
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// SQLite database path
pub fn db_path() -> String {
    format!("{}/costing.db", data_dir())
}

/// Directory for the flat log files
pub fn logs_dir() -> String {
    format!("{}/logs", data_dir())
}

/// Flat error log file
pub fn error_log_path() -> String {
    format!("{}/app.log", logs_dir())
}

/// Root for stored files referenced by support attachments
pub fn uploads_dir() -> String {
    format!("{}/uploads", data_dir())
}

/// SQL migration files applied from the admin endpoint - not under DATA_DIR
pub const MIGRATIONS_DIR: &str = "database/migrations";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_default() {
        let dir = data_dir();
        assert!(!dir.is_empty());
    }

    #[test]
    fn test_db_path_format() {
        assert!(db_path().ends_with("/costing.db"));
    }

    #[test]
    fn test_log_paths() {
        assert!(logs_dir().ends_with("/logs"));
        assert!(error_log_path().ends_with("/logs/app.log"));
    }

    #[test]
    fn test_uploads_dir_format() {
        assert!(uploads_dir().ends_with("/uploads"));
    }
}
