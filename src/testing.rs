//! Test utilities for database setup.
//!
//! Provides helpers that reuse authoritative schema initialization,
//! eliminating schema duplication in test code.

use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::TempDir;

use crate::domain::Role;

/// Test environment with costing.db using the authoritative schema.
///
/// The database lives in a temporary directory that is removed on drop.
pub struct TestEnv {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    /// costing.db connection with full schema (all migrations)
    pub conn: Connection,
}

impl TestEnv {
    /// Create a test environment with the database initialized.
    ///
    /// Uses `crate::db::run_migrations()` and then clears the seeded
    /// units and coefficients so every test starts from empty tables.
    pub fn new() -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let db_path = temp.path().join("costing.db");
        let conn = crate::db::open(&db_path)?;
        crate::db::run_migrations(&conn)?;

        // Clear seeded baseline data for clean test slate
        conn.execute_batch(
            r#"
            DELETE FROM coefficients;
            DELETE FROM units;
            "#,
        )?;

        Ok(Self { temp, conn })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Insert a user directly, bypassing password hashing
    pub fn add_user(&self, username: &str, role: Role) -> rusqlite::Result<i64> {
        let now = crate::db::now();
        self.conn.execute(
            "INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, 'not-a-hash', ?3, ?4, ?4)",
            params![username, format!("{}@example.com", username), role.as_str(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
