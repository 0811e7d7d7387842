//! Operator-supplied SQL migration files.
//!
//! Files named `*.sql` in the migrations directory are applied in name
//! order, each inside one transaction together with its row in the
//! `migrations` ledger. These run on top of the built-in schema versions
//! in `db::schema`.

use regex::RegexSet;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static DANGEROUS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)DROP\s+TABLE",
        r"(?i)DROP\s+COLUMN",
        r"(?i)TRUNCATE\s+TABLE",
        r"(?i)DELETE\s+FROM",
        r"(?i)UPDATE\s+.*\s+SET",
    ])
    .expect("static migration patterns compile")
});

const DESCRIPTION_MARKERS: [&str; 3] = ["migration:", "миграция:", "обновление:"];

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migration file not found: {0}")]
    NotFound(String),

    #[error("Migration already applied: {0}")]
    AlreadyApplied(String),

    #[error("Migration file is empty or only contains comments: {0}")]
    Empty(String),

    #[error("Failed to apply migration {name}: {source}")]
    Failed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("Cannot read migration {name}: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationInfo {
    pub name: String,
    pub is_dangerous: bool,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub applied: Vec<String>,
    pub available: Vec<String>,
    pub pending: Vec<String>,
    pub pending_info: Vec<MigrationInfo>,
    pub total_applied: usize,
    pub total_available: usize,
    pub total_pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    pub migration: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    pub errors: Vec<MigrationFailure>,
    pub success: bool,
}

/// Whether the SQL contains statements that destroy or rewrite data
pub fn is_dangerous(sql: &str) -> bool {
    DANGEROUS.is_match(sql)
}

/// First `--` comment carrying a migration marker, if any
pub fn describe(sql: &str) -> Option<String> {
    sql.lines()
        .filter_map(|line| line.split_once("--").map(|(_, comment)| comment.trim()))
        .find(|comment| {
            let lower = comment.to_lowercase();
            DESCRIPTION_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(str::to_string)
}

/// Drop `--` comment lines and blank lines, then split on `;`
pub fn split_statements(sql: &str) -> Vec<String> {
    let cleaned: Vec<&str> = sql
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("--")
        })
        .collect();
    cleaned
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn applied_migrations(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT migration_name FROM migrations ORDER BY migration_name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

pub struct MigrationRunner {
    dir: PathBuf,
}

impl MigrationRunner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `*.sql` file names in the directory, sorted; a missing directory is empty
    pub fn available(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Migrations directory {} unreadable: {}", self.dir.display(), e);
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".sql"))
            .collect();
        names.sort();
        names
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        // Only names listed from the directory are ever joined to it
        if !self.available().iter().any(|n| n == name) {
            return Err(MigrationError::NotFound(name.to_string()));
        }
        std::fs::read_to_string(self.dir.join(name)).map_err(|source| MigrationError::Io {
            name: name.to_string(),
            source,
        })
    }

    pub fn info(&self, name: &str) -> Result<MigrationInfo, MigrationError> {
        let sql = self.read(name)?;
        Ok(MigrationInfo {
            name: name.to_string(),
            is_dangerous: is_dangerous(&sql),
            description: describe(&sql).unwrap_or_else(|| "No description".to_string()),
        })
    }

    pub fn status(&self, conn: &Connection) -> Result<MigrationStatus, MigrationError> {
        let applied = applied_migrations(conn)?;
        let available = self.available();
        let pending: Vec<String> = available
            .iter()
            .filter(|name| !applied.contains(name))
            .cloned()
            .collect();
        let mut pending_info = Vec::with_capacity(pending.len());
        for name in &pending {
            pending_info.push(self.info(name)?);
        }
        Ok(MigrationStatus {
            total_applied: applied.len(),
            total_available: available.len(),
            total_pending: pending.len(),
            applied,
            available,
            pending,
            pending_info,
        })
    }

    /// Apply one migration; statements and the ledger row commit together
    pub fn apply(&self, conn: &Connection, name: &str) -> Result<(), MigrationError> {
        let sql = self.read(name)?;

        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM migrations WHERE migration_name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if already {
            return Err(MigrationError::AlreadyApplied(name.to_string()));
        }

        let statements = split_statements(&sql);
        if statements.is_empty() {
            return Err(MigrationError::Empty(name.to_string()));
        }
        if is_dangerous(&sql) {
            tracing::warn!("Applying potentially destructive migration {}", name);
        }

        let failed = |source: rusqlite::Error| MigrationError::Failed {
            name: name.to_string(),
            source,
        };
        let tx = conn.unchecked_transaction()?;
        for statement in &statements {
            tx.execute_batch(statement).map_err(failed)?;
        }
        tx.execute(
            "INSERT INTO migrations (migration_name, applied_at) VALUES (?1, ?2)",
            params![name, crate::db::now()],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        tracing::info!("Migration applied: {}", name);
        Ok(())
    }

    /// Apply every pending migration in order, collecting failures
    pub fn apply_pending(&self, conn: &Connection) -> Result<ApplyReport, MigrationError> {
        let status = self.status(conn)?;
        let mut applied = Vec::new();
        let mut errors = Vec::new();
        for name in status.pending {
            match self.apply(conn, &name) {
                Ok(()) => applied.push(name),
                Err(e) => {
                    tracing::error!("{}", e);
                    errors.push(MigrationFailure {
                        migration: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(ApplyReport {
            success: errors.is_empty(),
            applied,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    fn runner(env: &TestEnv) -> MigrationRunner {
        let dir = env.path().join("migrations");
        std::fs::create_dir_all(&dir).unwrap();
        MigrationRunner::new(dir)
    }

    fn write(runner: &MigrationRunner, name: &str, sql: &str) {
        std::fs::write(runner.dir().join(name), sql).unwrap();
    }

    fn column_exists(env: &TestEnv, table: &str, column: &str) -> bool {
        env.conn
            .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
            .is_ok()
    }

    #[test]
    fn test_dangerous_patterns() {
        assert!(is_dangerous("drop table materials"));
        assert!(is_dangerous("ALTER TABLE x DROP   COLUMN y"));
        assert!(is_dangerous("DELETE FROM units"));
        assert!(is_dangerous("update materials set price = 0"));
        assert!(!is_dangerous("ALTER TABLE materials ADD COLUMN grade TEXT"));
        assert!(!is_dangerous("CREATE INDEX idx ON units(name)"));
    }

    #[test]
    fn test_describe_uses_marker_comment() {
        let sql = "-- plain note\n-- Migration: add grade column\nALTER TABLE materials ADD COLUMN grade TEXT;";
        assert_eq!(describe(sql).as_deref(), Some("Migration: add grade column"));
        assert_eq!(
            describe("-- Миграция: новые поля\nSELECT 1;").as_deref(),
            Some("Миграция: новые поля")
        );
        assert_eq!(describe("SELECT 1;"), None);
    }

    #[test]
    fn test_split_statements_skips_comments() {
        let sql = "-- header\nCREATE TABLE a (id INTEGER);\n\n  -- note\nCREATE TABLE b (id INTEGER);\n";
        assert_eq!(
            split_statements(sql),
            vec!["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]
        );
        assert!(split_statements("-- only a comment\n").is_empty());
    }

    #[test]
    fn test_status_and_apply() {
        let env = TestEnv::new().unwrap();
        let runner = runner(&env);
        write(&runner, "002_index.sql", "CREATE INDEX idx_units_name ON units(name);");
        write(
            &runner,
            "001_grade.sql",
            "-- migration: material grade\nALTER TABLE materials ADD COLUMN grade TEXT;",
        );
        write(&runner, "notes.txt", "ignored");

        let status = runner.status(&env.conn).unwrap();
        assert_eq!(status.available, vec!["001_grade.sql", "002_index.sql"]);
        assert_eq!(status.total_pending, 2);
        assert_eq!(status.pending_info[0].description, "migration: material grade");
        assert_eq!(status.pending_info[1].description, "No description");

        runner.apply(&env.conn, "001_grade.sql").unwrap();
        assert!(column_exists(&env, "materials", "grade"));
        assert!(matches!(
            runner.apply(&env.conn, "001_grade.sql"),
            Err(MigrationError::AlreadyApplied(_))
        ));

        let status = runner.status(&env.conn).unwrap();
        assert_eq!(status.applied, vec!["001_grade.sql"]);
        assert_eq!(status.pending, vec!["002_index.sql"]);
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let env = TestEnv::new().unwrap();
        let runner = runner(&env);
        write(
            &runner,
            "001_broken.sql",
            "ALTER TABLE materials ADD COLUMN grade TEXT;\nALTER TABLE nowhere ADD COLUMN x TEXT;",
        );

        assert!(matches!(
            runner.apply(&env.conn, "001_broken.sql"),
            Err(MigrationError::Failed { .. })
        ));
        assert!(!column_exists(&env, "materials", "grade"));
        assert!(applied_migrations(&env.conn).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_and_empty_files() {
        let env = TestEnv::new().unwrap();
        let runner = runner(&env);
        write(&runner, "001_empty.sql", "-- migration: nothing here\n");

        assert!(matches!(
            runner.apply(&env.conn, "../costing.db"),
            Err(MigrationError::NotFound(_))
        ));
        assert!(matches!(
            runner.apply(&env.conn, "001_empty.sql"),
            Err(MigrationError::Empty(_))
        ));
    }

    #[test]
    fn test_apply_pending_collects_errors() {
        let env = TestEnv::new().unwrap();
        let runner = runner(&env);
        write(&runner, "001_ok.sql", "CREATE TABLE extra (id INTEGER PRIMARY KEY);");
        write(&runner, "002_bad.sql", "CREATE TABLE extra (id INTEGER PRIMARY KEY);");

        let report = runner.apply_pending(&env.conn).unwrap();
        assert_eq!(report.applied, vec!["001_ok.sql"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].migration, "002_bad.sql");
        assert!(!report.success);
    }

    #[test]
    fn test_missing_directory_has_nothing_available() {
        let runner = MigrationRunner::new("/definitely/not/here");
        assert!(runner.available().is_empty());
    }
}
