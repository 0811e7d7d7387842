//! Schema creation and upgrades for costing.db.
//!
//! Version-gated: each step checks the recorded version in `db_version`,
//! runs once, and records the version it produced. New databases walk
//! through every step in order.

use rusqlite::{params, Connection, Result};

/// Current schema version
/// Increment this when adding a new migration
pub const SCHEMA_VERSION: i32 = 5;

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Bootstrap: ensure db_version table exists (needed to check version)
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS db_version (
      version INTEGER PRIMARY KEY,
      applied_at TEXT NOT NULL,
      description TEXT
    );
    "#,
  )?;

  let current_version = get_schema_version(conn)?;
  tracing::debug!("costing.db schema version: {}", current_version);

  if current_version < 1 {
    migrate_v0_to_v1(conn)?;
  }
  if current_version < 2 {
    migrate_v1_to_v2(conn)?;
  }
  if current_version < 3 {
    migrate_v2_to_v3(conn)?;
  }
  if current_version < 4 {
    migrate_v3_to_v4(conn)?;
  }
  if current_version < 5 {
    migrate_v4_to_v5(conn)?;
  }

  Ok(())
}

// ============================================================
// VERSION-GATED MIGRATIONS
// ============================================================

/// v0→v1: Users, sessions, reference data and calculations
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v0→v1: Create base tables");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      username TEXT NOT NULL UNIQUE,
      email TEXT NOT NULL UNIQUE,
      password_hash TEXT NOT NULL,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
      id TEXT PRIMARY KEY,
      user_id INTEGER NOT NULL,
      created_at TEXT NOT NULL,
      expires_at TEXT NOT NULL,
      last_access_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS units (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS materials (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      mark TEXT NOT NULL,
      density REAL NOT NULL DEFAULT 0,
      price REAL NOT NULL DEFAULT 0,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS operations (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      number TEXT NOT NULL,
      description TEXT NOT NULL,
      unit_id INTEGER,
      cost REAL NOT NULL DEFAULT 0,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL,
      FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS product_types (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      description TEXT,
      volume_formula TEXT NOT NULL,
      waste_formula TEXT NOT NULL,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS product_type_parameters (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      product_type_id INTEGER NOT NULL,
      name TEXT NOT NULL,
      label TEXT NOT NULL,
      unit TEXT,
      required INTEGER NOT NULL DEFAULT 1,
      default_value REAL,
      sequence INTEGER NOT NULL DEFAULT 0,
      FOREIGN KEY (product_type_id) REFERENCES product_types(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS coefficients (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      value REAL NOT NULL DEFAULT 0,
      description TEXT,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS calculations (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      product_name TEXT NOT NULL,
      material_id INTEGER,
      product_type_id INTEGER,
      parameters TEXT NOT NULL DEFAULT '{}',
      operations TEXT NOT NULL DEFAULT '[]',
      result TEXT NOT NULL DEFAULT '{}',
      created_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
      FOREIGN KEY (material_id) REFERENCES materials(id) ON DELETE SET NULL,
      FOREIGN KEY (product_type_id) REFERENCES product_types(id) ON DELETE SET NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
    CREATE INDEX IF NOT EXISTS idx_operations_unit ON operations(unit_id);
    CREATE INDEX IF NOT EXISTS idx_ptp_product_type ON product_type_parameters(product_type_id);
    CREATE INDEX IF NOT EXISTS idx_calculations_user ON calculations(user_id);
    CREATE INDEX IF NOT EXISTS idx_calculations_created ON calculations(created_at);
    "#,
  )?;

  seed_reference_data(&tx)?;
  record_version(&tx, 1, "Create base tables (users, sessions, references, calculations)")?;
  tx.commit()
}

/// v1→v2: Roles and personal names; the earliest account becomes super admin
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v1→v2: Add user roles");

  let tx = conn.unchecked_transaction()?;
  add_column_if_missing(&tx, "users", "role", "TEXT NOT NULL DEFAULT 'guest'")?;
  add_column_if_missing(&tx, "users", "first_name", "TEXT")?;
  add_column_if_missing(&tx, "users", "last_name", "TEXT")?;
  tx.execute_batch("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);")?;

  let has_super_admin: i64 = tx.query_row(
    "SELECT COUNT(*) FROM users WHERE role = 'super_admin'",
    [],
    |row| row.get(0),
  )?;
  if has_super_admin == 0 {
    let promoted = tx.execute(
      "UPDATE users SET role = 'super_admin' WHERE id = (SELECT MIN(id) FROM users)",
      [],
    )?;
    if promoted > 0 {
      tracing::info!("Promoted earliest user to super_admin");
    }
  }

  record_version(&tx, 2, "Add user roles and names")?;
  tx.commit()
}

/// v2→v3: Order quantity and edit timestamp on saved calculations
fn migrate_v2_to_v3(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v2→v3: Add calculation quantity");

  add_column_if_missing(conn, "calculations", "quantity", "INTEGER NOT NULL DEFAULT 5")?;
  add_column_if_missing(conn, "calculations", "updated_at", "TEXT")?;
  conn.execute(
    "UPDATE calculations SET updated_at = created_at WHERE updated_at IS NULL",
    [],
  )?;

  record_version(conn, 3, "Add calculations.quantity and updated_at")?;
  Ok(())
}

/// v3→v4: Support chat (chats, messages, attachments)
fn migrate_v3_to_v4(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v3→v4: Add support chat");

  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS support_chats (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL UNIQUE,
      support_user_id INTEGER,
      last_message_at TEXT,
      created_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
      FOREIGN KEY (support_user_id) REFERENCES users(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS support_messages (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      chat_id INTEGER NOT NULL,
      sender_id INTEGER NOT NULL,
      message TEXT NOT NULL DEFAULT '',
      is_read INTEGER NOT NULL DEFAULT 0,
      created_at TEXT NOT NULL,
      FOREIGN KEY (chat_id) REFERENCES support_chats(id) ON DELETE CASCADE,
      FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS support_attachments (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      message_id INTEGER NOT NULL,
      filename TEXT NOT NULL,
      file_path TEXT NOT NULL,
      file_size INTEGER NOT NULL DEFAULT 0,
      mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
      created_at TEXT NOT NULL,
      FOREIGN KEY (message_id) REFERENCES support_messages(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_support_chats_support_user ON support_chats(support_user_id);
    CREATE INDEX IF NOT EXISTS idx_support_messages_chat ON support_messages(chat_id);
    CREATE INDEX IF NOT EXISTS idx_support_messages_unread ON support_messages(chat_id, is_read);
    CREATE INDEX IF NOT EXISTS idx_support_attachments_message ON support_attachments(message_id);
    "#,
  )?;

  record_version(conn, 4, "Add support chat tables")?;
  Ok(())
}

/// v4→v5: Ledger of applied SQL migration files
fn migrate_v4_to_v5(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v4→v5: Add migrations ledger");

  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS migrations (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      migration_name TEXT NOT NULL UNIQUE,
      applied_at TEXT NOT NULL
    );
    "#,
  )?;

  record_version(conn, 5, "Add migrations ledger for SQL files")?;
  Ok(())
}

// ============================================================
// HELPERS
// ============================================================

/// Baseline units and payroll coefficients for a fresh database
fn seed_reference_data(conn: &Connection) -> Result<()> {
  let units: i64 = conn.query_row("SELECT COUNT(*) FROM units", [], |row| row.get(0))?;
  if units == 0 {
    let now = super::now();
    for name in ["шт", "мм", "кг", "ч"] {
      conn.execute(
        "INSERT INTO units (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![name, now],
      )?;
    }
  }

  let coefficients: i64 =
    conn.query_row("SELECT COUNT(*) FROM coefficients", [], |row| row.get(0))?;
  if coefficients == 0 {
    let now = super::now();
    conn.execute(
      "INSERT INTO coefficients (name, value, description, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?4)",
      params!["Страховые взносы", 30.0, "Отчисления с фонда оплаты труда", now],
    )?;
  }

  Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO db_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
    params![version, super::now(), description],
  )?;
  tracing::info!("Recorded schema version {} - {}", version, description);
  Ok(())
}

/// Get current schema version (0 if no versions recorded)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
  conn.query_row(
    "SELECT COALESCE(MAX(version), 0) FROM db_version",
    [],
    |row| row.get(0),
  )
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
  conn
    .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
    .is_ok()
}

/// Add a column if it doesn't already exist
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, column_def: &str) -> Result<()> {
  if !column_exists(conn, table, column) {
    conn.execute(
      &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def),
      [],
    )?;
  }
  Ok(())
}
