//! Unit of measure CRUD

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Unit {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitInput {
    #[serde(default)]
    pub name: String,
}

fn row_to_unit(row: &Row) -> Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

pub fn list_units(conn: &Connection) -> Result<Vec<Unit>> {
    let mut stmt =
        conn.prepare("SELECT id, name, created_at, updated_at FROM units ORDER BY name")?;
    let units = stmt.query_map([], row_to_unit)?.collect::<Result<Vec<_>>>()?;
    Ok(units)
}

pub fn get_unit(conn: &Connection, id: i64) -> Result<Option<Unit>> {
    conn.query_row(
        "SELECT id, name, created_at, updated_at FROM units WHERE id = ?1",
        params![id],
        row_to_unit,
    )
    .optional()
}

pub fn create_unit(conn: &Connection, input: &UnitInput) -> Result<i64> {
    conn.execute(
        "INSERT INTO units (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![input.name.trim(), super::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_unit(conn: &Connection, id: i64, input: &UnitInput) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE units SET name = ?1, updated_at = ?2 WHERE id = ?3",
        params![input.name.trim(), super::now(), id],
    )?;
    Ok(changed > 0)
}

/// Operations using the unit keep their row with `unit_id` cleared
pub fn delete_unit(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM units WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
