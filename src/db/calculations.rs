//! Saved calculations.
//!
//! Parameters, selected operations and the computed result are stored as
//! JSON text; the handlers decode them for responses and exports.

use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::Serialize;

/// Row of the paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct CalculationSummary {
    pub id: i64,
    pub product_name: String,
    pub material_name: Option<String>,
    pub product_type_name: Option<String>,
    /// Stored `total_cost_without_packaging`
    pub total_cost: Option<f64>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Full row with JSON columns still encoded
#[derive(Debug, Clone)]
pub struct CalculationRecord {
    pub id: i64,
    pub user_id: i64,
    pub product_name: String,
    pub material_id: Option<i64>,
    pub product_type_id: Option<i64>,
    pub material_name: Option<String>,
    pub product_type_name: Option<String>,
    pub parameters: String,
    pub operations: String,
    pub result: String,
    pub quantity: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Values written on insert or update
#[derive(Debug, Clone)]
pub struct CalculationWrite<'a> {
    pub product_name: &'a str,
    pub material_id: i64,
    pub product_type_id: i64,
    pub parameters_json: &'a str,
    pub operations_json: &'a str,
    pub result_json: &'a str,
    pub quantity: i64,
}

pub fn count_calculations(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM calculations", [], |row| row.get(0))
}

/// Newest first
pub fn list_calculations(conn: &Connection, limit: i64, offset: i64) -> Result<Vec<CalculationSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.id, c.product_name, m.mark, pt.name,
               json_extract(c.result, '$.total_cost_without_packaging'),
               c.created_at, c.updated_at
        FROM calculations c
        LEFT JOIN materials m ON m.id = c.material_id
        LEFT JOIN product_types pt ON pt.id = c.product_type_id
        ORDER BY c.created_at DESC, c.id DESC
        LIMIT ?1 OFFSET ?2
        "#,
    )?;
    let rows = stmt
        .query_map(params![limit, offset], |row| {
            Ok(CalculationSummary {
                id: row.get(0)?,
                product_name: row.get(1)?,
                material_name: row.get(2)?,
                product_type_name: row.get(3)?,
                total_cost: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_calculation(conn: &Connection, id: i64) -> Result<Option<CalculationRecord>> {
    conn.query_row(
        r#"
        SELECT c.id, c.user_id, c.product_name, c.material_id, c.product_type_id,
               m.mark, pt.name, c.parameters, c.operations, c.result, c.quantity,
               c.created_at, c.updated_at
        FROM calculations c
        LEFT JOIN materials m ON m.id = c.material_id
        LEFT JOIN product_types pt ON pt.id = c.product_type_id
        WHERE c.id = ?1
        "#,
        params![id],
        |row| {
            Ok(CalculationRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                product_name: row.get(2)?,
                material_id: row.get(3)?,
                product_type_id: row.get(4)?,
                material_name: row.get(5)?,
                product_type_name: row.get(6)?,
                parameters: row.get(7)?,
                operations: row.get(8)?,
                result: row.get(9)?,
                quantity: row.get(10)?,
                created_at: row.get(11)?,
                updated_at: row.get(12)?,
            })
        },
    )
    .optional()
}

pub fn insert_calculation(conn: &Connection, user_id: i64, calc: &CalculationWrite<'_>) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO calculations
           (user_id, product_name, material_id, product_type_id, parameters, operations, result,
            quantity, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"#,
        params![
            user_id,
            calc.product_name,
            calc.material_id,
            calc.product_type_id,
            calc.parameters_json,
            calc.operations_json,
            calc.result_json,
            calc.quantity,
            super::now()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Owner is kept; returns false when the id does not exist
pub fn update_calculation(conn: &Connection, id: i64, calc: &CalculationWrite<'_>) -> Result<bool> {
    let changed = conn.execute(
        r#"UPDATE calculations
           SET product_name = ?1, material_id = ?2, product_type_id = ?3,
               parameters = ?4, operations = ?5, result = ?6, quantity = ?7, updated_at = ?8
           WHERE id = ?9"#,
        params![
            calc.product_name,
            calc.material_id,
            calc.product_type_id,
            calc.parameters_json,
            calc.operations_json,
            calc.result_json,
            calc.quantity,
            super::now(),
            id
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_calculation(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM calculations WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
