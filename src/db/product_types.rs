//! Product types and their ordered parameter lists.
//!
//! A product type carries two formulas (product volume and waste volume,
//! both in mm³) written over the names of its parameters. Parameters are
//! always written together with their product type inside one transaction;
//! an update replaces the whole list.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct ProductTypeParameter {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub unit: Option<String>,
    pub required: bool,
    pub default_value: Option<f64>,
    pub sequence: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub volume_formula: String,
    pub waste_formula: String,
    pub created_at: String,
    pub updated_at: String,
    pub parameters: Vec<ProductTypeParameter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<f64>,
    /// Falls back to the position in the submitted list
    #[serde(default)]
    pub sequence: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductTypeInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub volume_formula: String,
    #[serde(default)]
    pub waste_formula: String,
    #[serde(default)]
    pub parameters: Vec<ParameterInput>,
}

const SELECT: &str = r#"
    SELECT id, name, description, volume_formula, waste_formula, created_at, updated_at
    FROM product_types
"#;

fn row_to_product_type(row: &Row) -> Result<ProductType> {
    Ok(ProductType {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        volume_formula: row.get(3)?,
        waste_formula: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        parameters: Vec::new(),
    })
}

pub fn get_parameters(conn: &Connection, product_type_id: i64) -> Result<Vec<ProductTypeParameter>> {
    let mut stmt = conn.prepare(
        r#"SELECT id, name, label, unit, required, default_value, sequence
           FROM product_type_parameters
           WHERE product_type_id = ?1
           ORDER BY sequence, id"#,
    )?;
    let parameters = stmt
        .query_map(params![product_type_id], |row| {
            Ok(ProductTypeParameter {
                id: row.get(0)?,
                name: row.get(1)?,
                label: row.get(2)?,
                unit: row.get(3)?,
                required: row.get::<_, i64>(4)? != 0,
                default_value: row.get(5)?,
                sequence: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(parameters)
}

/// Parameter name → display label for a product type
pub fn get_parameter_labels(conn: &Connection, product_type_id: i64) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare(
        "SELECT name, label FROM product_type_parameters WHERE product_type_id = ?1",
    )?;
    let labels = stmt
        .query_map(params![product_type_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeMap<String, String>>>()?;
    Ok(labels)
}

pub fn list_product_types(conn: &Connection) -> Result<Vec<ProductType>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY name", SELECT))?;
    let mut types = stmt
        .query_map([], row_to_product_type)?
        .collect::<Result<Vec<_>>>()?;
    for product_type in &mut types {
        product_type.parameters = get_parameters(conn, product_type.id)?;
    }
    Ok(types)
}

pub fn get_product_type(conn: &Connection, id: i64) -> Result<Option<ProductType>> {
    let product_type = conn
        .query_row(&format!("{} WHERE id = ?1", SELECT), params![id], row_to_product_type)
        .optional()?;
    match product_type {
        Some(mut product_type) => {
            product_type.parameters = get_parameters(conn, id)?;
            Ok(Some(product_type))
        }
        None => Ok(None),
    }
}

fn insert_parameters(conn: &Connection, product_type_id: i64, parameters: &[ParameterInput]) -> Result<()> {
    let mut stmt = conn.prepare(
        r#"INSERT INTO product_type_parameters
           (product_type_id, name, label, unit, required, default_value, sequence)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    )?;
    for (index, param) in parameters.iter().enumerate() {
        stmt.execute(params![
            product_type_id,
            param.name.trim(),
            param.label.trim(),
            param.unit,
            param.required,
            param.default_value,
            param.sequence.unwrap_or(index as i64),
        ])?;
    }
    Ok(())
}

pub fn create_product_type(conn: &Connection, input: &ProductTypeInput) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        r#"INSERT INTO product_types (name, description, volume_formula, waste_formula, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)"#,
        params![
            input.name.trim(),
            input.description,
            input.volume_formula.trim(),
            input.waste_formula.trim(),
            super::now()
        ],
    )?;
    let id = tx.last_insert_rowid();
    insert_parameters(&tx, id, &input.parameters)?;
    tx.commit()?;
    Ok(id)
}

/// Replace a product type and its whole parameter list; false if missing
pub fn update_product_type(conn: &Connection, id: i64, input: &ProductTypeInput) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        r#"UPDATE product_types
           SET name = ?1, description = ?2, volume_formula = ?3, waste_formula = ?4, updated_at = ?5
           WHERE id = ?6"#,
        params![
            input.name.trim(),
            input.description,
            input.volume_formula.trim(),
            input.waste_formula.trim(),
            super::now(),
            id
        ],
    )?;
    if changed == 0 {
        // Dropping the transaction rolls it back
        return Ok(false);
    }
    tx.execute(
        "DELETE FROM product_type_parameters WHERE product_type_id = ?1",
        params![id],
    )?;
    insert_parameters(&tx, id, &input.parameters)?;
    tx.commit()?;
    Ok(true)
}

/// Parameters are removed by the foreign key cascade
pub fn delete_product_type(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM product_types WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
