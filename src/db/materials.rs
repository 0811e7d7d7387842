//! Material CRUD

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub id: i64,
    pub mark: String,
    /// g/cm³
    pub density: f64,
    /// Price per kg
    pub price: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialInput {
    #[serde(default)]
    pub mark: String,
    #[serde(default)]
    pub density: f64,
    #[serde(default)]
    pub price: f64,
}

const SELECT: &str = "SELECT id, mark, density, price, created_at, updated_at FROM materials";

fn row_to_material(row: &Row) -> Result<Material> {
    Ok(Material {
        id: row.get(0)?,
        mark: row.get(1)?,
        density: row.get(2)?,
        price: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn list_materials(conn: &Connection) -> Result<Vec<Material>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY mark", SELECT))?;
    let materials = stmt
        .query_map([], row_to_material)?
        .collect::<Result<Vec<_>>>()?;
    Ok(materials)
}

pub fn get_material(conn: &Connection, id: i64) -> Result<Option<Material>> {
    conn.query_row(&format!("{} WHERE id = ?1", SELECT), params![id], row_to_material)
        .optional()
}

pub fn create_material(conn: &Connection, input: &MaterialInput) -> Result<i64> {
    let now = super::now();
    conn.execute(
        "INSERT INTO materials (mark, density, price, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![input.mark.trim(), input.density, input.price, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns false when no material has this id
pub fn update_material(conn: &Connection, id: i64, input: &MaterialInput) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE materials SET mark = ?1, density = ?2, price = ?3, updated_at = ?4 WHERE id = ?5",
        params![input.mark.trim(), input.density, input.price, super::now(), id],
    )?;
    Ok(changed > 0)
}

pub fn delete_material(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM materials WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    fn input(mark: &str, density: f64, price: f64) -> MaterialInput {
        MaterialInput {
            mark: mark.to_string(),
            density,
            price,
        }
    }

    #[test]
    fn test_material_crud() {
        let env = TestEnv::new().unwrap();
        let id = create_material(&env.conn, &input("  МПГ-6 ", 1.8, 950.0)).unwrap();

        let material = get_material(&env.conn, id).unwrap().unwrap();
        assert_eq!(material.mark, "МПГ-6");
        assert_eq!(material.density, 1.8);

        assert!(update_material(&env.conn, id, &input("МПГ-7", 1.85, 1000.0)).unwrap());
        let material = get_material(&env.conn, id).unwrap().unwrap();
        assert_eq!(material.mark, "МПГ-7");
        assert_eq!(material.price, 1000.0);

        assert!(delete_material(&env.conn, id).unwrap());
        assert!(get_material(&env.conn, id).unwrap().is_none());
    }

    #[test]
    fn test_missing_material_reports_false() {
        let env = TestEnv::new().unwrap();
        assert!(!update_material(&env.conn, 999, &input("X", 1.0, 1.0)).unwrap());
        assert!(!delete_material(&env.conn, 999).unwrap());
    }

    #[test]
    fn test_list_sorted_by_mark() {
        let env = TestEnv::new().unwrap();
        create_material(&env.conn, &input("B", 1.0, 1.0)).unwrap();
        create_material(&env.conn, &input("A", 1.0, 1.0)).unwrap();
        let marks: Vec<String> = list_materials(&env.conn)
            .unwrap()
            .into_iter()
            .map(|m| m.mark)
            .collect();
        assert_eq!(marks, vec!["A", "B"]);
    }
}
