//! Manufacturing operation CRUD (joined with unit names on read)

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub id: i64,
    pub number: String,
    pub description: String,
    pub unit_id: Option<i64>,
    pub unit_name: Option<String>,
    /// Base cost of one execution
    pub cost: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationInput {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit_id: Option<i64>,
    #[serde(default)]
    pub cost: f64,
}

const SELECT: &str = r#"
    SELECT o.id, o.number, o.description, o.unit_id, u.name, o.cost, o.created_at, o.updated_at
    FROM operations o
    LEFT JOIN units u ON u.id = o.unit_id
"#;

fn row_to_operation(row: &Row) -> Result<Operation> {
    Ok(Operation {
        id: row.get(0)?,
        number: row.get(1)?,
        description: row.get(2)?,
        unit_id: row.get(3)?,
        unit_name: row.get(4)?,
        cost: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn list_operations(conn: &Connection) -> Result<Vec<Operation>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY o.number", SELECT))?;
    let operations = stmt
        .query_map([], row_to_operation)?
        .collect::<Result<Vec<_>>>()?;
    Ok(operations)
}

pub fn get_operation(conn: &Connection, id: i64) -> Result<Option<Operation>> {
    conn.query_row(&format!("{} WHERE o.id = ?1", SELECT), params![id], row_to_operation)
        .optional()
}

pub fn create_operation(conn: &Connection, input: &OperationInput) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO operations (number, description, unit_id, cost, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)"#,
        params![
            input.number.trim(),
            input.description.trim(),
            input.unit_id,
            input.cost,
            super::now()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_operation(conn: &Connection, id: i64, input: &OperationInput) -> Result<bool> {
    let changed = conn.execute(
        r#"UPDATE operations
           SET number = ?1, description = ?2, unit_id = ?3, cost = ?4, updated_at = ?5
           WHERE id = ?6"#,
        params![
            input.number.trim(),
            input.description.trim(),
            input.unit_id,
            input.cost,
            super::now(),
            id
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_operation(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM operations WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::units::{create_unit, delete_unit, UnitInput};
    use crate::testing::TestEnv;

    fn input(number: &str, unit_id: Option<i64>) -> OperationInput {
        OperationInput {
            number: number.to_string(),
            description: format!("Operation {}", number),
            unit_id,
            cost: 120.0,
        }
    }

    #[test]
    fn test_operation_reads_join_unit_name() {
        let env = TestEnv::new().unwrap();
        let unit_id = create_unit(&env.conn, &UnitInput { name: "шт".to_string() }).unwrap();
        let id = create_operation(&env.conn, &input("010", Some(unit_id))).unwrap();

        let op = get_operation(&env.conn, id).unwrap().unwrap();
        assert_eq!(op.unit_id, Some(unit_id));
        assert_eq!(op.unit_name.as_deref(), Some("шт"));
        assert_eq!(op.cost, 120.0);
    }

    #[test]
    fn test_deleting_unit_detaches_operations() {
        let env = TestEnv::new().unwrap();
        let unit_id = create_unit(&env.conn, &UnitInput { name: "ч".to_string() }).unwrap();
        let id = create_operation(&env.conn, &input("020", Some(unit_id))).unwrap();

        assert!(delete_unit(&env.conn, unit_id).unwrap());
        let op = get_operation(&env.conn, id).unwrap().unwrap();
        assert_eq!(op.unit_id, None);
        assert_eq!(op.unit_name, None);
    }

    #[test]
    fn test_list_sorted_by_number() {
        let env = TestEnv::new().unwrap();
        create_operation(&env.conn, &input("030", None)).unwrap();
        create_operation(&env.conn, &input("005", None)).unwrap();
        let numbers: Vec<String> = list_operations(&env.conn)
            .unwrap()
            .into_iter()
            .map(|o| o.number)
            .collect();
        assert_eq!(numbers, vec!["005", "030"]);
    }

    #[test]
    fn test_update_and_delete_missing() {
        let env = TestEnv::new().unwrap();
        assert!(!update_operation(&env.conn, 42, &input("1", None)).unwrap());
        assert!(!delete_operation(&env.conn, 42).unwrap());
    }
}
