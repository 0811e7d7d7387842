//! Percentage coefficients applied to salary in every calculation

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

use crate::domain::CoefficientRate;

#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub id: i64,
    pub name: String,
    /// Percentage of salary
    pub value: f64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoefficientInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub description: Option<String>,
}

const SELECT: &str =
    "SELECT id, name, value, description, created_at, updated_at FROM coefficients";

fn row_to_coefficient(row: &Row) -> Result<Coefficient> {
    Ok(Coefficient {
        id: row.get(0)?,
        name: row.get(1)?,
        value: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn list_coefficients(conn: &Connection) -> Result<Vec<Coefficient>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY name", SELECT))?;
    let coefficients = stmt
        .query_map([], row_to_coefficient)?
        .collect::<Result<Vec<_>>>()?;
    Ok(coefficients)
}

/// All coefficients as costing rates, ordered by name
pub fn list_rates(conn: &Connection) -> Result<Vec<CoefficientRate>> {
    Ok(list_coefficients(conn)?
        .into_iter()
        .map(|c| CoefficientRate {
            name: c.name,
            value: c.value,
        })
        .collect())
}

pub fn get_coefficient(conn: &Connection, id: i64) -> Result<Option<Coefficient>> {
    conn.query_row(&format!("{} WHERE id = ?1", SELECT), params![id], row_to_coefficient)
        .optional()
}

pub fn create_coefficient(conn: &Connection, input: &CoefficientInput) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO coefficients (name, value, description, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)"#,
        params![input.name.trim(), input.value, input.description, super::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_coefficient(conn: &Connection, id: i64, input: &CoefficientInput) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE coefficients SET name = ?1, value = ?2, description = ?3, updated_at = ?4 WHERE id = ?5",
        params![input.name.trim(), input.value, input.description, super::now(), id],
    )?;
    Ok(changed > 0)
}

pub fn delete_coefficient(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM coefficients WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    fn input(name: &str, value: f64) -> CoefficientInput {
        CoefficientInput {
            name: name.to_string(),
            value,
            description: None,
        }
    }

    #[test]
    fn test_rates_ordered_by_name() {
        let env = TestEnv::new().unwrap();
        create_coefficient(&env.conn, &input("Tax", 20.0)).unwrap();
        create_coefficient(&env.conn, &input("Insurance", 30.0)).unwrap();

        let rates = list_rates(&env.conn).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].name, "Insurance");
        assert_eq!(rates[1].value, 20.0);
    }

    #[test]
    fn test_coefficient_update() {
        let env = TestEnv::new().unwrap();
        let id = create_coefficient(&env.conn, &input("Tax", 20.0)).unwrap();
        let updated = CoefficientInput {
            description: Some("Regional".to_string()),
            ..input("Tax", 13.0)
        };
        assert!(update_coefficient(&env.conn, id, &updated).unwrap());

        let c = get_coefficient(&env.conn, id).unwrap().unwrap();
        assert_eq!(c.value, 13.0);
        assert_eq!(c.description.as_deref(), Some("Regional"));
        assert!(delete_coefficient(&env.conn, id).unwrap());
        assert!(get_coefficient(&env.conn, id).unwrap().is_none());
    }
}
