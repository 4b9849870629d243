//! Catalog database operations (tests, parameters, consumables).

use rusqlite::{params, OptionalExtension, Row};

use super::{money_column, money_to_sql, Database, DbError, DbResult};
use crate::models::{Consumable, LabTest, Parameter};

impl Database {
    // =========================================================================
    // Tests
    // =========================================================================

    /// Insert or update a test definition.
    pub fn upsert_lab_test(&self, test: &LabTest) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO lab_tests (test_code, test_name, category, price, description, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ON CONFLICT(test_code) DO UPDATE SET
                test_name = excluded.test_name,
                category = excluded.category,
                price = excluded.price,
                description = excluded.description,
                updated_at = datetime('now')
            "#,
            params![
                test.code,
                test.name,
                test.category,
                money_to_sql(&test.price),
                test.description,
            ],
        )?;
        Ok(())
    }

    /// Get a test by code.
    pub fn get_lab_test(&self, code: &str) -> DbResult<Option<LabTest>> {
        self.conn
            .query_row(
                r#"
                SELECT test_code, test_name, category, price, description
                FROM lab_tests
                WHERE test_code = ?
                "#,
                [code],
                lab_test_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all tests ordered by name.
    pub fn list_lab_tests(&self) -> DbResult<Vec<LabTest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT test_code, test_name, category, price, description
            FROM lab_tests
            ORDER BY test_name
            "#,
        )?;
        let rows = stmt.query_map([], lab_test_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a test and its parameters.
    ///
    /// Refused while any invoice bills the test.
    pub fn delete_lab_test(&self, code: &str) -> DbResult<bool> {
        let billed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM line_items WHERE item_kind = 'test' AND item_code = ?",
            [code],
            |row| row.get(0),
        )?;
        if billed > 0 {
            return Err(DbError::Constraint(format!(
                "test {} is billed on {} invoice(s)",
                code, billed
            )));
        }

        let rows_affected = self
            .conn
            .execute("DELETE FROM lab_tests WHERE test_code = ?", [code])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Insert or update a parameter definition.
    pub fn upsert_parameter(&self, param: &Parameter) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO test_parameters (parameter_id, test_code, parameter_name, unit, normal_range, sort_order)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(parameter_id) DO UPDATE SET
                parameter_name = excluded.parameter_name,
                unit = excluded.unit,
                normal_range = excluded.normal_range,
                sort_order = excluded.sort_order
            "#,
            params![
                param.parameter_id,
                param.test_code,
                param.name,
                param.unit,
                param.normal_range,
                param.sort_order,
            ],
        )?;
        Ok(())
    }

    /// Parameters of a test in display order.
    pub fn list_parameters(&self, test_code: &str) -> DbResult<Vec<Parameter>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT parameter_id, test_code, parameter_name, unit, normal_range, sort_order
            FROM test_parameters
            WHERE test_code = ?
            ORDER BY sort_order, parameter_name
            "#,
        )?;
        let rows = stmt.query_map([test_code], |row| {
            Ok(Parameter {
                parameter_id: row.get(0)?,
                test_code: row.get(1)?,
                name: row.get(2)?,
                unit: row.get(3)?,
                normal_range: row.get(4)?,
                sort_order: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Remove a parameter. Results already recorded keep their snapshot.
    pub fn delete_parameter(&self, parameter_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM test_parameters WHERE parameter_id = ?",
            [parameter_id],
        )?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Consumables
    // =========================================================================

    /// Insert or update a consumable.
    pub fn upsert_consumable(&self, item: &Consumable) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO consumables (consumable_code, name, price, unit, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(consumable_code) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                unit = excluded.unit,
                updated_at = datetime('now')
            "#,
            params![item.code, item.name, money_to_sql(&item.price), item.unit],
        )?;
        Ok(())
    }

    /// Get a consumable by code.
    pub fn get_consumable(&self, code: &str) -> DbResult<Option<Consumable>> {
        self.conn
            .query_row(
                "SELECT consumable_code, name, price, unit FROM consumables WHERE consumable_code = ?",
                [code],
                consumable_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all consumables ordered by name.
    pub fn list_consumables(&self) -> DbResult<Vec<Consumable>> {
        let mut stmt = self
            .conn
            .prepare("SELECT consumable_code, name, price, unit FROM consumables ORDER BY name")?;
        let rows = stmt.query_map([], consumable_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn lab_test_from_row(row: &Row<'_>) -> rusqlite::Result<LabTest> {
    Ok(LabTest {
        code: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        price: money_column(row, 3)?,
        description: row.get(4)?,
    })
}

fn consumable_from_row(row: &Row<'_>) -> rusqlite::Result<Consumable> {
    Ok(Consumable {
        code: row.get(0)?,
        name: row.get(1)?,
        price: money_column(row, 2)?,
        unit: row.get(3)?,
    })
}
