//! Invoice, line item and invoice-sequence database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{money_column, money_to_sql, Database, DbError, DbResult};
use crate::models::{Invoice, LineItem, LineItemKind, Money, PatientDetails};

const INVOICE_COLUMNS: &str = r#"
    invoice_id, invoice_no, sequence, patient_name, patient_age, patient_gender,
    patient_contact_no, referred_by, delivery_date, total_amount, discount_amount,
    amount_paid, due, created_by, created_at
"#;

/// A line item joined with the creation time of its invoice.
#[derive(Debug, Clone)]
pub struct DatedLineItem {
    pub item: LineItem,
    pub invoice_created_at: String,
}

impl Database {
    // =========================================================================
    // Invoice sequence
    // =========================================================================

    /// Advance the invoice counter and return the new value.
    ///
    /// Must run inside [`Database::run_in_transaction`] together with the
    /// invoice insert, so the increment commits or rolls back with it.
    pub fn advance_invoice_sequence(&self) -> DbResult<u64> {
        let updated = self.conn.execute(
            "UPDATE invoice_sequence SET last_value = last_value + 1 WHERE name = 'invoice'",
            [],
        )?;
        if updated != 1 {
            return Err(DbError::NotFound("invoice sequence".into()));
        }
        self.current_invoice_sequence()
    }

    /// Last issued counter value (0 when nothing was issued).
    pub fn current_invoice_sequence(&self) -> DbResult<u64> {
        let value: i64 = self.conn.query_row(
            "SELECT last_value FROM invoice_sequence WHERE name = 'invoice'",
            [],
            |row| row.get(0),
        )?;
        Ok(value as u64)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Insert a new invoice header.
    pub fn insert_invoice(&self, invoice: &Invoice) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_no, sequence, patient_name, patient_age, patient_gender,
                patient_contact_no, referred_by, delivery_date, total_amount, discount_amount,
                amount_paid, due, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                invoice.invoice_id,
                invoice.invoice_no,
                invoice.sequence as i64,
                invoice.patient.name,
                invoice.patient.age,
                invoice.patient.gender,
                invoice.patient.contact_no,
                invoice.patient.referred_by,
                invoice.delivery_date,
                money_to_sql(&invoice.total_amount),
                money_to_sql(&invoice.discount_amount),
                money_to_sql(&invoice.amount_paid),
                money_to_sql(&invoice.due),
                invoice.created_by,
                invoice.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get an invoice by ID.
    pub fn get_invoice(&self, invoice_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {} FROM invoices WHERE invoice_id = ?", INVOICE_COLUMNS);
        self.conn
            .query_row(&sql, [invoice_id], invoice_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Get an invoice by its human-readable number.
    pub fn get_invoice_by_number(&self, invoice_no: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {} FROM invoices WHERE invoice_no = ?", INVOICE_COLUMNS);
        self.conn
            .query_row(&sql, [invoice_no], invoice_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Invoices created on dates within `[from, to]`, oldest first.
    pub fn list_invoices_created_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE substr(created_at, 1, 10) BETWEEN ?1 AND ?2 ORDER BY sequence",
            INVOICE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![from, to], invoice_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Write new payment totals for an invoice.
    pub fn update_invoice_payment(
        &self,
        invoice_id: &str,
        amount_paid: Money,
        due: Money,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE invoices SET amount_paid = ?2, due = ?3 WHERE invoice_id = ?1",
            params![invoice_id, money_to_sql(&amount_paid), money_to_sql(&due)],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete an invoice. Line items, reports and results cascade.
    pub fn delete_invoice(&self, invoice_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM invoices WHERE invoice_id = ?", [invoice_id])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Line items
    // =========================================================================

    /// Insert a line item snapshot.
    pub fn insert_line_item(&self, item: &LineItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO line_items (invoice_id, item_kind, item_code, item_name, quantity, unit_price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                item.invoice_id,
                item.kind.as_str(),
                item.code,
                item.name,
                item.quantity,
                money_to_sql(&item.unit_price),
            ],
        )?;
        Ok(())
    }

    /// Line items of an invoice: tests first, then consumables, in insertion order.
    pub fn list_line_items(&self, invoice_id: &str) -> DbResult<Vec<LineItem>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT invoice_id, item_kind, item_code, item_name, quantity, unit_price
            FROM line_items
            WHERE invoice_id = ?
            ORDER BY CASE item_kind WHEN 'test' THEN 0 ELSE 1 END, line_item_id
            "#,
        )?;
        let rows = stmt.query_map([invoice_id], line_item_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Line items of invoices created on dates within `[from, to]`.
    pub fn list_line_items_created_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DatedLineItem>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT li.invoice_id, li.item_kind, li.item_code, li.item_name, li.quantity,
                   li.unit_price, i.created_at
            FROM line_items li
            JOIN invoices i ON i.invoice_id = li.invoice_id
            WHERE substr(i.created_at, 1, 10) BETWEEN ?1 AND ?2
            ORDER BY i.sequence, li.line_item_id
            "#,
        )?;
        let rows = stmt.query_map(params![from, to], |row| {
            Ok(DatedLineItem {
                item: line_item_from_row(row)?,
                invoice_created_at: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let sequence: i64 = row.get(2)?;
    Ok(Invoice {
        invoice_id: row.get(0)?,
        invoice_no: row.get(1)?,
        sequence: sequence as u64,
        patient: PatientDetails {
            name: row.get(3)?,
            age: row.get(4)?,
            gender: row.get(5)?,
            contact_no: row.get(6)?,
            referred_by: row.get(7)?,
        },
        delivery_date: row.get(8)?,
        total_amount: money_column(row, 9)?,
        discount_amount: money_column(row, 10)?,
        amount_paid: money_column(row, 11)?,
        due: money_column(row, 12)?,
        created_by: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn line_item_from_row(row: &Row<'_>) -> rusqlite::Result<LineItem> {
    let kind: String = row.get(1)?;
    Ok(LineItem {
        invoice_id: row.get(0)?,
        kind: LineItemKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown line item kind: {}", kind).into(),
            )
        })?,
        code: row.get(2)?,
        name: row.get(3)?,
        quantity: row.get(4)?,
        unit_price: money_column(row, 5)?,
    })
}
