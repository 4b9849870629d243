//! Report and report-result database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{PendingTest, Report, ReportResult, ReportStatus};

const REPORT_COLUMNS: &str = r#"
    report_id, invoice_id, test_code, test_name, doctor_id, report_date,
    status, created_by, created_at, updated_at
"#;

impl Database {
    // =========================================================================
    // Reports
    // =========================================================================

    /// Insert a new report header.
    pub fn insert_report(&self, report: &Report) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO reports (
                report_id, invoice_id, test_code, test_name, doctor_id, report_date,
                status, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                report.report_id,
                report.invoice_id,
                report.test_code,
                report.test_name,
                report.doctor_id,
                report.report_date,
                report.status.as_str(),
                report.created_by,
                report.created_at,
                report.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Rewrite the mutable header fields of a report.
    pub fn update_report_header(&self, report: &Report) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE reports SET
                doctor_id = ?2,
                report_date = ?3,
                status = ?4,
                updated_at = ?5
            WHERE report_id = ?1
            "#,
            params![
                report.report_id,
                report.doctor_id,
                report.report_date,
                report.status.as_str(),
                report.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a report by ID.
    pub fn get_report(&self, report_id: &str) -> DbResult<Option<Report>> {
        let sql = format!("SELECT {} FROM reports WHERE report_id = ?", REPORT_COLUMNS);
        self.conn
            .query_row(&sql, [report_id], report_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Find the report for an (invoice, test) pair.
    pub fn find_report(&self, invoice_id: &str, test_code: &str) -> DbResult<Option<Report>> {
        let sql = format!(
            "SELECT {} FROM reports WHERE invoice_id = ?1 AND test_code = ?2",
            REPORT_COLUMNS
        );
        self.conn
            .query_row(&sql, params![invoice_id, test_code], report_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All reports written against an invoice.
    pub fn list_reports_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<Report>> {
        let sql = format!(
            "SELECT {} FROM reports WHERE invoice_id = ? ORDER BY created_at, test_code",
            REPORT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([invoice_id], report_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Billed tests that have no report, newest invoice first.
    pub fn list_untested(&self) -> DbResult<Vec<PendingTest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT i.invoice_id, i.invoice_no, i.patient_name, li.item_code, li.item_name,
                   i.created_at
            FROM invoices i
            JOIN line_items li ON li.invoice_id = i.invoice_id AND li.item_kind = 'test'
            LEFT JOIN reports r ON r.invoice_id = i.invoice_id AND r.test_code = li.item_code
            WHERE r.report_id IS NULL
            ORDER BY i.sequence DESC, li.line_item_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PendingTest {
                invoice_id: row.get(0)?,
                invoice_no: row.get(1)?,
                patient_name: row.get(2)?,
                test_code: row.get(3)?,
                test_name: row.get(4)?,
                invoice_created_at: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Insert one result row.
    pub fn insert_report_result(&self, result: &ReportResult) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO report_results (
                report_id, parameter_id, parameter_name, result_value, unit, normal_range, remark
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                result.report_id,
                result.parameter_id,
                result.parameter_name,
                result.value,
                result.unit,
                result.normal_range,
                result.remark,
            ],
        )?;
        Ok(())
    }

    /// Remove every result of a report. Returns the number removed.
    pub fn delete_report_results(&self, report_id: &str) -> DbResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM report_results WHERE report_id = ?", [report_id])?;
        Ok(removed)
    }

    /// Results of a report, in parameter display order where the parameter still exists.
    pub fn list_report_results(&self, report_id: &str) -> DbResult<Vec<ReportResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT rr.report_id, rr.parameter_id, rr.parameter_name, rr.result_value,
                   rr.unit, rr.normal_range, rr.remark
            FROM report_results rr
            LEFT JOIN test_parameters tp ON tp.parameter_id = rr.parameter_id
            WHERE rr.report_id = ?
            ORDER BY COALESCE(tp.sort_order, 2147483647), rr.parameter_name
            "#,
        )?;
        let rows = stmt.query_map([report_id], |row| {
            Ok(ReportResult {
                report_id: row.get(0)?,
                parameter_id: row.get(1)?,
                parameter_name: row.get(2)?,
                value: row.get(3)?,
                unit: row.get(4)?,
                normal_range: row.get(5)?,
                remark: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    let status: String = row.get(6)?;
    let report_date: NaiveDate = row.get(5)?;
    Ok(Report {
        report_id: row.get(0)?,
        invoice_id: row.get(1)?,
        test_code: row.get(2)?,
        test_name: row.get(3)?,
        doctor_id: row.get(4)?,
        report_date,
        status: ReportStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("unsupported report status: {}", status).into(),
            )
        })?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invoice, LineItem, LineItemKind, PatientDetails};
    use rust_decimal_macros::dec;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let invoice = Invoice {
            invoice_id: "inv-1".into(),
            invoice_no: "NPL00000001".into(),
            sequence: 1,
            patient: PatientDetails {
                name: "Karim".into(),
                age: "50".into(),
                gender: "Male".into(),
                contact_no: "019".into(),
                referred_by: "Self".into(),
            },
            delivery_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            total_amount: dec!(900),
            discount_amount: dec!(0),
            amount_paid: dec!(900),
            due: dec!(0),
            created_by: "staff".into(),
            created_at: "2024-06-01T08:00:00+00:00".into(),
        };
        db.insert_invoice(&invoice).unwrap();
        for (code, price) in [("CBC", dec!(500)), ("LFT", dec!(400))] {
            db.insert_line_item(&LineItem {
                invoice_id: "inv-1".into(),
                kind: LineItemKind::Test,
                code: code.into(),
                name: code.into(),
                quantity: 1,
                unit_price: price,
            })
            .unwrap();
        }
        db
    }

    fn make_report(id: &str, test_code: &str) -> Report {
        Report {
            report_id: id.into(),
            invoice_id: "inv-1".into(),
            test_code: test_code.into(),
            test_name: test_code.into(),
            doctor_id: None,
            report_date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            status: ReportStatus::Pending,
            created_by: "tech".into(),
            created_at: "2024-06-02T10:00:00+00:00".into(),
            updated_at: "2024-06-02T10:00:00+00:00".into(),
        }
    }

    fn make_result(report_id: &str, parameter_id: &str, value: &str) -> ReportResult {
        ReportResult {
            report_id: report_id.into(),
            parameter_id: parameter_id.into(),
            parameter_name: parameter_id.to_uppercase(),
            value: value.into(),
            unit: Some("g/dL".into()),
            normal_range: Some("12 - 16".into()),
            remark: None,
        }
    }

    #[test]
    fn test_insert_and_find_report() {
        let db = setup_db();
        let report = make_report("r1", "CBC");
        db.insert_report(&report).unwrap();

        assert_eq!(db.get_report("r1").unwrap().unwrap(), report);
        assert_eq!(db.find_report("inv-1", "CBC").unwrap().unwrap().report_id, "r1");
        assert!(db.find_report("inv-1", "LFT").unwrap().is_none());
    }

    #[test]
    fn test_untested_is_set_difference() {
        let db = setup_db();
        assert_eq!(db.list_untested().unwrap().len(), 2);

        db.insert_report(&make_report("r1", "CBC")).unwrap();
        let pending = db.list_untested().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].test_code, "LFT");
        assert_eq!(pending[0].invoice_no, "NPL00000001");
    }

    #[test]
    fn test_results_replace() {
        let db = setup_db();
        db.insert_report(&make_report("r1", "CBC")).unwrap();
        db.insert_report_result(&make_result("r1", "hb", "13.2")).unwrap();
        db.insert_report_result(&make_result("r1", "wbc", "7000")).unwrap();
        assert_eq!(db.list_report_results("r1").unwrap().len(), 2);

        assert_eq!(db.delete_report_results("r1").unwrap(), 2);
        assert!(db.list_report_results("r1").unwrap().is_empty());
    }

    #[test]
    fn test_update_header() {
        let db = setup_db();
        let mut report = make_report("r1", "CBC");
        db.insert_report(&report).unwrap();

        report.status = ReportStatus::Completed;
        report.updated_at = "2024-06-03T10:00:00+00:00".into();
        assert!(db.update_report_header(&report).unwrap());

        let retrieved = db.get_report("r1").unwrap().unwrap();
        assert_eq!(retrieved.status, ReportStatus::Completed);
        assert_eq!(retrieved.updated_at, "2024-06-03T10:00:00+00:00");
    }

    #[test]
    fn test_unknown_status_rejected_on_read() {
        let db = setup_db();
        db.insert_report(&make_report("r1", "CBC")).unwrap();
        // Legacy rows may carry a third state; write one with CHECK enforcement off.
        db.conn()
            .execute_batch(
                r#"
                PRAGMA ignore_check_constraints = ON;
                UPDATE reports SET status = 'verified' WHERE report_id = 'r1';
                PRAGMA ignore_check_constraints = OFF;
                "#,
            )
            .unwrap();

        assert!(db.get_report("r1").is_err());
    }
}
