//! Invoice billing and payments.
//!
//! Flow: InvoiceRequest → validate → price against catalog → issue number
//! → write invoice + line items (one transaction). Payments later adjust
//! `amount_paid` / `due` through [`PaymentLedger`].

mod invoice_builder;
mod numbering;
mod payments;

pub use invoice_builder::*;
pub use numbering::*;
pub use payments::*;

use tracing::{info, instrument};

use crate::db::Database;
use crate::error::{LabError, LabResult};
use crate::models::{Actor, InvoiceDetail};

/// Load an invoice with its line items.
pub fn load_invoice_detail(db: &Database, invoice_id: &str) -> LabResult<InvoiceDetail> {
    let invoice = db
        .get_invoice(invoice_id)?
        .ok_or_else(|| LabError::not_found("invoice", invoice_id))?;
    let line_items = db.list_line_items(invoice_id)?;
    Ok(InvoiceDetail {
        invoice,
        line_items,
    })
}

/// Remove an invoice together with its line items, reports and results.
///
/// Callers gate this to administrators.
#[instrument(skip(db, actor), fields(actor = %actor.username))]
pub fn delete_invoice(db: &Database, actor: &Actor, invoice_id: &str) -> LabResult<()> {
    db.run_in_transaction(|db| {
        let invoice = db
            .get_invoice(invoice_id)?
            .ok_or_else(|| LabError::not_found("invoice", invoice_id))?;
        db.delete_invoice(invoice_id)?;
        info!(invoice_no = %invoice.invoice_no, "invoice deleted");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabTest, LineItemKind, PatientDetails, Report, ReportStatus, Role};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn admin() -> Actor {
        Actor::new("u-0", "admin", Role::Admin)
    }

    fn setup_db() -> (Database, InvoiceDetail) {
        let db = Database::open_in_memory().unwrap();
        db.upsert_lab_test(&LabTest::new("CBC".into(), "CBC".into(), "Hematology".into(), dec!(500)))
            .unwrap();
        let request = InvoiceRequest {
            patient: PatientDetails {
                name: "Nadia".into(),
                age: "28".into(),
                gender: "Female".into(),
                contact_no: "015".into(),
                referred_by: "Self".into(),
            },
            delivery_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            tests: vec!["CBC".into()],
            consumables: vec![],
            discount_amount: dec!(0),
            amount_paid: dec!(0),
        };
        let detail = InvoiceBuilder::new(&db, InvoiceNumbering::default())
            .create(&admin(), &request)
            .unwrap();
        (db, detail)
    }

    #[test]
    fn test_load_detail() {
        let (db, created) = setup_db();
        let loaded = load_invoice_detail(&db, &created.invoice.invoice_id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.tests().next().unwrap().kind, LineItemKind::Test);

        assert!(load_invoice_detail(&db, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_cascades() {
        let (db, created) = setup_db();
        let invoice_id = created.invoice.invoice_id.clone();
        db.insert_report(&Report {
            report_id: "r1".into(),
            invoice_id: invoice_id.clone(),
            test_code: "CBC".into(),
            test_name: "CBC".into(),
            doctor_id: None,
            report_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            status: ReportStatus::Completed,
            created_by: "tech".into(),
            created_at: "2024-07-01T09:00:00+00:00".into(),
            updated_at: "2024-07-01T09:00:00+00:00".into(),
        })
        .unwrap();

        delete_invoice(&db, &admin(), &invoice_id).unwrap();

        assert!(db.get_invoice(&invoice_id).unwrap().is_none());
        assert!(db.list_line_items(&invoice_id).unwrap().is_empty());
        assert!(db.get_report("r1").unwrap().is_none());
    }

    #[test]
    fn test_delete_unknown_invoice() {
        let (db, _) = setup_db();
        assert!(delete_invoice(&db, &admin(), "missing").unwrap_err().is_not_found());
    }
}
