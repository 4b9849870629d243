//! Report creation, editing and the pending-work list.
//!
//! State per (invoice, test): no report → pending ⇄ completed. Status is
//! always derived from the stored results, never set by the caller.

use std::collections::BTreeSet;

use tracing::{info, instrument, warn};

use super::{build_results, ResultSet};
use crate::db::Database;
use crate::error::{LabError, LabResult};
use crate::models::{
    Actor, LineItemKind, Parameter, PendingTest, Report, ReportDetail, ReportRow, ReportStatus,
};

/// Drives reports for billed tests.
pub struct ReportWorkflow<'a> {
    db: &'a Database,
}

impl<'a> ReportWorkflow<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create the report for a billed test.
    ///
    /// Fails if the test is not billed on the invoice or a report for the
    /// pair already exists. The report and all of its results are written
    /// together.
    #[instrument(skip(self, actor, results), fields(actor = %actor.username))]
    pub fn create_report(
        &self,
        actor: &Actor,
        invoice_id: &str,
        test_code: &str,
        doctor_id: Option<&str>,
        results: &ResultSet,
    ) -> LabResult<ReportDetail> {
        let outcome = self.db.run_in_transaction(|db| {
            db.get_invoice(invoice_id)?
                .ok_or_else(|| LabError::not_found("invoice", invoice_id))?;

            let billed = db
                .list_line_items(invoice_id)?
                .into_iter()
                .find(|item| item.kind == LineItemKind::Test && item.code == test_code)
                .ok_or_else(|| {
                    LabError::validation(format!(
                        "test {} is not billed on invoice {}",
                        test_code, invoice_id
                    ))
                })?;

            if db.find_report(invoice_id, test_code)?.is_some() {
                return Err(LabError::validation(format!(
                    "a report for test {} on invoice {} already exists",
                    test_code, invoice_id
                )));
            }
            check_doctor(db, doctor_id)?;

            let parameters = db.list_parameters(test_code)?;
            let report_id = uuid::Uuid::new_v4().to_string();
            let rows = build_results(&report_id, &parameters, results)?;

            let now = chrono::Utc::now();
            let report = Report {
                report_id,
                invoice_id: invoice_id.to_string(),
                test_code: test_code.to_string(),
                test_name: billed.name,
                doctor_id: doctor_id.map(String::from),
                report_date: now.date_naive(),
                status: ReportStatus::derive(&parameters, &rows),
                created_by: actor.username.clone(),
                created_at: now.to_rfc3339(),
                updated_at: now.to_rfc3339(),
            };

            db.insert_report(&report)?;
            for row in &rows {
                db.insert_report_result(row)?;
            }
            assemble_detail(db, report)
        });

        match &outcome {
            Ok(detail) => info!(
                report_id = %detail.report.report_id,
                status = detail.report.status.as_str(),
                "report created"
            ),
            Err(e) => warn!(error = %e, "report creation rejected"),
        }
        outcome
    }

    /// Replace every result of a report and re-derive its status.
    ///
    /// Old results are deleted and the new set inserted in one transaction,
    /// so readers see either the old results or the new ones.
    #[instrument(skip(self, actor, results), fields(actor = %actor.username))]
    pub fn edit_report(
        &self,
        actor: &Actor,
        report_id: &str,
        doctor_id: Option<&str>,
        results: &ResultSet,
    ) -> LabResult<ReportDetail> {
        let outcome = self.db.run_in_transaction(|db| {
            let mut report = db
                .get_report(report_id)?
                .ok_or_else(|| LabError::not_found("report", report_id))?;
            check_doctor(db, doctor_id)?;

            let parameters = db.list_parameters(&report.test_code)?;
            let rows = build_results(report_id, &parameters, results)?;

            db.delete_report_results(report_id)?;
            for row in &rows {
                db.insert_report_result(row)?;
            }

            let now = chrono::Utc::now();
            report.doctor_id = doctor_id.map(String::from);
            report.report_date = now.date_naive();
            report.status = ReportStatus::derive(&parameters, &rows);
            report.updated_at = now.to_rfc3339();
            db.update_report_header(&report)?;

            assemble_detail(db, report)
        });

        match &outcome {
            Ok(detail) => info!(
                status = detail.report.status.as_str(),
                "report edited"
            ),
            Err(e) => warn!(error = %e, "report edit rejected"),
        }
        outcome
    }

    /// Billed tests across all invoices that still have no report.
    pub fn pending_tests(&self) -> LabResult<Vec<PendingTest>> {
        Ok(self.db.list_untested()?)
    }

    /// Test codes billed on one invoice that have no report yet.
    pub fn untested_codes_for_invoice(&self, invoice_id: &str) -> LabResult<BTreeSet<String>> {
        self.db
            .get_invoice(invoice_id)?
            .ok_or_else(|| LabError::not_found("invoice", invoice_id))?;

        let billed: BTreeSet<String> = self
            .db
            .list_line_items(invoice_id)?
            .into_iter()
            .filter(|item| item.kind == LineItemKind::Test)
            .map(|item| item.code)
            .collect();
        let reported: BTreeSet<String> = self
            .db
            .list_reports_for_invoice(invoice_id)?
            .into_iter()
            .map(|report| report.test_code)
            .collect();

        Ok(billed.difference(&reported).cloned().collect())
    }

    /// Report with its patient header, doctor and one row per parameter.
    pub fn report_detail(&self, report_id: &str) -> LabResult<ReportDetail> {
        let report = self
            .db
            .get_report(report_id)?
            .ok_or_else(|| LabError::not_found("report", report_id))?;
        assemble_detail(self.db, report)
    }
}

fn check_doctor(db: &Database, doctor_id: Option<&str>) -> LabResult<()> {
    if let Some(id) = doctor_id {
        db.get_doctor(id)?
            .ok_or_else(|| LabError::not_found("doctor", id))?;
    }
    Ok(())
}

fn assemble_detail(db: &Database, report: Report) -> LabResult<ReportDetail> {
    let invoice = db
        .get_invoice(&report.invoice_id)?
        .ok_or_else(|| LabError::not_found("invoice", report.invoice_id.as_str()))?;
    let doctor = match &report.doctor_id {
        Some(id) => db.get_doctor(id)?,
        None => None,
    };

    let mut results = db.list_report_results(&report.report_id)?;
    let mut rows: Vec<ReportRow> = db
        .list_parameters(&report.test_code)?
        .into_iter()
        .map(|parameter| {
            let result = results
                .iter()
                .position(|r| r.parameter_id == parameter.parameter_id)
                .map(|idx| results.remove(idx));
            ReportRow { parameter, result }
        })
        .collect();

    // Results whose parameter was removed from the catalog keep their snapshot.
    for result in results {
        let mut parameter = Parameter::new(
            report.test_code.clone(),
            result.parameter_name.clone(),
            u32::MAX,
        );
        parameter.parameter_id = result.parameter_id.clone();
        parameter.unit = result.unit.clone();
        parameter.normal_range = result.normal_range.clone();
        rows.push(ReportRow {
            parameter,
            result: Some(result),
        });
    }

    Ok(ReportDetail {
        invoice_no: invoice.invoice_no,
        patient: invoice.patient,
        doctor,
        rows,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{InvoiceBuilder, InvoiceNumbering, InvoiceRequest};
    use crate::models::{Doctor, LabTest, PatientDetails, Role};
    use crate::reporting::ResultInput;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct Fixture {
        db: Database,
        invoice_id: String,
        lft: Vec<Parameter>,
    }

    fn tech() -> Actor {
        Actor::new("u-2", "technologist", Role::Staff)
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        db.upsert_lab_test(&LabTest::new("LFT".into(), "Liver Function Test".into(), "Biochemistry".into(), dec!(900)))
            .unwrap();
        db.upsert_lab_test(&LabTest::new("CBC".into(), "Complete Blood Count".into(), "Hematology".into(), dec!(500)))
            .unwrap();
        let lft = vec![
            Parameter::new("LFT".into(), "ALT".into(), 1).with_unit("U/L"),
            Parameter::new("LFT".into(), "AST".into(), 2).with_unit("U/L"),
            Parameter::new("LFT".into(), "ALP".into(), 3).with_unit("U/L"),
        ];
        for p in &lft {
            db.upsert_parameter(p).unwrap();
        }

        let request = InvoiceRequest {
            patient: PatientDetails {
                name: "Abul".into(),
                age: "60".into(),
                gender: "Male".into(),
                contact_no: "011".into(),
                referred_by: "Self".into(),
            },
            delivery_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            tests: vec!["LFT".into(), "CBC".into()],
            consumables: vec![],
            discount_amount: dec!(0),
            amount_paid: dec!(0),
        };
        let detail = InvoiceBuilder::new(&db, InvoiceNumbering::default())
            .create(&tech(), &request)
            .unwrap();

        Fixture {
            db,
            invoice_id: detail.invoice.invoice_id,
            lft,
        }
    }

    fn values(params: &[Parameter], filled: &[&str]) -> ResultSet {
        params
            .iter()
            .zip(filled)
            .map(|(p, v)| (p.parameter_id.clone(), ResultInput::from(*v)))
            .collect()
    }

    #[test]
    fn test_partial_then_complete() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);

        let detail = workflow
            .create_report(&tech(), &fx.invoice_id, "LFT", None, &values(&fx.lft, &["30", "25"]))
            .unwrap();
        assert_eq!(detail.report.status, ReportStatus::Pending);
        assert_eq!(detail.rows.len(), 3);
        assert_eq!(detail.filled_count(), 2);
        assert_eq!(detail.report.test_name, "Liver Function Test");

        let edited = workflow
            .edit_report(
                &tech(),
                &detail.report.report_id,
                None,
                &values(&fx.lft, &["30", "25", "90"]),
            )
            .unwrap();
        assert_eq!(edited.report.status, ReportStatus::Completed);
        assert_eq!(edited.filled_count(), 3);
        assert_eq!(fx.db.list_report_results(&edited.report.report_id).unwrap().len(), 3);
    }

    #[test]
    fn test_edit_can_reopen_report() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);

        let detail = workflow
            .create_report(&tech(), &fx.invoice_id, "LFT", None, &values(&fx.lft, &["1", "2", "3"]))
            .unwrap();
        assert_eq!(detail.report.status, ReportStatus::Completed);

        let edited = workflow
            .edit_report(&tech(), &detail.report.report_id, None, &values(&fx.lft, &["1", ""]))
            .unwrap();
        assert_eq!(edited.report.status, ReportStatus::Pending);
        assert_eq!(edited.filled_count(), 1);
    }

    #[test]
    fn test_duplicate_report_rejected() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);
        let results = values(&fx.lft, &["30"]);

        workflow
            .create_report(&tech(), &fx.invoice_id, "LFT", None, &results)
            .unwrap();
        let err = workflow
            .create_report(&tech(), &fx.invoice_id, "LFT", None, &results)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unbilled_test_rejected() {
        let fx = setup();
        fx.db
            .upsert_lab_test(&LabTest::new("TSH".into(), "TSH".into(), "Hormone".into(), dec!(700)))
            .unwrap();
        let workflow = ReportWorkflow::new(&fx.db);

        let err = workflow
            .create_report(&tech(), &fx.invoice_id, "TSH", None, &ResultSet::new())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unknown_references() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);

        let err = workflow
            .create_report(&tech(), "missing", "LFT", None, &ResultSet::new())
            .unwrap_err();
        assert!(err.is_not_found());

        let err = workflow
            .create_report(&tech(), &fx.invoice_id, "LFT", Some("nobody"), &ResultSet::new())
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(fx.db.find_report(&fx.invoice_id, "LFT").unwrap().is_none());

        let err = workflow
            .edit_report(&tech(), "missing", None, &ResultSet::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_doctor_attached() {
        let fx = setup();
        let doctor = Doctor::new("Farhana Islam", "MBBS, FCPS", "Consultant", "NPL");
        fx.db.insert_doctor(&doctor).unwrap();
        let workflow = ReportWorkflow::new(&fx.db);

        let detail = workflow
            .create_report(
                &tech(),
                &fx.invoice_id,
                "LFT",
                Some(&doctor.doctor_id),
                &values(&fx.lft, &["30"]),
            )
            .unwrap();
        assert_eq!(detail.doctor, Some(doctor));
        assert_eq!(detail.patient.name, "Abul");
        assert_eq!(detail.invoice_no, "NPL00000001");
    }

    #[test]
    fn test_work_remaining() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);

        let remaining = workflow.untested_codes_for_invoice(&fx.invoice_id).unwrap();
        assert_eq!(remaining.into_iter().collect::<Vec<_>>(), vec!["CBC", "LFT"]);

        workflow
            .create_report(&tech(), &fx.invoice_id, "CBC", None, &ResultSet::new())
            .unwrap();
        let remaining = workflow.untested_codes_for_invoice(&fx.invoice_id).unwrap();
        assert_eq!(remaining.into_iter().collect::<Vec<_>>(), vec!["LFT"]);

        let pending = workflow.pending_tests().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].test_code, "LFT");
    }

    #[test]
    fn test_test_without_parameters_completes() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);

        let detail = workflow
            .create_report(&tech(), &fx.invoice_id, "CBC", None, &ResultSet::new())
            .unwrap();
        assert_eq!(detail.report.status, ReportStatus::Completed);
        assert!(detail.rows.is_empty());
    }

    #[test]
    fn test_results_survive_parameter_changes() {
        let fx = setup();
        let workflow = ReportWorkflow::new(&fx.db);
        let detail = workflow
            .create_report(&tech(), &fx.invoice_id, "LFT", None, &values(&fx.lft, &["30", "25", "90"]))
            .unwrap();

        let mut alt = fx.lft[0].clone();
        alt.unit = Some("IU/L".into());
        fx.db.upsert_parameter(&alt).unwrap();
        fx.db.delete_parameter(&fx.lft[2].parameter_id).unwrap();

        let reloaded = workflow.report_detail(&detail.report.report_id).unwrap();
        let alt_row = &reloaded.rows[0];
        assert_eq!(alt_row.parameter.unit.as_deref(), Some("IU/L"));
        assert_eq!(alt_row.result.as_ref().unwrap().unit.as_deref(), Some("U/L"));

        // The removed parameter's result is still shown from its snapshot.
        assert_eq!(reloaded.rows.len(), 3);
        assert_eq!(reloaded.rows[2].parameter.name, "ALP");
        assert_eq!(reloaded.rows[2].result.as_ref().unwrap().value, "90");
    }
}
