//! Diagnostic Lab Core Library
//!
//! Invoice billing, payment ledger and diagnostic report workflow for a
//! pathology lab.
//!
//! # Architecture
//!
//! ```text
//!   Front desk                         Bench
//!       │                                │
//!  InvoiceRequest                  results per parameter
//!       │                                │
//!       ▼                                ▼
//! ┌──────────────┐   line items   ┌────────────────┐
//! │InvoiceBuilder│───────────────▶│ ReportWorkflow │◀── Catalog parameters
//! │  + Numbering │                │ pending ⇄ done  │
//! └──────┬───────┘                └───────┬────────┘
//!        │ invoice                        │ report + results
//!        ▼                                ▼
//! ┌──────────────┐                ┌────────────────┐
//! │PaymentLedger │                │  Doctor        │
//! │ paid / due   │                │  Directory     │
//! └──────┬───────┘                └────────────────┘
//!        │
//!        ▼
//!  Invoice copies (Customer / Lab), financial summary
//! ```
//!
//! # Core Principle
//!
//! **Every multi-row write is one transaction.** An invoice exists with all
//! of its line items or not at all; a report edit replaces all results or
//! none.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Invoice, LineItem, Report, Parameter, etc.)
//! - [`billing`]: Invoice numbering, creation and payments
//! - [`reporting`]: Report workflow and doctor directory
//! - [`export`]: Invoice copies and financial summaries
//! - [`config`]: Runtime configuration

pub mod billing;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod reporting;

// Re-export commonly used types
pub use billing::{InvoiceBuilder, InvoiceNumbering, InvoiceRequest, PaymentLedger};
pub use config::LabConfig;
pub use db::Database;
pub use error::{LabError, LabResult};
pub use models::{
    Actor, CopyVariant, Invoice, InvoiceDetail, LineItem, Money, Report, ReportDetail,
    ReportStatus, Role,
};
pub use reporting::{DoctorDirectory, ReportWorkflow, ResultInput, ResultSet};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DiagLabError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LabError> for DiagLabError {
    fn from(e: LabError) -> Self {
        match e {
            LabError::Validation(msg) => DiagLabError::Validation(msg),
            LabError::NotFound { .. } => DiagLabError::NotFound(e.to_string()),
            LabError::Persistence(msg) => DiagLabError::Internal(msg),
        }
    }
}

impl From<db::DbError> for DiagLabError {
    fn from(e: db::DbError) -> Self {
        LabError::from(e).into()
    }
}

impl From<serde_json::Error> for DiagLabError {
    fn from(e: serde_json::Error) -> Self {
        DiagLabError::Internal(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DiagLabError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DiagLabError::Internal(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default settings.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<DiagLabCore>, DiagLabError> {
    let config = LabConfig {
        database_path: path.into(),
        ..LabConfig::default()
    };
    let db = Database::open_with_timeout(&config.database_path, config.busy_timeout())?;
    Ok(DiagLabCore::wrap(db, config))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<DiagLabCore>, DiagLabError> {
    let db = Database::open_in_memory()?;
    Ok(DiagLabCore::wrap(db, LabConfig::default()))
}

/// Open the database named by `diag-lab.toml` / `DIAG_LAB__*` settings.
#[uniffi::export]
pub fn open_from_environment() -> Result<Arc<DiagLabCore>, DiagLabError> {
    let config = LabConfig::load().map_err(|e| DiagLabError::Internal(format!("{:#}", e)))?;
    let db = Database::open_with_timeout(&config.database_path, config.busy_timeout())?;
    Ok(DiagLabCore::wrap(db, config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point for FFI.
///
/// Every mutating call takes the acting user; administrator-only operations
/// are checked here, not in the workflow layer.
#[derive(uniffi::Object)]
pub struct DiagLabCore {
    db: Arc<Mutex<Database>>,
    config: LabConfig,
}

impl DiagLabCore {
    fn wrap(db: Database, config: LabConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl DiagLabCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a test definition (admin).
    pub fn upsert_lab_test(&self, actor: FfiActor, test: FfiLabTest) -> Result<(), DiagLabError> {
        admin_actor(actor)?;
        let test = models::LabTest::try_from(test)?;
        let db = self.db.lock()?;
        db.upsert_lab_test(&test)?;
        Ok(())
    }

    /// Get a test by code.
    pub fn get_lab_test(&self, code: String) -> Result<Option<FfiLabTest>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(db.get_lab_test(&code)?.map(Into::into))
    }

    /// List all tests by name.
    pub fn list_lab_tests(&self) -> Result<Vec<FfiLabTest>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(db.list_lab_tests()?.into_iter().map(Into::into).collect())
    }

    /// Delete a test that no invoice bills (admin).
    pub fn delete_lab_test(&self, actor: FfiActor, code: String) -> Result<(), DiagLabError> {
        admin_actor(actor)?;
        let db = self.db.lock()?;
        if !db.delete_lab_test(&code)? {
            return Err(LabError::not_found("test", code).into());
        }
        Ok(())
    }

    /// Add or update a result parameter of a test (admin).
    pub fn upsert_parameter(
        &self,
        actor: FfiActor,
        parameter: FfiParameter,
    ) -> Result<FfiParameter, DiagLabError> {
        admin_actor(actor)?;
        let parameter = models::Parameter::try_from(parameter)?;
        let db = self.db.lock()?;
        db.get_lab_test(&parameter.test_code)?
            .ok_or_else(|| LabError::not_found("test", parameter.test_code.as_str()))?;
        db.upsert_parameter(&parameter)?;
        Ok(parameter.into())
    }

    /// Parameters of a test in display order.
    pub fn list_parameters(&self, test_code: String) -> Result<Vec<FfiParameter>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(db.list_parameters(&test_code)?.into_iter().map(Into::into).collect())
    }

    /// Remove a parameter (admin). Recorded results keep their snapshot.
    pub fn delete_parameter(&self, actor: FfiActor, parameter_id: String) -> Result<(), DiagLabError> {
        admin_actor(actor)?;
        let db = self.db.lock()?;
        if !db.delete_parameter(&parameter_id)? {
            return Err(LabError::not_found("parameter", parameter_id).into());
        }
        Ok(())
    }

    /// Add or update a consumable (admin).
    pub fn upsert_consumable(
        &self,
        actor: FfiActor,
        consumable: FfiConsumable,
    ) -> Result<(), DiagLabError> {
        admin_actor(actor)?;
        let consumable = models::Consumable::try_from(consumable)?;
        let db = self.db.lock()?;
        db.upsert_consumable(&consumable)?;
        Ok(())
    }

    /// List all consumables by name.
    pub fn list_consumables(&self) -> Result<Vec<FfiConsumable>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(db.list_consumables()?.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Billing Operations
    // =========================================================================

    /// Create an invoice from a billing request.
    pub fn create_invoice(
        &self,
        actor: FfiActor,
        request: FfiInvoiceRequest,
    ) -> Result<FfiInvoiceDetail, DiagLabError> {
        let actor: Actor = actor.try_into()?;
        let request = InvoiceRequest::try_from(request)?;
        let db = self.db.lock()?;
        let detail = InvoiceBuilder::from_config(&db, &self.config).create(&actor, &request)?;
        Ok(detail.into())
    }

    /// Get an invoice with its line items.
    pub fn get_invoice(&self, invoice_id: String) -> Result<FfiInvoiceDetail, DiagLabError> {
        let db = self.db.lock()?;
        Ok(billing::load_invoice_detail(&db, &invoice_id)?.into())
    }

    /// Look up an invoice by its printed number.
    pub fn find_invoice_by_number(
        &self,
        invoice_no: String,
    ) -> Result<Option<FfiInvoiceDetail>, DiagLabError> {
        let db = self.db.lock()?;
        match db.get_invoice_by_number(invoice_no.trim())? {
            Some(invoice) => Ok(Some(
                billing::load_invoice_detail(&db, &invoice.invoice_id)?.into(),
            )),
            None => Ok(None),
        }
    }

    /// Record a payment against an invoice.
    pub fn receive_payment(
        &self,
        actor: FfiActor,
        invoice_id: String,
        amount: String,
    ) -> Result<FfiPaymentReceipt, DiagLabError> {
        let actor: Actor = actor.try_into()?;
        let amount = parse_money("payment amount", &amount)?;
        let db = self.db.lock()?;
        let receipt = PaymentLedger::new(&db).receive_payment(&actor, &invoice_id, amount)?;
        Ok(receipt.into())
    }

    /// Delete an invoice with its line items and reports (admin).
    pub fn delete_invoice(&self, actor: FfiActor, invoice_id: String) -> Result<(), DiagLabError> {
        let actor: Actor = actor.try_into()?;
        require_admin(&actor)?;
        let db = self.db.lock()?;
        billing::delete_invoice(&db, &actor, &invoice_id)?;
        Ok(())
    }

    /// Render an invoice copy ("customer" or "lab") as JSON.
    pub fn export_invoice_json(
        &self,
        invoice_id: String,
        copy: String,
    ) -> Result<String, DiagLabError> {
        let copy = parse_copy(&copy)?;
        let db = self.db.lock()?;
        let detail = billing::load_invoice_detail(&db, &invoice_id)?;
        Ok(export::InvoiceExport::from_detail(&detail, copy).to_json()?)
    }

    /// Render an invoice copy ("customer" or "lab") as CSV.
    pub fn export_invoice_csv(
        &self,
        invoice_id: String,
        copy: String,
    ) -> Result<String, DiagLabError> {
        let copy = parse_copy(&copy)?;
        let db = self.db.lock()?;
        let detail = billing::load_invoice_detail(&db, &invoice_id)?;
        Ok(export::InvoiceExport::from_detail(&detail, copy).to_csv())
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Create the report for a billed test.
    pub fn create_report(
        &self,
        actor: FfiActor,
        invoice_id: String,
        test_code: String,
        doctor_id: Option<String>,
        results: Vec<FfiResultInput>,
    ) -> Result<FfiReportDetail, DiagLabError> {
        let actor: Actor = actor.try_into()?;
        let results = to_result_set(results)?;
        let db = self.db.lock()?;
        let detail = ReportWorkflow::new(&db).create_report(
            &actor,
            &invoice_id,
            &test_code,
            non_blank(doctor_id.as_deref()),
            &results,
        )?;
        Ok(detail.into())
    }

    /// Replace all results of a report.
    pub fn edit_report(
        &self,
        actor: FfiActor,
        report_id: String,
        doctor_id: Option<String>,
        results: Vec<FfiResultInput>,
    ) -> Result<FfiReportDetail, DiagLabError> {
        let actor: Actor = actor.try_into()?;
        let results = to_result_set(results)?;
        let db = self.db.lock()?;
        let detail = ReportWorkflow::new(&db).edit_report(
            &actor,
            &report_id,
            non_blank(doctor_id.as_deref()),
            &results,
        )?;
        Ok(detail.into())
    }

    /// Get a report with its rows.
    pub fn get_report(&self, report_id: String) -> Result<FfiReportDetail, DiagLabError> {
        let db = self.db.lock()?;
        Ok(ReportWorkflow::new(&db).report_detail(&report_id)?.into())
    }

    /// Reports written against an invoice.
    pub fn list_reports_for_invoice(
        &self,
        invoice_id: String,
    ) -> Result<Vec<FfiReportSummary>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(db
            .list_reports_for_invoice(&invoice_id)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Billed tests that have no report yet, newest invoice first.
    pub fn pending_tests(&self) -> Result<Vec<FfiPendingTest>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(ReportWorkflow::new(&db)
            .pending_tests()?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Test codes on an invoice still waiting for a report.
    pub fn untested_codes_for_invoice(&self, invoice_id: String) -> Result<Vec<String>, DiagLabError> {
        let db = self.db.lock()?;
        let codes = ReportWorkflow::new(&db).untested_codes_for_invoice(&invoice_id)?;
        Ok(codes.into_iter().collect())
    }

    // =========================================================================
    // Doctor Directory Operations
    // =========================================================================

    /// Register a referring doctor (admin).
    pub fn add_doctor(
        &self,
        actor: FfiActor,
        name: String,
        qualifications: String,
        designation: String,
        workplace: String,
    ) -> Result<FfiDoctor, DiagLabError> {
        let actor: Actor = actor.try_into()?;
        require_admin(&actor)?;
        let db = self.db.lock()?;
        let doctor = DoctorDirectory::new(&db).add_doctor(
            &actor,
            &name,
            &qualifications,
            &designation,
            &workplace,
        )?;
        Ok(doctor.into())
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, doctor_id: String) -> Result<FfiDoctor, DiagLabError> {
        let db = self.db.lock()?;
        Ok(DoctorDirectory::new(&db).get_doctor(&doctor_id)?.into())
    }

    /// List all doctors by name.
    pub fn list_doctors(&self) -> Result<Vec<FfiDoctor>, DiagLabError> {
        let db = self.db.lock()?;
        Ok(DoctorDirectory::new(&db)
            .list_doctors()?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Delete a doctor with no reports (admin).
    pub fn delete_doctor(&self, actor: FfiActor, doctor_id: String) -> Result<(), DiagLabError> {
        let actor: Actor = actor.try_into()?;
        require_admin(&actor)?;
        let db = self.db.lock()?;
        DoctorDirectory::new(&db).delete_doctor(&actor, &doctor_id)?;
        Ok(())
    }

    /// Report counts for a doctor.
    pub fn doctor_statistics(&self, doctor_id: String) -> Result<FfiDoctorStatistics, DiagLabError> {
        let db = self.db.lock()?;
        Ok(DoctorDirectory::new(&db).statistics(&doctor_id)?.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Financial summary for invoices created from `from` to `to` as JSON (admin).
    pub fn export_summary_json(
        &self,
        actor: FfiActor,
        from: String,
        to: String,
    ) -> Result<String, DiagLabError> {
        admin_actor(actor)?;
        let (from, to) = (parse_date("from", &from)?, parse_date("to", &to)?);
        let db = self.db.lock()?;
        let summary = export::SummaryExporter::new(&db).summarize(from, to)?;
        Ok(summary.to_json()?)
    }

    /// Financial summary for invoices created from `from` to `to` as CSV (admin).
    pub fn export_summary_csv(
        &self,
        actor: FfiActor,
        from: String,
        to: String,
    ) -> Result<String, DiagLabError> {
        admin_actor(actor)?;
        let (from, to) = (parse_date("from", &from)?, parse_date("to", &to)?);
        let db = self.db.lock()?;
        let summary = export::SummaryExporter::new(&db).summarize(from, to)?;
        Ok(summary.to_csv())
    }
}

// =========================================================================
// Input Helpers
// =========================================================================

/// Convert an actor and insist on the admin role.
fn admin_actor(actor: FfiActor) -> Result<Actor, DiagLabError> {
    let actor = Actor::try_from(actor)?;
    require_admin(&actor)?;
    Ok(actor)
}

fn require_admin(actor: &Actor) -> Result<(), DiagLabError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(DiagLabError::PermissionDenied(format!(
            "{} is not an administrator",
            actor.username
        )))
    }
}

/// Parse a money field. Blank counts as zero.
fn parse_money(field: &str, value: &str) -> Result<Money, DiagLabError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Money::ZERO);
    }
    Money::from_str(value)
        .map_err(|_| DiagLabError::Validation(format!("{} is not an amount: {:?}", field, value)))
}

/// Parse a `YYYY-MM-DD` field.
fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DiagLabError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DiagLabError::Validation(format!("{} is required", field)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DiagLabError::Validation(format!("{} is not a date: {:?}", field, value)))
}

fn parse_copy(copy: &str) -> Result<CopyVariant, DiagLabError> {
    match copy.trim().to_lowercase().as_str() {
        "customer" => Ok(CopyVariant::Customer),
        "lab" => Ok(CopyVariant::Lab),
        other => Err(DiagLabError::Validation(format!(
            "unknown invoice copy: {:?}",
            other
        ))),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Key submitted results by parameter. A parameter may appear once.
fn to_result_set(inputs: Vec<FfiResultInput>) -> Result<ResultSet, DiagLabError> {
    let mut results = ResultSet::new();
    for input in inputs {
        let mut value = ResultInput::new(input.value);
        value.remark = input.remark;
        if results.insert(input.parameter_id.clone(), value).is_some() {
            return Err(DiagLabError::Validation(format!(
                "parameter {} submitted more than once",
                input.parameter_id
            )));
        }
    }
    Ok(results)
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe authenticated actor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActor {
    pub user_id: String,
    pub username: String,
    /// "admin" or "staff"
    pub role: String,
}

impl TryFrom<FfiActor> for Actor {
    type Error = DiagLabError;

    fn try_from(actor: FfiActor) -> Result<Self, Self::Error> {
        let role = Role::parse(&actor.role).ok_or_else(|| {
            DiagLabError::PermissionDenied(format!("unknown role: {:?}", actor.role))
        })?;
        if actor.username.trim().is_empty() {
            return Err(DiagLabError::PermissionDenied("actor has no username".into()));
        }
        Ok(Actor::new(actor.user_id, actor.username.trim(), role))
    }
}

/// FFI-safe test definition.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLabTest {
    pub code: String,
    pub name: String,
    pub category: String,
    pub price: String,
    pub description: Option<String>,
}

impl From<models::LabTest> for FfiLabTest {
    fn from(test: models::LabTest) -> Self {
        Self {
            code: test.code,
            name: test.name,
            category: test.category,
            price: test.price.to_string(),
            description: test.description,
        }
    }
}

impl TryFrom<FfiLabTest> for models::LabTest {
    type Error = DiagLabError;

    fn try_from(test: FfiLabTest) -> Result<Self, Self::Error> {
        let code = required("test code", &test.code)?;
        let name = required("test name", &test.name)?;
        let price = non_negative("test price", &test.price)?;
        let mut lab_test = models::LabTest::new(code, name, test.category.trim().to_string(), price);
        lab_test.description = test.description;
        Ok(lab_test)
    }
}

/// FFI-safe parameter definition.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParameter {
    /// Empty to create a new parameter
    pub parameter_id: String,
    pub test_code: String,
    pub name: String,
    pub unit: Option<String>,
    pub normal_range: Option<String>,
    pub sort_order: u32,
}

impl From<models::Parameter> for FfiParameter {
    fn from(param: models::Parameter) -> Self {
        Self {
            parameter_id: param.parameter_id,
            test_code: param.test_code,
            name: param.name,
            unit: param.unit,
            normal_range: param.normal_range,
            sort_order: param.sort_order,
        }
    }
}

impl TryFrom<FfiParameter> for models::Parameter {
    type Error = DiagLabError;

    fn try_from(param: FfiParameter) -> Result<Self, Self::Error> {
        let test_code = required("test code", &param.test_code)?;
        let name = required("parameter name", &param.name)?;
        let mut parameter = models::Parameter::new(test_code, name, param.sort_order);
        if !param.parameter_id.trim().is_empty() {
            parameter.parameter_id = param.parameter_id.trim().to_string();
        }
        parameter.unit = param.unit;
        parameter.normal_range = param.normal_range;
        Ok(parameter)
    }
}

/// FFI-safe consumable.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsumable {
    pub code: String,
    pub name: String,
    pub price: String,
    pub unit: Option<String>,
}

impl From<models::Consumable> for FfiConsumable {
    fn from(item: models::Consumable) -> Self {
        Self {
            code: item.code,
            name: item.name,
            price: item.price.to_string(),
            unit: item.unit,
        }
    }
}

impl TryFrom<FfiConsumable> for models::Consumable {
    type Error = DiagLabError;

    fn try_from(item: FfiConsumable) -> Result<Self, Self::Error> {
        let code = required("consumable code", &item.code)?;
        let name = required("consumable name", &item.name)?;
        let price = non_negative("consumable price", &item.price)?;
        let mut consumable = models::Consumable::new(code, name, price);
        consumable.unit = item.unit;
        Ok(consumable)
    }
}

fn required(field: &str, value: &str) -> Result<String, DiagLabError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DiagLabError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn non_negative(field: &str, value: &str) -> Result<Money, DiagLabError> {
    let amount = parse_money(field, value)?;
    if amount < Money::ZERO {
        return Err(DiagLabError::Validation(format!("{} must not be negative", field)));
    }
    Ok(amount)
}

/// FFI-safe consumable pick.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsumableSelection {
    pub code: String,
    pub quantity: u32,
}

/// FFI-safe billing request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInvoiceRequest {
    pub patient_name: String,
    pub patient_age: String,
    pub patient_gender: String,
    pub contact_no: String,
    pub referred_by: String,
    /// `YYYY-MM-DD`
    pub delivery_date: String,
    pub tests: Vec<String>,
    pub consumables: Vec<FfiConsumableSelection>,
    pub discount_amount: String,
    pub amount_paid: String,
}

impl TryFrom<FfiInvoiceRequest> for InvoiceRequest {
    type Error = DiagLabError;

    fn try_from(req: FfiInvoiceRequest) -> Result<Self, Self::Error> {
        Ok(InvoiceRequest {
            patient: models::PatientDetails {
                name: req.patient_name,
                age: req.patient_age,
                gender: req.patient_gender,
                contact_no: req.contact_no,
                referred_by: req.referred_by,
            },
            delivery_date: parse_date("delivery date", &req.delivery_date)?,
            tests: req.tests,
            consumables: req
                .consumables
                .into_iter()
                .map(|c| billing::ConsumableSelection::new(c.code, c.quantity))
                .collect(),
            discount_amount: parse_money("discount amount", &req.discount_amount)?,
            amount_paid: parse_money("amount paid", &req.amount_paid)?,
        })
    }
}

/// FFI-safe line item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLineItem {
    /// "test" or "consumable"
    pub kind: String,
    pub code: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<LineItem> for FfiLineItem {
    fn from(item: LineItem) -> Self {
        Self {
            kind: item.kind.as_str().to_string(),
            line_total: item.line_total().to_string(),
            code: item.code,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
        }
    }
}

/// FFI-safe invoice with line items.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInvoiceDetail {
    pub invoice_id: String,
    pub invoice_no: String,
    pub patient_name: String,
    pub patient_age: String,
    pub patient_gender: String,
    pub contact_no: String,
    pub referred_by: String,
    pub delivery_date: String,
    pub total_amount: String,
    pub discount_amount: String,
    pub amount_paid: String,
    pub due: String,
    pub created_by: String,
    pub created_at: String,
    pub line_items: Vec<FfiLineItem>,
}

impl From<InvoiceDetail> for FfiInvoiceDetail {
    fn from(detail: InvoiceDetail) -> Self {
        let invoice = detail.invoice;
        Self {
            invoice_id: invoice.invoice_id,
            invoice_no: invoice.invoice_no,
            patient_name: invoice.patient.name,
            patient_age: invoice.patient.age,
            patient_gender: invoice.patient.gender,
            contact_no: invoice.patient.contact_no,
            referred_by: invoice.patient.referred_by,
            delivery_date: invoice.delivery_date.format("%Y-%m-%d").to_string(),
            total_amount: invoice.total_amount.to_string(),
            discount_amount: invoice.discount_amount.to_string(),
            amount_paid: invoice.amount_paid.to_string(),
            due: invoice.due.to_string(),
            created_by: invoice.created_by,
            created_at: invoice.created_at,
            line_items: detail.line_items.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe payment receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPaymentReceipt {
    pub invoice_id: String,
    pub invoice_no: String,
    pub amount: String,
    pub amount_paid: String,
    pub due: String,
    pub received_by: String,
    pub received_at: String,
}

impl From<billing::PaymentReceipt> for FfiPaymentReceipt {
    fn from(receipt: billing::PaymentReceipt) -> Self {
        Self {
            invoice_id: receipt.invoice_id,
            invoice_no: receipt.invoice_no,
            amount: receipt.amount.to_string(),
            amount_paid: receipt.amount_paid.to_string(),
            due: receipt.due.to_string(),
            received_by: receipt.received_by,
            received_at: receipt.received_at,
        }
    }
}

/// FFI-safe submitted result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResultInput {
    pub parameter_id: String,
    pub value: String,
    pub remark: Option<String>,
}

/// FFI-safe report row: a parameter and its result, if any.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportRow {
    pub parameter_id: String,
    pub parameter_name: String,
    /// Unit and range as recorded with the result, else the current definition
    pub unit: Option<String>,
    pub normal_range: Option<String>,
    pub value: Option<String>,
    pub remark: Option<String>,
}

impl From<models::ReportRow> for FfiReportRow {
    fn from(row: models::ReportRow) -> Self {
        match row.result {
            Some(result) => Self {
                parameter_id: result.parameter_id,
                parameter_name: result.parameter_name,
                unit: result.unit,
                normal_range: result.normal_range,
                value: Some(result.value),
                remark: result.remark,
            },
            None => Self {
                parameter_id: row.parameter.parameter_id,
                parameter_name: row.parameter.name,
                unit: row.parameter.unit,
                normal_range: row.parameter.normal_range,
                value: None,
                remark: None,
            },
        }
    }
}

/// FFI-safe report header.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportSummary {
    pub report_id: String,
    pub invoice_id: String,
    pub test_code: String,
    pub test_name: String,
    pub doctor_id: Option<String>,
    pub report_date: String,
    /// "pending" or "completed"
    pub status: String,
    pub created_by: String,
    pub updated_at: String,
}

impl From<Report> for FfiReportSummary {
    fn from(report: Report) -> Self {
        Self {
            report_id: report.report_id,
            invoice_id: report.invoice_id,
            test_code: report.test_code,
            test_name: report.test_name,
            doctor_id: report.doctor_id,
            report_date: report.report_date.format("%Y-%m-%d").to_string(),
            status: report.status.as_str().to_string(),
            created_by: report.created_by,
            updated_at: report.updated_at,
        }
    }
}

/// FFI-safe report with patient header and rows.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportDetail {
    pub report: FfiReportSummary,
    pub invoice_no: String,
    pub patient_name: String,
    pub patient_age: String,
    pub patient_gender: String,
    pub referred_by: String,
    pub doctor: Option<FfiDoctor>,
    pub rows: Vec<FfiReportRow>,
}

impl From<ReportDetail> for FfiReportDetail {
    fn from(detail: ReportDetail) -> Self {
        Self {
            report: detail.report.into(),
            invoice_no: detail.invoice_no,
            patient_name: detail.patient.name,
            patient_age: detail.patient.age,
            patient_gender: detail.patient.gender,
            referred_by: detail.patient.referred_by,
            doctor: detail.doctor.map(Into::into),
            rows: detail.rows.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe pending test.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPendingTest {
    pub invoice_id: String,
    pub invoice_no: String,
    pub patient_name: String,
    pub test_code: String,
    pub test_name: String,
    pub invoice_created_at: String,
}

impl From<models::PendingTest> for FfiPendingTest {
    fn from(pending: models::PendingTest) -> Self {
        Self {
            invoice_id: pending.invoice_id,
            invoice_no: pending.invoice_no,
            patient_name: pending.patient_name,
            test_code: pending.test_code,
            test_name: pending.test_name,
            invoice_created_at: pending.invoice_created_at,
        }
    }
}

/// FFI-safe doctor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctor {
    pub doctor_id: String,
    pub name: String,
    pub qualifications: String,
    pub designation: String,
    pub workplace: String,
}

impl From<models::Doctor> for FfiDoctor {
    fn from(doctor: models::Doctor) -> Self {
        Self {
            doctor_id: doctor.doctor_id,
            name: doctor.name,
            qualifications: doctor.qualifications,
            designation: doctor.designation,
            workplace: doctor.workplace,
        }
    }
}

/// FFI-safe doctor statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctorStatistics {
    pub total_reports: u32,
    pub completed_reports: u32,
    pub pending_reports: u32,
    pub first_report_date: Option<String>,
    pub last_report_date: Option<String>,
}

impl From<models::DoctorStatistics> for FfiDoctorStatistics {
    fn from(stats: models::DoctorStatistics) -> Self {
        Self {
            total_reports: stats.total_reports,
            completed_reports: stats.completed_reports,
            pending_reports: stats.pending_reports,
            first_report_date: stats.first_report_date.map(|d| d.format("%Y-%m-%d").to_string()),
            last_report_date: stats.last_report_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> FfiActor {
        FfiActor {
            user_id: "u-0".into(),
            username: "admin".into(),
            role: "admin".into(),
        }
    }

    fn staff() -> FfiActor {
        FfiActor {
            user_id: "u-1".into(),
            username: "reception".into(),
            role: "staff".into(),
        }
    }

    fn seeded() -> Arc<DiagLabCore> {
        let core = open_database_in_memory().unwrap();
        core.upsert_lab_test(
            admin(),
            FfiLabTest {
                code: "CBC".into(),
                name: "Complete Blood Count".into(),
                category: "Hematology".into(),
                price: "500".into(),
                description: None,
            },
        )
        .unwrap();
        core.upsert_parameter(
            admin(),
            FfiParameter {
                parameter_id: String::new(),
                test_code: "CBC".into(),
                name: "Hemoglobin".into(),
                unit: Some("g/dL".into()),
                normal_range: Some("12 - 16".into()),
                sort_order: 1,
            },
        )
        .unwrap();
        core
    }

    fn request() -> FfiInvoiceRequest {
        FfiInvoiceRequest {
            patient_name: "Mina".into(),
            patient_age: "24".into(),
            patient_gender: "Female".into(),
            contact_no: "017".into(),
            referred_by: "Self".into(),
            delivery_date: "2024-06-02".into(),
            tests: vec!["CBC".into()],
            consumables: vec![],
            discount_amount: "".into(),
            amount_paid: "100".into(),
        }
    }

    #[test]
    fn test_billing_round() {
        let core = seeded();
        let invoice = core.create_invoice(staff(), request()).unwrap();
        assert_eq!(invoice.invoice_no, "NPL00000001");
        assert_eq!(invoice.due, "400");

        let receipt = core
            .receive_payment(staff(), invoice.invoice_id.clone(), "400".into())
            .unwrap();
        assert_eq!(receipt.due, "0");

        let reloaded = core.get_invoice(invoice.invoice_id.clone()).unwrap();
        assert_eq!(reloaded.amount_paid, "500");
        assert_eq!(
            core.find_invoice_by_number("NPL00000001".into())
                .unwrap()
                .unwrap()
                .invoice_id,
            invoice.invoice_id
        );
    }

    #[test]
    fn test_admin_only_operations() {
        let core = seeded();
        let invoice = core.create_invoice(staff(), request()).unwrap();

        let err = core.delete_invoice(staff(), invoice.invoice_id.clone()).unwrap_err();
        assert!(matches!(err, DiagLabError::PermissionDenied(_)));
        let err = core
            .add_doctor(staff(), "Rahman".into(), "".into(), "".into(), "".into())
            .unwrap_err();
        assert!(matches!(err, DiagLabError::PermissionDenied(_)));

        core.delete_invoice(admin(), invoice.invoice_id.clone()).unwrap();
        assert!(matches!(
            core.get_invoice(invoice.invoice_id).unwrap_err(),
            DiagLabError::NotFound(_)
        ));
    }

    #[test]
    fn test_bad_inputs_are_validation_errors() {
        let core = seeded();

        let mut bad_date = request();
        bad_date.delivery_date = "02/06/2024".into();
        assert!(matches!(
            core.create_invoice(staff(), bad_date).unwrap_err(),
            DiagLabError::Validation(_)
        ));

        let invoice = core.create_invoice(staff(), request()).unwrap();
        assert!(matches!(
            core.receive_payment(staff(), invoice.invoice_id, "ten".into()).unwrap_err(),
            DiagLabError::Validation(_)
        ));

        let mut unknown_role = staff();
        unknown_role.role = "guest".into();
        assert!(matches!(
            core.create_invoice(unknown_role, request()).unwrap_err(),
            DiagLabError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_report_through_facade() {
        let core = seeded();
        let invoice = core.create_invoice(staff(), request()).unwrap();
        assert_eq!(
            core.untested_codes_for_invoice(invoice.invoice_id.clone()).unwrap(),
            vec!["CBC".to_string()]
        );

        let hb = core.list_parameters("CBC".into()).unwrap().remove(0);
        let detail = core
            .create_report(
                staff(),
                invoice.invoice_id.clone(),
                "CBC".into(),
                Some("  ".into()),
                vec![FfiResultInput {
                    parameter_id: hb.parameter_id,
                    value: "13.1".into(),
                    remark: None,
                }],
            )
            .unwrap();
        assert_eq!(detail.report.status, "completed");
        assert_eq!(detail.rows[0].value.as_deref(), Some("13.1"));
        assert!(core.pending_tests().unwrap().is_empty());
        assert_eq!(core.list_reports_for_invoice(invoice.invoice_id).unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_parameter_rejected() {
        let core = seeded();
        let invoice = core.create_invoice(staff(), request()).unwrap();
        let hb = core.list_parameters("CBC".into()).unwrap().remove(0);

        let err = core
            .create_report(
                staff(),
                invoice.invoice_id.clone(),
                "CBC".into(),
                None,
                vec![
                    FfiResultInput {
                        parameter_id: hb.parameter_id.clone(),
                        value: "13.1".into(),
                        remark: None,
                    },
                    FfiResultInput {
                        parameter_id: hb.parameter_id,
                        value: "".into(),
                        remark: None,
                    },
                ],
            )
            .unwrap_err();
        assert!(matches!(err, DiagLabError::Validation(_)));
        assert!(core.list_reports_for_invoice(invoice.invoice_id).unwrap().is_empty());
    }

    #[test]
    fn test_invoice_copy_export() {
        let core = seeded();
        let invoice = core.create_invoice(staff(), request()).unwrap();

        let csv = core
            .export_invoice_csv(invoice.invoice_id.clone(), "lab".into())
            .unwrap();
        assert!(csv.contains("Lab Copy"));
        assert!(matches!(
            core.export_invoice_json(invoice.invoice_id, "office".into()).unwrap_err(),
            DiagLabError::Validation(_)
        ));
    }
}
