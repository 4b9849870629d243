//! Invoice creation.
//!
//! A request is checked on its own first, then priced against the current
//! catalog and written (invoice header, every line item, counter advance) in
//! one transaction.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::InvoiceNumbering;
use crate::config::LabConfig;
use crate::db::Database;
use crate::error::{LabError, LabResult};
use crate::models::{
    compute_due, Actor, Invoice, InvoiceDetail, LineItem, LineItemKind, Money, PatientDetails,
};

/// Default cap on tests plus consumables per invoice.
pub const DEFAULT_MAX_LINE_ITEMS: usize = 15;

/// Largest quantity of one consumable on an invoice.
pub const MAX_CONSUMABLE_QUANTITY: u32 = 1000;

/// A consumable picked for an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumableSelection {
    pub code: String,
    pub quantity: u32,
}

impl ConsumableSelection {
    pub fn new(code: impl Into<String>, quantity: u32) -> Self {
        Self {
            code: code.into(),
            quantity,
        }
    }
}

/// Everything the front desk submits to bill a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceRequest {
    pub patient: PatientDetails,
    pub delivery_date: NaiveDate,
    /// Selected test codes
    pub tests: Vec<String>,
    pub consumables: Vec<ConsumableSelection>,
    pub discount_amount: Money,
    /// Paid at the counter when the invoice is issued
    pub amount_paid: Money,
}

impl InvoiceRequest {
    fn item_count(&self) -> usize {
        self.tests.len() + self.consumables.len()
    }

    /// Checks that need no catalog access.
    fn validate(&self, max_line_items: usize) -> LabResult<()> {
        if let Some(field) = self.patient.first_missing_field() {
            return Err(LabError::validation(format!("{} is required", field)));
        }
        if self.item_count() == 0 {
            return Err(LabError::validation(
                "select at least one test or consumable",
            ));
        }
        if self.item_count() > max_line_items {
            return Err(LabError::validation(format!(
                "at most {} tests and consumables per invoice, got {}",
                max_line_items,
                self.item_count()
            )));
        }

        let mut seen = HashSet::new();
        for code in &self.tests {
            if code.trim().is_empty() {
                return Err(LabError::validation("test code must not be blank"));
            }
            if !seen.insert(code.trim()) {
                return Err(LabError::validation(format!("test {} selected twice", code)));
            }
        }

        let mut seen = HashSet::new();
        for selection in &self.consumables {
            if selection.quantity < 1 || selection.quantity > MAX_CONSUMABLE_QUANTITY {
                return Err(LabError::validation(format!(
                    "quantity for consumable {} must be between 1 and {}",
                    selection.code, MAX_CONSUMABLE_QUANTITY
                )));
            }
            if !seen.insert(selection.code.trim()) {
                return Err(LabError::validation(format!(
                    "consumable {} selected twice",
                    selection.code
                )));
            }
        }

        if self.discount_amount < Money::ZERO {
            return Err(LabError::validation("discount amount must not be negative"));
        }
        if self.amount_paid < Money::ZERO {
            return Err(LabError::validation("amount paid must not be negative"));
        }
        Ok(())
    }
}

/// Money figures of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub total: Money,
    pub discount: Money,
    pub paid: Money,
    pub net: Money,
    pub due: Money,
}

impl InvoiceTotals {
    /// Totals of the priced line items, checked against creation-time bounds:
    /// every amount fits in `Money`, the discount fits in the total and
    /// nothing is overpaid.
    pub fn compute(line_items: &[LineItem], discount: Money, paid: Money) -> LabResult<Self> {
        let total = line_items
            .iter()
            .try_fold(Money::ZERO, |sum, item| {
                item.checked_line_total()
                    .and_then(|line_total| sum.checked_add(line_total))
            })
            .ok_or_else(|| LabError::validation("invoice amount out of range"))?;

        if discount > total {
            return Err(LabError::validation(format!(
                "discount {} exceeds total {}",
                discount, total
            )));
        }
        let net = total - discount;
        if paid > net {
            return Err(LabError::validation(format!(
                "amount paid {} exceeds net amount {}",
                paid, net
            )));
        }

        Ok(Self {
            total,
            discount,
            paid,
            net,
            due: compute_due(total, discount, paid),
        })
    }
}

/// Prices billing requests and writes invoices.
pub struct InvoiceBuilder<'a> {
    db: &'a Database,
    numbering: InvoiceNumbering,
    max_line_items: usize,
}

impl<'a> InvoiceBuilder<'a> {
    pub fn new(db: &'a Database, numbering: InvoiceNumbering) -> Self {
        Self {
            db,
            numbering,
            max_line_items: DEFAULT_MAX_LINE_ITEMS,
        }
    }

    pub fn from_config(db: &'a Database, config: &LabConfig) -> Self {
        Self::new(db, InvoiceNumbering::new(config.invoice_prefix.clone()))
            .with_max_line_items(config.max_line_items)
    }

    pub fn with_max_line_items(mut self, max_line_items: usize) -> Self {
        self.max_line_items = max_line_items;
        self
    }

    /// Create an invoice with its line items.
    ///
    /// Unknown codes, an oversized discount and overpayment are rejected
    /// before anything is written. Either the invoice and all of its line
    /// items exist afterwards, or nothing does.
    #[instrument(skip(self, actor, request), fields(actor = %actor.username))]
    pub fn create(&self, actor: &Actor, request: &InvoiceRequest) -> LabResult<InvoiceDetail> {
        let result = self.create_inner(actor, request);
        match &result {
            Ok(detail) => info!(
                invoice_id = %detail.invoice.invoice_id,
                invoice_no = %detail.invoice.invoice_no,
                total = %detail.invoice.total_amount,
                due = %detail.invoice.due,
                "invoice created"
            ),
            Err(e) => warn!(error = %e, "invoice rejected"),
        }
        result
    }

    fn create_inner(&self, actor: &Actor, request: &InvoiceRequest) -> LabResult<InvoiceDetail> {
        request.validate(self.max_line_items)?;
        let patient = request.patient.trimmed();

        self.db.run_in_transaction(|db| {
            let invoice_id = uuid::Uuid::new_v4().to_string();
            let line_items = price_line_items(db, &invoice_id, request)?;

            let totals =
                InvoiceTotals::compute(&line_items, request.discount_amount, request.amount_paid)?;

            let (sequence, invoice_no) = self.numbering.issue(db)?;
            let invoice = Invoice {
                invoice_id,
                invoice_no,
                sequence,
                patient,
                delivery_date: request.delivery_date,
                total_amount: totals.total,
                discount_amount: totals.discount,
                amount_paid: totals.paid,
                due: totals.due,
                created_by: actor.username.clone(),
                created_at: chrono::Utc::now().to_rfc3339(),
            };

            db.insert_invoice(&invoice)?;
            for item in &line_items {
                db.insert_line_item(item)?;
            }

            Ok(InvoiceDetail {
                invoice,
                line_items,
            })
        })
    }
}

/// Snapshot current catalog prices into line items. Tests first, in request order.
fn price_line_items(
    db: &Database,
    invoice_id: &str,
    request: &InvoiceRequest,
) -> LabResult<Vec<LineItem>> {
    let mut line_items = Vec::with_capacity(request.item_count());

    for code in &request.tests {
        let code = code.trim();
        let test = db
            .get_lab_test(code)?
            .ok_or_else(|| LabError::validation(format!("unknown test code {}", code)))?;
        line_items.push(LineItem {
            invoice_id: invoice_id.to_string(),
            kind: LineItemKind::Test,
            code: test.code,
            name: test.name,
            quantity: 1,
            unit_price: test.price,
        });
    }

    for selection in &request.consumables {
        let code = selection.code.trim();
        let consumable = db
            .get_consumable(code)?
            .ok_or_else(|| LabError::validation(format!("unknown consumable code {}", code)))?;
        line_items.push(LineItem {
            invoice_id: invoice_id.to_string(),
            kind: LineItemKind::Consumable,
            code: consumable.code,
            name: consumable.name,
            quantity: selection.quantity,
            unit_price: consumable.price,
        });
    }

    Ok(line_items)
}
