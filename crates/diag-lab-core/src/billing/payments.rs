//! Payments against issued invoices.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::db::Database;
use crate::error::{LabError, LabResult};
use crate::models::{compute_due, Actor, Money};

/// Outcome of an accepted payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt {
    pub invoice_id: String,
    pub invoice_no: String,
    pub amount: Money,
    pub amount_paid: Money,
    pub due: Money,
    pub received_by: String,
    pub received_at: String,
}

/// Records payments. The only writer of `amount_paid` and `due` after creation.
pub struct PaymentLedger<'a> {
    db: &'a Database,
}

impl<'a> PaymentLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Apply a payment of `amount` to an invoice.
    ///
    /// The invoice is re-read under the writer lock, so two payments on the
    /// same invoice never both see the same `due`.
    #[instrument(skip(self, actor), fields(actor = %actor.username))]
    pub fn receive_payment(
        &self,
        actor: &Actor,
        invoice_id: &str,
        amount: Money,
    ) -> LabResult<PaymentReceipt> {
        let result = self.db.run_in_transaction(|db| {
            let invoice = db
                .get_invoice(invoice_id)?
                .ok_or_else(|| LabError::not_found("invoice", invoice_id))?;

            if amount <= Money::ZERO {
                return Err(LabError::validation("payment amount must be positive"));
            }
            if amount > invoice.due {
                return Err(LabError::validation(format!(
                    "payment {} exceeds due {} on {}",
                    amount, invoice.due, invoice.invoice_no
                )));
            }

            let amount_paid = invoice.amount_paid + amount;
            let due = compute_due(invoice.total_amount, invoice.discount_amount, amount_paid);
            db.update_invoice_payment(invoice_id, amount_paid, due)?;

            Ok(PaymentReceipt {
                invoice_id: invoice.invoice_id,
                invoice_no: invoice.invoice_no,
                amount,
                amount_paid,
                due,
                received_by: actor.username.clone(),
                received_at: chrono::Utc::now().to_rfc3339(),
            })
        });

        match &result {
            Ok(receipt) => info!(
                invoice_no = %receipt.invoice_no,
                due = %receipt.due,
                "payment received"
            ),
            Err(e) => warn!(error = %e, "payment rejected"),
        }
        result
    }
}
