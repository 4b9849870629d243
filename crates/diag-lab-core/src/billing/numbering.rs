//! Invoice number issuance.
//!
//! The raw counter lives in the `invoice_sequence` table and is advanced with
//! a single `UPDATE` inside the invoice-creation transaction. The display
//! number is derived from the counter value, never parsed back to pick the
//! next one.

use crate::db::Database;
use crate::error::{LabError, LabResult};

/// Prefix used when none is configured.
pub const DEFAULT_INVOICE_PREFIX: &str = "NPL";

/// Width of the zero-padded numeric part.
pub const INVOICE_DIGITS: usize = 8;

/// Formats and issues invoice numbers such as `NPL00000001`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumbering {
    prefix: String,
}

impl Default for InvoiceNumbering {
    fn default() -> Self {
        Self::new(DEFAULT_INVOICE_PREFIX)
    }
}

impl InvoiceNumbering {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Display form of a counter value.
    pub fn format(&self, sequence: u64) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = INVOICE_DIGITS)
    }

    /// Counter value behind a display number, if it carries this prefix.
    pub fn parse(&self, invoice_no: &str) -> Option<u64> {
        let digits = invoice_no.strip_prefix(&self.prefix)?;
        if digits.len() != INVOICE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Take the next number.
    ///
    /// Call from inside [`Database::run_in_transaction`]: the counter advance
    /// is only durable if the surrounding transaction commits.
    pub fn issue(&self, db: &Database) -> LabResult<(u64, String)> {
        let sequence = db.advance_invoice_sequence()?;
        if sequence >= 10u64.pow(INVOICE_DIGITS as u32) {
            return Err(LabError::Persistence(format!(
                "invoice counter exhausted at {}",
                sequence
            )));
        }
        Ok((sequence, self.format(sequence)))
    }
}
