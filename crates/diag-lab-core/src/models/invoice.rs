//! Invoice and line item models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Money;

/// Patient demographics captured on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientDetails {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub contact_no: String,
    /// Free-text referral source as written on the request slip.
    /// Not a doctor reference; reports carry their own `doctor_id`.
    pub referred_by: String,
}

impl PatientDetails {
    /// Name of the first required field that is blank, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        [
            ("patient name", &self.name),
            ("patient age", &self.age),
            ("patient gender", &self.gender),
            ("patient contact number", &self.contact_no),
            ("referred by", &self.referred_by),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    /// Copy with surrounding whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            age: self.age.trim().to_string(),
            gender: self.gender.trim().to_string(),
            contact_no: self.contact_no.trim().to_string(),
            referred_by: self.referred_by.trim().to_string(),
        }
    }
}

/// Whether a line item bills a test or a consumable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LineItemKind {
    Test,
    Consumable,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemKind::Test => "test",
            LineItemKind::Consumable => "consumable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "test" => Some(LineItemKind::Test),
            "consumable" => Some(LineItemKind::Consumable),
            _ => None,
        }
    }
}

/// A priced entry on an invoice. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub invoice_id: String,
    pub kind: LineItemKind,
    /// Test or consumable code
    pub code: String,
    /// Catalog display name at invoice time
    pub name: String,
    /// Always 1 for tests
    pub quantity: u32,
    /// Catalog price at invoice time; never re-read afterwards
    pub unit_price: Money,
}

impl LineItem {
    /// `unit_price × quantity`, or `None` if it does not fit in `Money`.
    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(Money::from(self.quantity))
    }

    /// Stored line items were bounded at creation, so this never saturates for them.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(Money::from(self.quantity))
    }
}

/// A billing record for one patient visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    /// Unique invoice ID
    pub invoice_id: String,
    /// Human-readable number (e.g., "NPL00000001")
    pub invoice_no: String,
    /// Raw counter value behind `invoice_no`
    pub sequence: u64,
    pub patient: PatientDetails,
    pub delivery_date: NaiveDate,
    pub total_amount: Money,
    pub discount_amount: Money,
    pub amount_paid: Money,
    pub due: Money,
    /// Username of the actor who issued the invoice
    pub created_by: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl Invoice {
    /// Total after discount.
    pub fn net_amount(&self) -> Money {
        self.total_amount - self.discount_amount
    }

    pub fn is_settled(&self) -> bool {
        self.due <= Money::ZERO
    }

    /// Check the stored `due` against the amounts it derives from.
    pub fn is_balanced(&self) -> bool {
        self.due == compute_due(self.total_amount, self.discount_amount, self.amount_paid)
    }
}

/// `max(0, total - discount - paid)`.
pub fn compute_due(total: Money, discount: Money, paid: Money) -> Money {
    (total - discount - paid).max(Money::ZERO)
}

/// Which printed copy an invoice is rendered for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CopyVariant {
    Customer,
    Lab,
}

impl CopyVariant {
    pub fn label(&self) -> &'static str {
        match self {
            CopyVariant::Customer => "Customer Copy",
            CopyVariant::Lab => "Lab Copy",
        }
    }
}

/// Invoice read model with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub line_items: Vec<LineItem>,
}

impl InvoiceDetail {
    pub fn tests(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items
            .iter()
            .filter(|item| item.kind == LineItemKind::Test)
    }

    pub fn consumables(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items
            .iter()
            .filter(|item| item.kind == LineItemKind::Consumable)
    }

    /// Sum of line totals; equals `invoice.total_amount` for a consistent invoice.
    pub fn line_items_total(&self) -> Money {
        self.line_items
            .iter()
            .map(LineItem::line_total)
            .fold(Money::ZERO, |sum, line_total| sum.saturating_add(line_total))
    }
}
