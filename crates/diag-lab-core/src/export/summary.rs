//! Financial summary over a creation-date range.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::Database;
use crate::error::{LabError, LabResult};
use crate::models::{LineItemKind, Money};

/// Number of entries kept in each usage ranking.
pub const TOP_USAGE_LIMIT: usize = 5;

/// Billing totals for invoices created within `[from, to]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub invoice_count: u32,
    /// Sum of invoice totals before discount
    pub revenue: Money,
    pub discount: Money,
    pub collected: Money,
    pub outstanding: Money,
    pub top_tests: Vec<UsageLine>,
    pub top_consumables: Vec<UsageLine>,
    pub generated_at: String,
}

/// How often one item was billed and what it brought in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageLine {
    pub code: String,
    pub name: String,
    /// Tests: invoices billing it. Consumables: total quantity.
    pub usage: u32,
    /// From the prices frozen on the line items
    pub revenue: Money,
}

impl FinancialSummary {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV: a totals block followed by the two rankings.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("from,to,invoice_count,revenue,discount,collected,outstanding\n");
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            self.from, self.to, self.invoice_count, self.revenue, self.discount, self.collected,
            self.outstanding,
        ));

        csv.push_str("\nkind,code,name,usage,revenue\n");
        let ranked = self
            .top_tests
            .iter()
            .map(|line| (LineItemKind::Test, line))
            .chain(
                self.top_consumables
                    .iter()
                    .map(|line| (LineItemKind::Consumable, line)),
            );
        for (kind, line) in ranked {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                kind.as_str(),
                escape_csv(&line.code),
                escape_csv(&line.name),
                line.usage,
                line.revenue,
            ));
        }

        csv
    }
}

/// Builds financial summaries from stored invoices.
pub struct SummaryExporter<'a> {
    db: &'a Database,
}

impl<'a> SummaryExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Summarize invoices created on dates within `[from, to]` (UTC).
    pub fn summarize(&self, from: NaiveDate, to: NaiveDate) -> LabResult<FinancialSummary> {
        if from > to {
            return Err(LabError::validation(format!(
                "summary range starts {} after it ends {}",
                from, to
            )));
        }

        let invoices = self.db.list_invoices_created_between(from, to)?;
        let items = self.db.list_line_items_created_between(from, to)?;

        let mut tests: HashMap<String, UsageLine> = HashMap::new();
        let mut consumables: HashMap<String, UsageLine> = HashMap::new();
        for dated in items {
            let item = dated.item;
            let bucket = match item.kind {
                LineItemKind::Test => &mut tests,
                LineItemKind::Consumable => &mut consumables,
            };
            let line_total = item.line_total();
            let entry = bucket.entry(item.code.clone()).or_insert_with(|| UsageLine {
                code: item.code,
                name: item.name,
                usage: 0,
                revenue: Money::ZERO,
            });
            entry.usage = entry.usage.saturating_add(item.quantity);
            entry.revenue = checked_sum([entry.revenue, line_total])?;
        }

        Ok(FinancialSummary {
            from,
            to,
            invoice_count: invoices.len() as u32,
            revenue: checked_sum(invoices.iter().map(|i| i.total_amount))?,
            discount: checked_sum(invoices.iter().map(|i| i.discount_amount))?,
            collected: checked_sum(invoices.iter().map(|i| i.amount_paid))?,
            outstanding: checked_sum(invoices.iter().map(|i| i.due))?,
            top_tests: top_usage(tests),
            top_consumables: top_usage(consumables),
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> LabResult<Money> {
    amounts
        .into_iter()
        .try_fold(Money::ZERO, Money::checked_add)
        .ok_or_else(|| LabError::validation("summary amount out of range"))
}

/// Highest usage first; ties by revenue, then code.
fn top_usage(lines: HashMap<String, UsageLine>) -> Vec<UsageLine> {
    let mut lines: Vec<UsageLine> = lines.into_values().collect();
    lines.sort_by(|a, b| {
        b.usage
            .cmp(&a.usage)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.code.cmp(&b.code))
    });
    lines.truncate(TOP_USAGE_LIMIT);
    lines
}
