//! Printable invoice export (customer and lab copies).

use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::models::{CopyVariant, InvoiceDetail, LineItemKind, Money};

/// One invoice rendered for a given copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceExport {
    pub header: InvoiceHeader,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// "Customer Copy" or "Lab Copy"
    pub copy: String,
    pub invoice_no: String,
    pub patient_name: String,
    pub patient_age: String,
    pub patient_gender: String,
    pub contact_no: String,
    pub referred_by: String,
    pub delivery_date: String,
    pub total_amount: Money,
    pub discount_amount: Money,
    pub net_amount: Money,
    pub amount_paid: Money,
    pub due: Money,
    pub issued_by: String,
    pub issued_at: String,
    pub exported_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub kind: LineItemKind,
    pub code: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl InvoiceExport {
    pub fn from_detail(detail: &InvoiceDetail, copy: CopyVariant) -> Self {
        let invoice = &detail.invoice;
        let lines = detail
            .line_items
            .iter()
            .map(|item| InvoiceLine {
                kind: item.kind,
                code: item.code.clone(),
                description: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
            })
            .collect();

        Self {
            header: InvoiceHeader {
                copy: copy.label().to_string(),
                invoice_no: invoice.invoice_no.clone(),
                patient_name: invoice.patient.name.clone(),
                patient_age: invoice.patient.age.clone(),
                patient_gender: invoice.patient.gender.clone(),
                contact_no: invoice.patient.contact_no.clone(),
                referred_by: invoice.patient.referred_by.clone(),
                delivery_date: invoice.delivery_date.format("%Y-%m-%d").to_string(),
                total_amount: invoice.total_amount,
                discount_amount: invoice.discount_amount,
                net_amount: invoice.net_amount(),
                amount_paid: invoice.amount_paid,
                due: invoice.due,
                issued_by: invoice.created_by.clone(),
                issued_at: invoice.created_at.clone(),
                exported_at: chrono::Utc::now().to_rfc3339(),
            },
            lines,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format, one row per line item.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("copy,invoice_no,patient_name,kind,code,description,quantity,unit_price,line_total,total_amount,discount_amount,amount_paid,due\n");

        for line in &self.lines {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&self.header.copy),
                escape_csv(&self.header.invoice_no),
                escape_csv(&self.header.patient_name),
                line.kind.as_str(),
                escape_csv(&line.code),
                escape_csv(&line.description),
                line.quantity,
                line.unit_price,
                line.line_total,
                self.header.total_amount,
                self.header.discount_amount,
                self.header.amount_paid,
                self.header.due,
            ));
        }

        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invoice, LineItem, PatientDetails};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn detail() -> InvoiceDetail {
        InvoiceDetail {
            invoice: Invoice {
                invoice_id: "inv-1".into(),
                invoice_no: "NPL00000007".into(),
                sequence: 7,
                patient: PatientDetails {
                    name: "Hasan, Mahmud".into(),
                    age: "35".into(),
                    gender: "Male".into(),
                    contact_no: "016".into(),
                    referred_by: "Self".into(),
                },
                delivery_date: NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
                total_amount: dec!(530),
                discount_amount: dec!(30),
                amount_paid: dec!(200),
                due: dec!(300),
                created_by: "reception".into(),
                created_at: "2024-06-04T09:00:00+00:00".into(),
            },
            line_items: vec![
                LineItem {
                    invoice_id: "inv-1".into(),
                    kind: LineItemKind::Test,
                    code: "CBC".into(),
                    name: "Complete Blood Count".into(),
                    quantity: 1,
                    unit_price: dec!(500),
                },
                LineItem {
                    invoice_id: "inv-1".into(),
                    kind: LineItemKind::Consumable,
                    code: "SYR5".into(),
                    name: "Syringe 5ml".into(),
                    quantity: 2,
                    unit_price: dec!(15),
                },
            ],
        }
    }

    #[test]
    fn test_copy_label_and_net() {
        let export = InvoiceExport::from_detail(&detail(), CopyVariant::Lab);
        assert_eq!(export.header.copy, "Lab Copy");
        assert_eq!(export.header.net_amount, dec!(500));
        assert_eq!(export.lines[1].line_total, dec!(30));
    }

    #[test]
    fn test_csv_export() {
        let export = InvoiceExport::from_detail(&detail(), CopyVariant::Customer);
        let csv = export.to_csv();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("copy,invoice_no"));
        assert!(lines[1].starts_with("Customer Copy,NPL00000007,\"Hasan, Mahmud\",test,CBC"));
        assert!(lines[2].contains("consumable,SYR5,Syringe 5ml,2,15,30"));
    }

    #[test]
    fn test_json_export() {
        let export = InvoiceExport::from_detail(&detail(), CopyVariant::Customer);
        let json = export.to_json().unwrap();
        assert!(json.contains("\"invoice_no\": \"NPL00000007\""));
        assert!(json.contains("\"copy\": \"Customer Copy\""));
    }
}
