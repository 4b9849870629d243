//! Diagnostic report models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Doctor, Parameter, PatientDetails};

/// Completion state of a report, derived from its results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// At least one parameter has no value yet
    Pending,
    /// Every parameter of the test has a value
    Completed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Completed => "completed",
        }
    }

    /// Parse a stored status. Anything outside the two-state model is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReportStatus::Pending),
            "completed" => Some(ReportStatus::Completed),
            _ => None,
        }
    }

    /// Completed iff every parameter has a non-empty result.
    pub fn derive(parameters: &[Parameter], results: &[ReportResult]) -> Self {
        let all_filled = parameters.iter().all(|param| {
            results
                .iter()
                .any(|r| r.parameter_id == param.parameter_id && r.is_filled())
        });
        if all_filled {
            ReportStatus::Completed
        } else {
            ReportStatus::Pending
        }
    }
}

/// Result record for one test performed against one invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub report_id: String,
    pub invoice_id: String,
    pub test_code: String,
    /// Test name at report creation
    pub test_name: String,
    /// Optional referring doctor from the directory
    pub doctor_id: Option<String>,
    /// Set on creation and on every edit
    pub report_date: NaiveDate,
    pub status: ReportStatus,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One submitted parameter value with the parameter's definition at submission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportResult {
    pub report_id: String,
    pub parameter_id: String,
    pub parameter_name: String,
    pub value: String,
    pub unit: Option<String>,
    pub normal_range: Option<String>,
    pub remark: Option<String>,
}

impl ReportResult {
    pub fn is_filled(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// One display row: a parameter and its result, if entered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRow {
    pub parameter: Parameter,
    pub result: Option<ReportResult>,
}

/// Report read model for viewing and printing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDetail {
    pub report: Report,
    pub invoice_no: String,
    pub patient: PatientDetails,
    pub doctor: Option<Doctor>,
    /// Rows in parameter display order
    pub rows: Vec<ReportRow>,
}

impl ReportDetail {
    pub fn filled_count(&self) -> usize {
        self.rows.iter().filter(|row| row.result.is_some()).count()
    }
}

/// A billed test that has no report yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTest {
    pub invoice_id: String,
    pub invoice_no: String,
    pub patient_name: String,
    pub test_code: String,
    pub test_name: String,
    pub invoice_created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, order: u32) -> Parameter {
        Parameter::new("LFT".into(), name.into(), order)
    }

    fn result_for(param: &Parameter, value: &str) -> ReportResult {
        ReportResult {
            report_id: "r1".into(),
            parameter_id: param.parameter_id.clone(),
            parameter_name: param.name.clone(),
            value: value.into(),
            unit: None,
            normal_range: None,
            remark: None,
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ReportStatus::parse("pending"), Some(ReportStatus::Pending));
        assert_eq!(ReportStatus::parse("completed"), Some(ReportStatus::Completed));
        assert_eq!(ReportStatus::parse("verified"), None);
        assert_eq!(ReportStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_derive_status() {
        let params = vec![param("ALT", 1), param("AST", 2), param("ALP", 3)];

        let partial = vec![result_for(&params[0], "30"), result_for(&params[1], "25")];
        assert_eq!(ReportStatus::derive(&params, &partial), ReportStatus::Pending);

        let mut full = partial.clone();
        full.push(result_for(&params[2], "90"));
        assert_eq!(ReportStatus::derive(&params, &full), ReportStatus::Completed);
    }

    #[test]
    fn test_blank_result_does_not_count() {
        let params = vec![param("ALT", 1)];
        let results = vec![result_for(&params[0], "  ")];
        assert_eq!(ReportStatus::derive(&params, &results), ReportStatus::Pending);
    }

    #[test]
    fn test_no_parameters_is_completed() {
        assert_eq!(ReportStatus::derive(&[], &[]), ReportStatus::Completed);
    }
}
