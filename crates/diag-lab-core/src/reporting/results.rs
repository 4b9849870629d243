//! Result entry: turning submitted values into result rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LabError, LabResult};
use crate::models::{Parameter, ReportResult};

/// Value submitted for one parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultInput {
    pub value: String,
    pub remark: Option<String>,
}

impl ResultInput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            remark: None,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn is_filled(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

impl From<&str> for ResultInput {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResultInput {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Submitted values keyed by parameter ID.
pub type ResultSet = BTreeMap<String, ResultInput>;

/// Build result rows for a report.
///
/// One row per parameter with a non-blank value, carrying the parameter's
/// current name, unit and normal range. Blank or missing values produce no
/// row. Keys that are not parameters of the test are rejected.
pub fn build_results(
    report_id: &str,
    parameters: &[Parameter],
    inputs: &ResultSet,
) -> LabResult<Vec<ReportResult>> {
    if let Some(stray) = inputs
        .keys()
        .find(|id| !parameters.iter().any(|p| &p.parameter_id == *id))
    {
        return Err(LabError::validation(format!(
            "parameter {} does not belong to this test",
            stray
        )));
    }

    Ok(parameters
        .iter()
        .filter_map(|param| {
            let input = inputs.get(&param.parameter_id)?;
            if !input.is_filled() {
                return None;
            }
            Some(ReportResult {
                report_id: report_id.to_string(),
                parameter_id: param.parameter_id.clone(),
                parameter_name: param.name.clone(),
                value: input.value.trim().to_string(),
                unit: param.unit.clone(),
                normal_range: param.normal_range.clone(),
                remark: input
                    .remark
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from),
            })
        })
        .collect())
}
