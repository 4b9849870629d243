//! Referring doctor directory models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const TITLE: &str = "Dr. ";

/// A doctor who can be attached to reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub doctor_id: String,
    /// Display name, always carrying the "Dr. " title
    pub name: String,
    pub qualifications: String,
    pub designation: String,
    pub workplace: String,
}

impl Doctor {
    /// Create a new doctor; the name is trimmed and titled.
    pub fn new(name: &str, qualifications: &str, designation: &str, workplace: &str) -> Self {
        Self {
            doctor_id: uuid::Uuid::new_v4().to_string(),
            name: titled_name(name),
            qualifications: qualifications.trim().to_string(),
            designation: designation.trim().to_string(),
            workplace: workplace.trim().to_string(),
        }
    }
}

/// A doctor's name without surrounding whitespace or a leading "Dr" title.
pub fn bare_doctor_name(name: &str) -> &str {
    let name = name.trim();
    if name == "Dr" {
        return "";
    }
    name.strip_prefix(TITLE)
        .or_else(|| name.strip_prefix("Dr "))
        .or_else(|| name.strip_prefix("Dr."))
        .unwrap_or(name)
        .trim()
}

fn titled_name(name: &str) -> String {
    format!("{}{}", TITLE, bare_doctor_name(name))
}

/// Report counts for one doctor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DoctorStatistics {
    pub total_reports: u32,
    pub completed_reports: u32,
    pub pending_reports: u32,
    pub first_report_date: Option<NaiveDate>,
    pub last_report_date: Option<NaiveDate>,
}
