//! Test and consumable catalog models.

use serde::{Deserialize, Serialize};

use super::Money;

/// A diagnostic test offered by the lab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabTest {
    /// Test code - unique key
    pub code: String,
    /// Display name
    pub name: String,
    /// Category (e.g., "Hematology", "Biochemistry")
    pub category: String,
    /// Current price
    pub price: Money,
    /// Optional free-text description
    pub description: Option<String>,
}

impl LabTest {
    /// Create a new test with required fields.
    pub fn new(code: String, name: String, category: String, price: Money) -> Self {
        Self {
            code,
            name,
            category,
            price,
            description: None,
        }
    }
}

/// A billable consumable (tubes, syringes, kits).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consumable {
    /// Consumable code - unique key
    pub code: String,
    /// Display name
    pub name: String,
    /// Current price per unit
    pub price: Money,
    /// Unit of sale (e.g., "pcs", "box")
    pub unit: Option<String>,
}

impl Consumable {
    pub fn new(code: String, name: String, price: Money) -> Self {
        Self {
            code,
            name,
            price,
            unit: None,
        }
    }
}

/// A measurable quantity a test reports on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    /// Unique parameter ID
    pub parameter_id: String,
    /// Owning test code
    pub test_code: String,
    /// Parameter name (e.g., "Hemoglobin")
    pub name: String,
    /// Measurement unit (e.g., "g/dL")
    pub unit: Option<String>,
    /// Reference interval (e.g., "13.5 - 17.5")
    pub normal_range: Option<String>,
    /// Display position within the test
    pub sort_order: u32,
}

impl Parameter {
    /// Create a new parameter for a test.
    pub fn new(test_code: String, name: String, sort_order: u32) -> Self {
        Self {
            parameter_id: uuid::Uuid::new_v4().to_string(),
            test_code,
            name,
            unit: None,
            normal_range: None,
            sort_order,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_normal_range(mut self, normal_range: &str) -> Self {
        self.normal_range = Some(normal_range.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_lab_test() {
        let test = LabTest::new("CBC".into(), "Complete Blood Count".into(), "Hematology".into(), dec!(500));
        assert_eq!(test.code, "CBC");
        assert_eq!(test.price, dec!(500));
        assert!(test.description.is_none());
    }

    #[test]
    fn test_parameter_builder() {
        let param = Parameter::new("CBC".into(), "Hemoglobin".into(), 1)
            .with_unit("g/dL")
            .with_normal_range("13.5 - 17.5");

        assert_eq!(param.test_code, "CBC");
        assert_eq!(param.unit.as_deref(), Some("g/dL"));
        assert_eq!(param.normal_range.as_deref(), Some("13.5 - 17.5"));
        assert_eq!(param.parameter_id.len(), 36); // UUID format
    }
}
