// models/src/medical/lab_order.rs
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::errors::ValidationError;

/// Price given to a catalog entry created on first order.
pub const DEFAULT_LAB_TEST_PRICE: Decimal = Decimal::from_parts(2000, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestCatalogEntry {
    pub id: i64,
    pub test_name: String,
    pub test_code: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub description: Option<String>,
    pub normal_range: Option<String>,
    pub sample_type: Option<String>,
}

impl LabTestCatalogEntry {
    pub fn named(id: i64, test_name: &str, price: Decimal) -> Self {
        LabTestCatalogEntry {
            id,
            test_name: test_name.to_string(),
            test_code: None,
            category: None,
            price,
            description: None,
            normal_range: None,
            sample_type: None,
        }
    }

    /// What ordering this test adds to a bill; a zero price counts as unset.
    pub fn charge(&self) -> Decimal {
        if self.price > Decimal::ZERO {
            self.price
        } else {
            DEFAULT_LAB_TEST_PRICE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabTestStatus {
    #[serde(rename = "ordered")]
    Ordered,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl LabTestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabTestStatus::Ordered => "ordered",
            LabTestStatus::InProgress => "in-progress",
            LabTestStatus::Completed => "completed",
            LabTestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LabTestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabTestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered" => Ok(LabTestStatus::Ordered),
            "in-progress" => Ok(LabTestStatus::InProgress),
            "completed" => Ok(LabTestStatus::Completed),
            "cancelled" => Ok(LabTestStatus::Cancelled),
            other => Err(ValidationError::InvalidEnumValue {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A doctor-ordered lab test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTest {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub lab_test_catalog_id: i64,
    pub test_date: NaiveDate,
    pub result_url: Option<String>,
    pub result_data: Option<Value>,
    pub status: LabTestStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLabTest {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub lab_test_catalog_id: i64,
    pub test_date: NaiveDate,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabTestUpdate {
    pub result_url: Option<String>,
    pub result_data: Option<Value>,
    pub status: Option<LabTestStatus>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LabTestFilter {
    pub patient_id: Option<i64>,
    pub status: Option<LabTestStatus>,
}

impl LabTestFilter {
    pub fn matches(&self, test: &LabTest) -> bool {
        self.patient_id.map_or(true, |id| test.patient_id == id)
            && self.status.map_or(true, |status| test.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_uses_hyphenated_wire_name() {
        assert_eq!(serde_json::to_string(&LabTestStatus::InProgress).unwrap(), "\"in-progress\"");
        assert_eq!("in-progress".parse::<LabTestStatus>().unwrap(), LabTestStatus::InProgress);
        assert!("done".parse::<LabTestStatus>().is_err());
    }

    #[test]
    fn zero_price_charges_the_default() {
        let entry = LabTestCatalogEntry::named(1, "CBC", Decimal::ZERO);
        assert_eq!(entry.charge(), dec!(20.00));
        let entry = LabTestCatalogEntry::named(2, "Lipid Panel", dec!(35.00));
        assert_eq!(entry.charge(), dec!(35.00));
    }
}
