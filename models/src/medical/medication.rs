// models/src/medical/medication.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Medicine catalog entry. Created lazily by name the first time a doctor
/// prescribes it; every secondary field starts out null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<Decimal>,
    pub description: Option<String>,
}

impl Medicine {
    pub fn named(id: i64, name: &str) -> Self {
        Medicine {
            id,
            name: name.to_string(),
            generic_name: None,
            manufacturer: None,
            category: None,
            unit_price: None,
            description: None,
        }
    }
}
