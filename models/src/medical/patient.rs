// models/src/medical/patient.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub user_id: i64,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub user_id: i64,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
}
