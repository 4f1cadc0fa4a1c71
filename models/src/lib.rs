// models/src/lib.rs

pub mod dashboard;
pub mod errors;
pub mod medical;
pub mod timestamp;
pub mod views;

pub use dashboard::DashboardStats;
pub use errors::{HospitalError, HospitalResult, ValidationError, ValidationResult};
pub use medical::*;
