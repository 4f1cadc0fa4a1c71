// models/src/dashboard.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate counts shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub doctors: u64,
    pub patients: u64,
    pub appointments: u64,
    /// Sum of paid bill amounts.
    pub revenue: Decimal,
}
