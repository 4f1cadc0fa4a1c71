// models/src/medical/bill.rs
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::errors::ValidationError;

pub const DEFAULT_PAYMENT_METHOD: &str = "Online";

/// Normalizes an amount to two decimal places (DECIMAL(10,2) semantics).
pub fn to_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Unpaid,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(BillStatus::Unpaid),
            "paid" => Ok(BillStatus::Paid),
            other => Err(ValidationError::InvalidEnumValue {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// One bill per appointment. The amount only grows while unpaid and is frozen once paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: i64,
    pub patient_id: i64,
    pub appointment_id: i64,
    pub amount: Decimal,
    pub status: BillStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
}

impl Bill {
    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }
}

#[derive(Debug, Clone)]
pub struct NewBill {
    pub patient_id: i64,
    pub appointment_id: i64,
    pub amount: Decimal,
}

/// What a chargeable event does to the appointment's bill.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargePlan {
    /// No bill yet: open one for the charge.
    Open { amount: Decimal },
    /// Unpaid bill: raise its amount.
    Increment { bill_id: i64, amount: Decimal },
    /// Paid bill: the charge is not applied anywhere.
    DropPaid { bill_id: i64 },
}

impl ChargePlan {
    /// Accumulation rule shared by consultation completion and lab orders.
    pub fn for_charge(existing: Option<&Bill>, charge: Decimal) -> Self {
        let charge = to_money(charge);
        match existing {
            None => ChargePlan::Open { amount: charge },
            Some(bill) if bill.is_paid() => ChargePlan::DropPaid { bill_id: bill.id },
            Some(bill) => ChargePlan::Increment {
                bill_id: bill.id,
                amount: to_money(bill.amount + charge),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bill(amount: Decimal, status: BillStatus) -> Bill {
        Bill {
            id: 7,
            patient_id: 1,
            appointment_id: 3,
            amount,
            status,
            payment_date: None,
            payment_method: None,
        }
    }

    #[test]
    fn first_charge_opens_a_bill() {
        assert_eq!(ChargePlan::for_charge(None, dec!(75)), ChargePlan::Open { amount: dec!(75.00) });
    }

    #[test]
    fn unpaid_bill_accumulates() {
        let existing = bill(dec!(75.00), BillStatus::Unpaid);
        assert_eq!(
            ChargePlan::for_charge(Some(&existing), dec!(20.00)),
            ChargePlan::Increment { bill_id: 7, amount: dec!(95.00) }
        );
    }

    #[test]
    fn paid_bill_drops_the_charge() {
        let existing = bill(dec!(75.00), BillStatus::Paid);
        assert_eq!(ChargePlan::for_charge(Some(&existing), dec!(20.00)), ChargePlan::DropPaid { bill_id: 7 });
    }

    #[test]
    fn money_is_two_decimal_places() {
        assert_eq!(to_money(dec!(95)).to_string(), "95.00");
        assert_eq!(to_money(dec!(10.005)).to_string(), "10.00");
    }
}
