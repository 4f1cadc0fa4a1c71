// models/src/medical/doctor.rs
use std::fmt;
use std::str::FromStr;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::errors::{ValidationError, ValidationResult};
use crate::medical::bill::to_money;

/// Charged when a doctor completes a consultation without a configured fee.
pub const DEFAULT_CONSULTATION_FEE: Decimal = Decimal::from_parts(5000, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: i64,
    pub user_id: i64,
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Decimal,
}

impl Doctor {
    /// The amount a completed consultation adds to the bill. A zero fee counts
    /// as unset, since profiles start at 0.00 until an admin configures them.
    pub fn consultation_fee(&self) -> Decimal {
        if self.fees > Decimal::ZERO {
            to_money(self.fees)
        } else {
            DEFAULT_CONSULTATION_FEE
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewDoctor {
    pub user_id: i64,
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Decimal,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoctorUpdate {
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Option<Decimal>,
}

impl DoctorUpdate {
    pub fn is_empty(&self) -> bool {
        self.department_id.is_none() && self.specialization.is_none() && self.fees.is_none()
    }
}

pub fn validate_fees(fees: Decimal) -> ValidationResult<Decimal> {
    if fees < Decimal::ZERO {
        return Err(ValidationError::NegativeAmount("fees".to_string()));
    }
    Ok(to_money(fees))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Monday" => Ok(DayOfWeek::Monday),
            "Tuesday" => Ok(DayOfWeek::Tuesday),
            "Wednesday" => Ok(DayOfWeek::Wednesday),
            "Thursday" => Ok(DayOfWeek::Thursday),
            "Friday" => Ok(DayOfWeek::Friday),
            "Saturday" => Ok(DayOfWeek::Saturday),
            "Sunday" => Ok(DayOfWeek::Sunday),
            other => Err(ValidationError::InvalidEnumValue {
                field: "dayOfWeek".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Declared weekly availability. Booking does not consult it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSchedule {
    pub id: i64,
    pub doctor_id: i64,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Upserted on (doctor_id, day_of_week).
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn doctor_with_fees(fees: Decimal) -> Doctor {
        Doctor { id: 1, user_id: 1, department_id: None, specialization: None, fees }
    }

    #[test]
    fn zero_fee_falls_back_to_default() {
        assert_eq!(doctor_with_fees(Decimal::ZERO).consultation_fee(), dec!(50.00));
        assert_eq!(doctor_with_fees(dec!(75)).consultation_fee(), dec!(75.00));
    }

    #[test]
    fn negative_fees_are_rejected() {
        assert!(validate_fees(dec!(-1)).is_err());
        assert_eq!(validate_fees(dec!(120.5)).unwrap().to_string(), "120.50");
    }

    #[test]
    fn day_of_week_parses_capitalized_names() {
        assert_eq!("Friday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Friday);
        assert!("friday".parse::<DayOfWeek>().is_err());
    }
}
