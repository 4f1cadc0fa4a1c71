// server/src/api/payloads.rs
// Request bodies as the front end sends them, and their conversion into
// service requests.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use models::errors::{HospitalResult, ValidationError};
use models::medical::{DayOfWeek, LabTestStatus, LabTestUpdate, MedicineLine, NewDepartment, ScheduleEntry};
use models::timestamp::{parse_clock_time, parse_date};
use lib::services::{
    BookingRequest, DoctorAccount, DoctorAccountUpdate, LabTestRequest, PrescriptionRequest, Registration,
};

/// Ids arrive as numbers or as numeric strings from form selects.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Number(i64),
    Text(String),
}

fn loose_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseId::deserialize(deserializer)? {
        LooseId::Number(id) => Ok(id),
        LooseId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn optional_loose_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LooseId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(LooseId::Number(id)) => Ok(Some(id)),
        Some(LooseId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(LooseId::Text(text)) => text.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn optional_date(raw: Option<String>) -> HospitalResult<Option<chrono::NaiveDate>> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => Ok(Some(parse_date(text)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
}

impl RegisterBody {
    pub fn into_registration(self) -> HospitalResult<Registration> {
        Ok(Registration {
            dob: optional_date(self.dob)?,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            phone: self.phone.filter(|p| !p.trim().is_empty()),
            gender: self.gender.filter(|g| !g.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingBody {
    #[serde(deserialize_with = "loose_id")]
    pub doctor_id: i64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub reason: Option<String>,
}

impl BookingBody {
    pub fn into_request(self) -> HospitalResult<BookingRequest> {
        Ok(BookingRequest {
            doctor_id: self.doctor_id,
            appointment_date: parse_date(self.appointment_date.trim())?,
            appointment_time: parse_clock_time(self.appointment_time.trim())?,
            reason: self.reason,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionBody {
    #[serde(deserialize_with = "loose_id")]
    pub appointment_id: i64,
    #[serde(default)]
    pub medicines: Vec<MedicineLine>,
    pub instructions: Option<String>,
}

impl From<PrescriptionBody> for PrescriptionRequest {
    fn from(body: PrescriptionBody) -> Self {
        PrescriptionRequest {
            appointment_id: body.appointment_id,
            medicines: body.medicines,
            instructions: body.instructions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestBody {
    #[serde(deserialize_with = "loose_id")]
    pub patient_id: i64,
    #[serde(default)]
    pub test_name: String,
    pub notes: Option<String>,
}

impl From<LabTestBody> for LabTestRequest {
    fn from(body: LabTestBody) -> Self {
        LabTestRequest { patient_id: body.patient_id, test_name: body.test_name, notes: body.notes }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
}

fn available_by_default() -> bool {
    true
}

impl ScheduleBody {
    fn into_entry(self) -> HospitalResult<ScheduleEntry> {
        Ok(ScheduleEntry {
            day_of_week: self.day_of_week,
            start_time: parse_clock_time(self.start_time.trim())?,
            end_time: parse_clock_time(self.end_time.trim())?,
            is_available: self.is_available,
        })
    }
}

fn schedule_entries(schedule: Option<Vec<ScheduleBody>>) -> HospitalResult<Vec<ScheduleEntry>> {
    schedule.unwrap_or_default().into_iter().map(ScheduleBody::into_entry).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoctorBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "optional_loose_id")]
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Option<Decimal>,
    pub schedule: Option<Vec<ScheduleBody>>,
}

impl CreateDoctorBody {
    pub fn into_account(self) -> HospitalResult<DoctorAccount> {
        Ok(DoctorAccount {
            schedule: schedule_entries(self.schedule)?,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            phone: self.phone,
            department_id: self.department_id,
            specialization: self.specialization,
            fees: self.fees.unwrap_or(Decimal::ZERO),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoctorBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "optional_loose_id")]
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Option<Decimal>,
    pub schedule: Option<Vec<ScheduleBody>>,
}

impl UpdateDoctorBody {
    pub fn into_update(self) -> HospitalResult<DoctorAccountUpdate> {
        Ok(DoctorAccountUpdate {
            schedule: schedule_entries(self.schedule)?,
            name: self.name,
            phone: self.phone,
            department_id: self.department_id,
            specialization: self.specialization,
            fees: self.fees,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DepartmentBody {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl From<DepartmentBody> for NewDepartment {
    fn from(body: DepartmentBody) -> Self {
        NewDepartment { name: body.name, description: body.description, image: body.image }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestUpdateBody {
    pub result_url: Option<String>,
    pub result_data: Option<Value>,
    pub status: Option<String>,
}

impl LabTestUpdateBody {
    pub fn into_update(self) -> HospitalResult<LabTestUpdate> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => Some(text.parse::<LabTestStatus>()?),
            None => None,
        };
        Ok(LabTestUpdate { result_url: self.result_url, result_data: self.result_data, status })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LabTestQuery {
    pub status: Option<String>,
}

impl LabTestQuery {
    pub fn status(&self) -> Result<Option<LabTestStatus>, ValidationError> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<LabTestStatus>)
            .transpose()
    }
}
