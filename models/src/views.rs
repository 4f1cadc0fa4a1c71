// models/src/views.rs
//! Response shapes with nested associations. Nested records use capitalized
//! association keys (`User`, `Doctor`, ...) which the web client reads directly.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use crate::medical::{
    Appointment, Bill, Doctor, DoctorSchedule, LabTest, LabTestCatalogEntry, Medicine, Patient,
    Prescription, PrescriptionMedicine, User,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserSummary {
    pub fn name_only(user: &User) -> Self {
        UserSummary { name: user.name.clone(), email: None, phone: None }
    }

    pub fn with_contact(user: &User) -> Self {
        UserSummary {
            name: user.name.clone(),
            email: Some(user.email.clone()),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentSummary {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    #[serde(rename = "User")]
    pub user: Option<UserSummary>,
    #[serde(rename = "Department", skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentSummary>,
    #[serde(rename = "DoctorSchedules", skip_serializing_if = "Vec::is_empty")]
    pub schedules: Vec<DoctorSchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: Patient,
    #[serde(rename = "User")]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(rename = "Patient", skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientView>,
    #[serde(rename = "Doctor", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorView>,
    #[serde(rename = "Prescription", skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Box<PrescriptionView>>,
}

impl AppointmentView {
    pub fn bare(appointment: Appointment) -> Self {
        AppointmentView { appointment, patient: None, doctor: None, prescription: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrescriptionLineView {
    #[serde(flatten)]
    pub line: PrescriptionMedicine,
    #[serde(rename = "Medicine")]
    pub medicine: Option<Medicine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    #[serde(rename = "Appointment", skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AppointmentView>,
    #[serde(rename = "PrescriptionMedicines")]
    pub lines: Vec<PrescriptionLineView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabTestView {
    #[serde(flatten)]
    pub lab_test: LabTest,
    #[serde(rename = "Patient", skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientView>,
    #[serde(rename = "Doctor", skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorView>,
    #[serde(rename = "LabTestCatalog", skip_serializing_if = "Option::is_none")]
    pub catalog: Option<LabTestCatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentSlot {
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillView {
    #[serde(flatten)]
    pub bill: Bill,
    #[serde(rename = "Appointment")]
    pub appointment: Option<AppointmentSlot>,
}

/// Everything a doctor sees when opening a patient's chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientDetails {
    #[serde(flatten)]
    pub patient: PatientView,
    #[serde(rename = "Appointments")]
    pub appointments: Vec<AppointmentView>,
    #[serde(rename = "LabTests")]
    pub lab_tests: Vec<LabTest>,
}

/// The signed-in account with whichever profile it owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "Patient")]
    pub patient: Option<Patient>,
    #[serde(rename = "Doctor")]
    pub doctor: Option<Doctor>,
}
