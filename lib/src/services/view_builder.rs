// lib/src/services/view_builder.rs
// Assembles nested response views inside an open transaction.

use models::errors::HospitalResult;
use models::medical::{Appointment, Doctor, LabTest, Patient, Prescription};
use models::views::*;
use crate::storage_engine::StorageTransaction;

/// How much of the linked user account a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDetail {
    Name,
    Contact,
}

#[derive(Debug, Clone, Copy)]
pub struct DoctorShape {
    pub user: UserDetail,
    pub department: bool,
    pub schedules: bool,
}

impl DoctorShape {
    pub const NAME: DoctorShape = DoctorShape { user: UserDetail::Name, department: false, schedules: false };
    pub const NAME_AND_DEPARTMENT: DoctorShape =
        DoctorShape { user: UserDetail::Name, department: true, schedules: false };
}

async fn user_summary(
    tx: &mut dyn StorageTransaction,
    user_id: i64,
    detail: UserDetail,
) -> HospitalResult<Option<UserSummary>> {
    Ok(tx.get_user(user_id).await?.map(|user| match detail {
        UserDetail::Name => UserSummary::name_only(&user),
        UserDetail::Contact => UserSummary::with_contact(&user),
    }))
}

pub async fn doctor_view(
    tx: &mut dyn StorageTransaction,
    doctor: Doctor,
    shape: DoctorShape,
) -> HospitalResult<DoctorView> {
    let user = user_summary(tx, doctor.user_id, shape.user).await?;
    let department = match (shape.department, doctor.department_id) {
        (true, Some(id)) => tx.get_department(id).await?.map(|d| DepartmentSummary { name: d.name }),
        _ => None,
    };
    let schedules = if shape.schedules { tx.list_schedules(doctor.id).await? } else { Vec::new() };
    Ok(DoctorView { doctor, user, department, schedules })
}

pub async fn doctor_view_by_id(
    tx: &mut dyn StorageTransaction,
    doctor_id: i64,
    shape: DoctorShape,
) -> HospitalResult<Option<DoctorView>> {
    match tx.get_doctor(doctor_id).await? {
        Some(doctor) => Ok(Some(doctor_view(tx, doctor, shape).await?)),
        None => Ok(None),
    }
}

pub async fn patient_view(
    tx: &mut dyn StorageTransaction,
    patient: Patient,
    detail: UserDetail,
) -> HospitalResult<PatientView> {
    let user = user_summary(tx, patient.user_id, detail).await?;
    Ok(PatientView { patient, user })
}

pub async fn patient_view_by_id(
    tx: &mut dyn StorageTransaction,
    patient_id: i64,
    detail: UserDetail,
) -> HospitalResult<Option<PatientView>> {
    match tx.get_patient(patient_id).await? {
        Some(patient) => Ok(Some(patient_view(tx, patient, detail).await?)),
        None => Ok(None),
    }
}

/// Prescription with its medicine lines; `with_appointment` adds the
/// appointment and the prescribing doctor's name.
pub async fn prescription_view(
    tx: &mut dyn StorageTransaction,
    prescription: Prescription,
    with_appointment: bool,
) -> HospitalResult<PrescriptionView> {
    let mut lines = Vec::new();
    for line in tx.list_prescription_medicines(prescription.id).await? {
        let medicine = tx.get_medicine(line.medicine_id).await?;
        lines.push(PrescriptionLineView { line, medicine });
    }
    let appointment = if with_appointment {
        match tx.get_appointment(prescription.appointment_id).await? {
            Some(appointment) => {
                let doctor = doctor_view_by_id(tx, appointment.doctor_id, DoctorShape::NAME).await?;
                Some(AppointmentView { doctor, ..AppointmentView::bare(appointment) })
            }
            None => None,
        }
    } else {
        None
    };
    Ok(PrescriptionView { prescription, appointment, lines })
}

/// Appointment as it appears in a patient's chart: prescription, lines and doctor name.
pub async fn chart_entry(tx: &mut dyn StorageTransaction, appointment: Appointment) -> HospitalResult<AppointmentView> {
    let prescription = match tx.find_prescription_by_appointment(appointment.id).await? {
        Some(prescription) => Some(Box::new(prescription_view(tx, prescription, false).await?)),
        None => None,
    };
    let doctor = doctor_view_by_id(tx, appointment.doctor_id, DoctorShape::NAME).await?;
    Ok(AppointmentView { patient: None, doctor, prescription, appointment })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LabTestShape {
    pub patient: bool,
    pub doctor: bool,
    pub catalog: bool,
}

pub async fn lab_test_view(
    tx: &mut dyn StorageTransaction,
    lab_test: LabTest,
    shape: LabTestShape,
) -> HospitalResult<LabTestView> {
    let patient = if shape.patient {
        patient_view_by_id(tx, lab_test.patient_id, UserDetail::Name).await?
    } else {
        None
    };
    let doctor = if shape.doctor {
        doctor_view_by_id(tx, lab_test.doctor_id, DoctorShape::NAME).await?
    } else {
        None
    };
    let catalog = if shape.catalog {
        tx.get_lab_test_catalog(lab_test.lab_test_catalog_id).await?
    } else {
        None
    };
    Ok(LabTestView { lab_test, patient, doctor, catalog })
}
