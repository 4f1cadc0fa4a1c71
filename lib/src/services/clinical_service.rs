// lib/src/services/clinical_service.rs
//! Prescriptions, lab orders and lab results, and the clinical views doctors
//! and patients read back.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;
use models::errors::{HospitalError, HospitalResult};
use models::medical::{
    AppointmentFilter, AppointmentStatus, ClinicalNote, Doctor, LabTest, LabTestFilter, LabTestStatus,
    LabTestUpdate, MedicineLine, NewLabTest, NewPrescription, NewPrescriptionMedicine, Patient, Prescription,
};
use models::views::{LabTestView, PatientDetails, PatientView, PrescriptionView};
use crate::storage_engine::HospitalStorage;
use super::billing_service::apply_charge;
use super::catalog_service::{lab_test_named, medicine_named};
use super::view_builder::{
    chart_entry, lab_test_view, patient_view, patient_view_by_id, prescription_view, LabTestShape, UserDetail,
};

/// Writes `bytes` to `path`, then runs `record`. The file is removed again
/// when recording fails so no stored result outlives its row.
async fn store_then_record<T, F>(path: &Path, bytes: &[u8], record: F) -> HospitalResult<T>
where
    F: Future<Output = HospitalResult<T>>,
{
    tokio::fs::write(path, bytes).await?;
    match record.await {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(io) = tokio::fs::remove_file(path).await {
                warn!("Could not remove orphaned upload {}: {}", path.display(), io);
            }
            Err(err)
        }
    }
}

/// Path prefix under which stored results are served back.
pub const UPLOADS_URL_PREFIX: &str = "uploads";

#[derive(Debug, Clone)]
pub struct PrescriptionRequest {
    pub appointment_id: i64,
    pub medicines: Vec<MedicineLine>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LabTestRequest {
    pub patient_id: i64,
    pub test_name: String,
    pub notes: Option<String>,
}

/// A result file as received from the client.
#[derive(Debug, Clone)]
pub struct LabResultUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Keeps ASCII letters, digits, dots, dashes and underscores; everything else becomes `_`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "result".to_string()
    } else {
        cleaned.to_string()
    }
}

pub struct ClinicalService {
    storage: Arc<dyn HospitalStorage>,
    upload_dir: PathBuf,
}

impl ClinicalService {
    pub fn new(storage: Arc<dyn HospitalStorage>, upload_dir: PathBuf) -> Self {
        ClinicalService { storage, upload_dir }
    }

    /// Writes the prescription and its lines, completes the appointment and
    /// charges the consultation fee, all in one transaction.
    pub async fn create_prescription(&self, doctor: &Doctor, request: PrescriptionRequest) -> HospitalResult<Prescription> {
        if request.medicines.iter().any(|m| m.name.trim().is_empty()) {
            return Err(HospitalError::BadInput("Medicine name is required".to_string()));
        }

        let mut tx = self.storage.begin().await?;
        let appointment = tx
            .get_appointment(request.appointment_id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Appointment not found".to_string()))?;
        if appointment.doctor_id != doctor.id {
            return Err(HospitalError::Forbidden("Not authorized".to_string()));
        }
        if tx.find_prescription_by_appointment(appointment.id).await?.is_some() {
            return Err(HospitalError::Conflict("Prescription already exists for this appointment".to_string()));
        }
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(HospitalError::InvalidState("Cannot prescribe for a cancelled appointment".to_string()));
        }

        let note = ClinicalNote::parse(request.instructions.as_deref());
        let prescription = tx
            .insert_prescription(NewPrescription {
                appointment_id: appointment.id,
                diagnosis: note.diagnosis,
                instructions: note.instructions,
                date: Utc::now().date_naive(),
            })
            .await?;

        for line in &request.medicines {
            let medicine = medicine_named(tx.as_mut(), &line.name).await?;
            tx.insert_prescription_medicine(NewPrescriptionMedicine {
                prescription_id: prescription.id,
                medicine_id: medicine.id,
                dosage: line.dosage.clone().filter(|d| !d.is_empty()),
                duration: line.duration.clone().filter(|d| !d.is_empty()),
            })
            .await?;
        }

        let appointment = if appointment.status.can_transition_to(AppointmentStatus::Completed) {
            tx.set_appointment_status(appointment.id, AppointmentStatus::Completed).await?
        } else {
            appointment
        };

        let fee = tx
            .get_doctor(doctor.id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Doctor profile not found".to_string()))?
            .consultation_fee();
        apply_charge(tx.as_mut(), &appointment, fee).await?;

        tx.commit().await?;
        info!(
            "Doctor {} wrote prescription {} for appointment {} ({} medicines)",
            doctor.id, prescription.id, appointment.id, request.medicines.len()
        );
        Ok(prescription)
    }

    /// Orders a lab test and charges it to the latest billable appointment
    /// between the pair, if there is one.
    pub async fn recommend_lab_test(&self, doctor: &Doctor, request: LabTestRequest) -> HospitalResult<LabTest> {
        let mut tx = self.storage.begin().await?;
        if tx.get_patient(request.patient_id).await?.is_none() {
            return Err(HospitalError::NotFound("Patient not found".to_string()));
        }
        let entry = lab_test_named(tx.as_mut(), &request.test_name).await?;
        let lab_test = tx
            .insert_lab_test(NewLabTest {
                patient_id: request.patient_id,
                doctor_id: doctor.id,
                lab_test_catalog_id: entry.id,
                test_date: Utc::now().date_naive(),
                notes: request.notes.filter(|n| !n.trim().is_empty()),
            })
            .await?;

        match tx.latest_billable_appointment(request.patient_id, doctor.id).await? {
            Some(appointment) => {
                apply_charge(tx.as_mut(), &appointment, entry.charge()).await?;
            }
            None => warn!(
                "Lab test {} ordered for patient {} without a billable appointment with doctor {}; not billed",
                lab_test.id, request.patient_id, doctor.id
            ),
        }

        tx.commit().await?;
        info!("Doctor {} ordered '{}' (lab test {}) for patient {}", doctor.id, entry.test_name, lab_test.id, request.patient_id);
        Ok(lab_test)
    }

    /// Stores the result file and completes the lab test.
    pub async fn upload_lab_result(&self, lab_test_id: i64, upload: Option<LabResultUpload>) -> HospitalResult<LabTest> {
        let mut tx = self.storage.begin().await?;
        if tx.get_lab_test(lab_test_id).await?.is_none() {
            return Err(HospitalError::NotFound("Lab test not found".to_string()));
        }
        let upload = upload
            .filter(|u| !u.bytes.is_empty())
            .ok_or_else(|| HospitalError::BadInput("Please upload a file".to_string()))?;

        let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&upload.file_name));
        let result_url = format!("{}/{}", UPLOADS_URL_PREFIX, stored_name);
        let path = self.upload_dir.join(&stored_name);
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let updated = store_then_record(&path, &upload.bytes, async move {
            let updated = tx
                .update_lab_test(
                    lab_test_id,
                    LabTestUpdate {
                        result_url: Some(result_url),
                        status: Some(LabTestStatus::Completed),
                        ..Default::default()
                    },
                )
                .await?;
            tx.commit().await?;
            Ok(updated)
        })
        .await?;
        info!("Stored result for lab test {} as {} ({} bytes)", lab_test_id, stored_name, upload.bytes.len());
        Ok(updated)
    }

    /// Distinct patients from the doctor's appointments, in first-seen order.
    pub async fn doctor_patients(&self, doctor: &Doctor) -> HospitalResult<Vec<PatientView>> {
        let mut tx = self.storage.begin().await?;
        let mut seen = HashSet::new();
        let mut patients = Vec::new();
        for appointment in tx.list_appointments(AppointmentFilter::for_doctor(doctor.id)).await? {
            if !seen.insert(appointment.patient_id) {
                continue;
            }
            if let Some(view) = patient_view_by_id(tx.as_mut(), appointment.patient_id, UserDetail::Contact).await? {
                patients.push(view);
            }
        }
        Ok(patients)
    }

    /// A patient's full chart: contact details, appointments with their
    /// prescriptions, and lab orders.
    pub async fn patient_details(&self, patient_id: i64) -> HospitalResult<PatientDetails> {
        let mut tx = self.storage.begin().await?;
        let patient = tx
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Patient not found".to_string()))?;
        let view = patient_view(tx.as_mut(), patient, UserDetail::Contact).await?;

        let mut appointments = Vec::new();
        for appointment in tx.list_appointments(AppointmentFilter::for_patient(patient_id)).await? {
            appointments.push(chart_entry(tx.as_mut(), appointment).await?);
        }
        let lab_tests = tx
            .list_lab_tests(LabTestFilter { patient_id: Some(patient_id), status: None })
            .await?;
        Ok(PatientDetails { patient: view, appointments, lab_tests })
    }

    pub async fn prescriptions_for_patient(&self, patient: &Patient) -> HospitalResult<Vec<PrescriptionView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for appointment in tx.list_appointments(AppointmentFilter::for_patient(patient.id)).await? {
            if let Some(prescription) = tx.find_prescription_by_appointment(appointment.id).await? {
                views.push(prescription_view(tx.as_mut(), prescription, true).await?);
            }
        }
        Ok(views)
    }

    pub async fn lab_tests_for_patient(&self, patient: &Patient) -> HospitalResult<Vec<LabTestView>> {
        let mut tx = self.storage.begin().await?;
        let shape = LabTestShape { doctor: true, catalog: true, ..Default::default() };
        let mut views = Vec::new();
        for lab_test in tx.list_lab_tests(LabTestFilter { patient_id: Some(patient.id), status: None }).await? {
            views.push(lab_test_view(tx.as_mut(), lab_test, shape).await?);
        }
        Ok(views)
    }
}
