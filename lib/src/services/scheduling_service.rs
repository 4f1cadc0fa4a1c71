// lib/src/services/scheduling_service.rs
//! Appointment booking and cancellation, and the appointment listings for each role.

use std::cmp::Reverse;
use std::sync::Arc;
use chrono::{NaiveDate, NaiveTime};
use log::info;
use models::errors::{HospitalError, HospitalResult};
use models::medical::{Appointment, AppointmentFilter, AppointmentStatus, Doctor, NewAppointment, Patient};
use models::views::{AppointmentView, DoctorView};
use crate::storage_engine::HospitalStorage;
use super::view_builder::{doctor_view, doctor_view_by_id, patient_view_by_id, DoctorShape, UserDetail};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub doctor_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
}

pub struct SchedulingService {
    storage: Arc<dyn HospitalStorage>,
}

impl SchedulingService {
    pub fn new(storage: Arc<dyn HospitalStorage>) -> Self {
        SchedulingService { storage }
    }

    /// Books a pending appointment. The doctor's slot is checked before the
    /// patient's; both checks and the insert share one transaction.
    pub async fn book(&self, patient: &Patient, request: BookingRequest) -> HospitalResult<Appointment> {
        let mut tx = self.storage.begin().await?;
        if tx.get_doctor(request.doctor_id).await?.is_none() {
            return Err(HospitalError::NotFound("Doctor not found".to_string()));
        }
        if tx
            .find_active_doctor_slot(request.doctor_id, request.appointment_date, request.appointment_time)
            .await?
            .is_some()
        {
            return Err(HospitalError::Conflict("Doctor is not available at this time".to_string()));
        }
        if tx
            .find_active_patient_slot(patient.id, request.appointment_date, request.appointment_time)
            .await?
            .is_some()
        {
            return Err(HospitalError::Conflict("You already have an appointment at this time".to_string()));
        }

        let appointment = tx
            .insert_appointment(NewAppointment {
                patient_id: patient.id,
                doctor_id: request.doctor_id,
                appointment_date: request.appointment_date,
                appointment_time: request.appointment_time,
                reason: request.reason.filter(|r| !r.trim().is_empty()),
            })
            .await?;
        tx.commit().await?;
        info!(
            "Patient {} booked appointment {} with doctor {} on {} at {}",
            patient.id, appointment.id, appointment.doctor_id, appointment.appointment_date, appointment.appointment_time
        );
        Ok(appointment)
    }

    pub async fn cancel(&self, patient: &Patient, appointment_id: i64) -> HospitalResult<Appointment> {
        let mut tx = self.storage.begin().await?;
        let appointment = tx
            .get_appointment(appointment_id)
            .await?
            .filter(|a| a.patient_id == patient.id)
            .ok_or_else(|| HospitalError::NotFound("Appointment not found".to_string()))?;
        if !appointment.status.can_transition_to(AppointmentStatus::Cancelled) {
            return Err(HospitalError::InvalidState("Cannot cancel this appointment".to_string()));
        }
        let cancelled = tx.set_appointment_status(appointment.id, AppointmentStatus::Cancelled).await?;
        tx.commit().await?;
        info!("Patient {} cancelled appointment {}", patient.id, cancelled.id);
        Ok(cancelled)
    }

    /// The patient's appointments, each with the doctor's name and department.
    pub async fn list_for_patient(&self, patient: &Patient) -> HospitalResult<Vec<AppointmentView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for appointment in tx.list_appointments(AppointmentFilter::for_patient(patient.id)).await? {
            let doctor = doctor_view_by_id(tx.as_mut(), appointment.doctor_id, DoctorShape::NAME_AND_DEPARTMENT).await?;
            views.push(AppointmentView { doctor, ..AppointmentView::bare(appointment) });
        }
        Ok(views)
    }

    /// The doctor's appointments, each with the patient's name and contact details.
    pub async fn list_for_doctor(&self, doctor: &Doctor) -> HospitalResult<Vec<AppointmentView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for appointment in tx.list_appointments(AppointmentFilter::for_doctor(doctor.id)).await? {
            let patient = patient_view_by_id(tx.as_mut(), appointment.patient_id, UserDetail::Contact).await?;
            views.push(AppointmentView { patient, ..AppointmentView::bare(appointment) });
        }
        Ok(views)
    }

    /// Every appointment, latest date first and earliest time first within a day.
    pub async fn list_all(&self) -> HospitalResult<Vec<AppointmentView>> {
        let mut tx = self.storage.begin().await?;
        let mut appointments = tx.list_appointments(AppointmentFilter::default()).await?;
        appointments.sort_by_key(|a| (Reverse(a.appointment_date), a.appointment_time));

        let mut views = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let patient = patient_view_by_id(tx.as_mut(), appointment.patient_id, UserDetail::Name).await?;
            let doctor = doctor_view_by_id(tx.as_mut(), appointment.doctor_id, DoctorShape::NAME).await?;
            views.push(AppointmentView { patient, doctor, ..AppointmentView::bare(appointment) });
        }
        Ok(views)
    }

    /// Doctors a patient can book, with name and department.
    pub async fn doctors_for_booking(&self) -> HospitalResult<Vec<DoctorView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for doctor in tx.list_doctors().await? {
            views.push(doctor_view(tx.as_mut(), doctor, DoctorShape::NAME_AND_DEPARTMENT).await?);
        }
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::medical::{NewDepartment, NewDoctor, NewPatient, NewUser, Role};
    use crate::storage_engine::InMemoryStorage;

    struct Fixture {
        storage: Arc<dyn HospitalStorage>,
        service: SchedulingService,
        doctor: Doctor,
        patient: Patient,
    }

    async fn seed_user(storage: &Arc<dyn HospitalStorage>, name: &str, email: &str, role: Role) -> i64 {
        let mut tx = storage.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                name: name.into(),
                email: email.into(),
                password_hash: "x".into(),
                phone: None,
                role,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        user.id
    }

    async fn fixture() -> Fixture {
        let storage: Arc<dyn HospitalStorage> = Arc::new(InMemoryStorage::new());
        let doctor_user = seed_user(&storage, "Dr. House", "house@doctor.com", Role::Doctor).await;
        let patient_user = seed_user(&storage, "Jane Roe", "jane@example.com", Role::Patient).await;
        let mut tx = storage.begin().await.unwrap();
        let department = tx
            .insert_department(NewDepartment { name: "Diagnostics".into(), ..Default::default() })
            .await
            .unwrap();
        let doctor = tx
            .insert_doctor(NewDoctor { user_id: doctor_user, department_id: Some(department.id), ..Default::default() })
            .await
            .unwrap();
        let patient = tx.insert_patient(NewPatient { user_id: patient_user, ..Default::default() }).await.unwrap();
        tx.commit().await.unwrap();
        Fixture { service: SchedulingService::new(storage.clone()), storage, doctor, patient }
    }

    fn slot(doctor_id: i64, date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            doctor_id,
            appointment_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            appointment_time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            reason: Some("Checkup".into()),
        }
    }

    #[tokio::test]
    async fn booking_starts_pending() {
        let f = fixture().await;
        let appointment = f.service.book(&f.patient, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.doctor_id, f.doctor.id);
    }

    #[tokio::test]
    async fn unknown_doctor_is_not_found() {
        let f = fixture().await;
        let err = f.service.book(&f.patient, slot(999, "2024-01-10", "09:00")).await.unwrap_err();
        assert_eq!(err, HospitalError::NotFound("Doctor not found".into()));
    }

    #[tokio::test]
    async fn double_booking_conflicts_until_cancelled() {
        let f = fixture().await;
        let first = f.service.book(&f.patient, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap();

        let other_user = seed_user(&f.storage, "John Doe", "john@example.com", Role::Patient).await;
        let mut tx = f.storage.begin().await.unwrap();
        let other = tx.insert_patient(NewPatient { user_id: other_user, ..Default::default() }).await.unwrap();
        tx.commit().await.unwrap();

        let err = f.service.book(&other, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap_err();
        assert_eq!(err, HospitalError::Conflict("Doctor is not available at this time".into()));

        f.service.cancel(&f.patient, first.id).await.unwrap();
        let rebooked = f.service.book(&other, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap();
        assert_eq!(rebooked.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn patient_cannot_hold_two_appointments_in_one_slot() {
        let f = fixture().await;
        f.service.book(&f.patient, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap();

        let second_doctor_user = seed_user(&f.storage, "Dr. Grey", "grey@doctor.com", Role::Doctor).await;
        let mut tx = f.storage.begin().await.unwrap();
        let second = tx.insert_doctor(NewDoctor { user_id: second_doctor_user, ..Default::default() }).await.unwrap();
        tx.commit().await.unwrap();

        let err = f.service.book(&f.patient, slot(second.id, "2024-01-10", "09:00")).await.unwrap_err();
        assert_eq!(err, HospitalError::Conflict("You already have an appointment at this time".into()));
    }

    #[tokio::test]
    async fn cancel_is_owner_only_and_one_way() {
        let f = fixture().await;
        let appointment = f.service.book(&f.patient, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap();

        let stranger = Patient { id: f.patient.id + 100, ..f.patient.clone() };
        assert_eq!(
            f.service.cancel(&stranger, appointment.id).await.unwrap_err(),
            HospitalError::NotFound("Appointment not found".into())
        );

        let cancelled = f.service.cancel(&f.patient, appointment.id).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(
            f.service.cancel(&f.patient, appointment.id).await.unwrap_err(),
            HospitalError::InvalidState("Cannot cancel this appointment".into())
        );
    }

    #[tokio::test]
    async fn listings_carry_the_counterpart() {
        let f = fixture().await;
        f.service.book(&f.patient, slot(f.doctor.id, "2024-01-10", "09:00")).await.unwrap();
        f.service.book(&f.patient, slot(f.doctor.id, "2024-01-12", "08:00")).await.unwrap();
        f.service.book(&f.patient, slot(f.doctor.id, "2024-01-12", "07:30")).await.unwrap();

        let mine = f.service.list_for_patient(&f.patient).await.unwrap();
        assert_eq!(mine.len(), 3);
        let doctor = mine[0].doctor.as_ref().unwrap();
        assert_eq!(doctor.user.as_ref().unwrap().name, "Dr. House");
        assert_eq!(doctor.department.as_ref().unwrap().name, "Diagnostics");

        let theirs = f.service.list_for_doctor(&f.doctor).await.unwrap();
        let patient = theirs[0].patient.as_ref().unwrap();
        assert_eq!(patient.user.as_ref().unwrap().email.as_deref(), Some("jane@example.com"));

        let all = f.service.list_all().await.unwrap();
        let order: Vec<String> = all
            .iter()
            .map(|v| format!("{} {}", v.appointment.appointment_date, v.appointment.appointment_time))
            .collect();
        assert_eq!(order, vec!["2024-01-12 07:30:00", "2024-01-12 08:00:00", "2024-01-10 09:00:00"]);
    }

    #[tokio::test]
    async fn doctors_for_booking_include_department() {
        let f = fixture().await;
        let doctors = f.service.doctors_for_booking().await.unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].department.as_ref().unwrap().name, "Diagnostics");
        assert!(doctors[0].user.as_ref().unwrap().email.is_none());
    }
}
