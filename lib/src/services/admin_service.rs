// lib/src/services/admin_service.rs

use std::sync::Arc;
use log::info;
use rust_decimal::Decimal;
use models::dashboard::DashboardStats;
use models::errors::{HospitalError, HospitalResult, ValidationError};
use models::medical::{
    validate_account_fields, validate_fees, Department, DoctorUpdate, LabTest, LabTestFilter, LabTestStatus,
    LabTestUpdate, NewDepartment, NewDoctor, NewUser, Role, ScheduleEntry,
};
use models::views::{DoctorView, LabTestView, PatientView};
use crate::storage_engine::{HospitalStorage, StorageTransaction};
use super::identity_service::PasswordHasher;
use super::view_builder::{doctor_view, lab_test_view, patient_view, DoctorShape, LabTestShape, UserDetail};

const ADMIN_DOCTOR_SHAPE: DoctorShape = DoctorShape { user: UserDetail::Contact, department: true, schedules: true };

#[derive(Debug, Clone)]
pub struct DoctorAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Decimal,
    pub schedule: Vec<ScheduleEntry>,
}

/// Fields an admin may change on a doctor. Blank strings count as not supplied.
#[derive(Debug, Clone, Default)]
pub struct DoctorAccountUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<i64>,
    pub specialization: Option<String>,
    pub fees: Option<Decimal>,
    pub schedule: Vec<ScheduleEntry>,
}

fn supplied(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_schedule(schedule: &[ScheduleEntry]) -> HospitalResult<()> {
    match schedule.iter().find(|entry| entry.start_time >= entry.end_time) {
        Some(entry) => Err(HospitalError::BadInput(format!(
            "Schedule for {} must start before it ends",
            entry.day_of_week
        ))),
        None => Ok(()),
    }
}

async fn check_department(tx: &mut dyn StorageTransaction, department_id: Option<i64>) -> HospitalResult<()> {
    if let Some(id) = department_id {
        if tx.get_department(id).await?.is_none() {
            return Err(HospitalError::NotFound("Department not found".to_string()));
        }
    }
    Ok(())
}

pub struct AdminService {
    storage: Arc<dyn HospitalStorage>,
    hasher: PasswordHasher,
}

impl AdminService {
    pub fn new(storage: Arc<dyn HospitalStorage>, hasher: PasswordHasher) -> Self {
        AdminService { storage, hasher }
    }

    pub async fn list_doctors(&self) -> HospitalResult<Vec<DoctorView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for doctor in tx.list_doctors().await? {
            views.push(doctor_view(tx.as_mut(), doctor, ADMIN_DOCTOR_SHAPE).await?);
        }
        Ok(views)
    }

    /// Creates a doctor account directly; the role is doctor whatever the e-mail domain.
    pub async fn create_doctor(&self, account: DoctorAccount) -> HospitalResult<DoctorView> {
        validate_account_fields(&account.name, &account.email, &account.password)?;
        let fees = validate_fees(account.fees)?;
        check_schedule(&account.schedule)?;
        let password_hash = self.hasher.hash(&account.password).await?;

        let mut tx = self.storage.begin().await?;
        if tx.find_user_by_email(&account.email).await?.is_some() {
            return Err(HospitalError::Conflict("User already exists".to_string()));
        }
        check_department(tx.as_mut(), account.department_id).await?;
        let user = tx
            .insert_user(NewUser {
                name: account.name,
                email: account.email,
                password_hash,
                phone: supplied(account.phone),
                role: Role::Doctor,
            })
            .await?;
        let doctor = tx
            .insert_doctor(NewDoctor {
                user_id: user.id,
                department_id: account.department_id,
                specialization: supplied(account.specialization),
                fees,
            })
            .await?;
        for entry in account.schedule {
            tx.upsert_schedule(doctor.id, entry).await?;
        }
        let view = doctor_view(tx.as_mut(), doctor, ADMIN_DOCTOR_SHAPE).await?;
        tx.commit().await?;
        info!("Created doctor {} for user {}", view.doctor.id, user.id);
        Ok(view)
    }

    pub async fn update_doctor(&self, doctor_id: i64, update: DoctorAccountUpdate) -> HospitalResult<DoctorView> {
        let fees = update.fees.map(validate_fees).transpose()?;
        check_schedule(&update.schedule)?;

        let mut tx = self.storage.begin().await?;
        let doctor = tx
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Doctor not found".to_string()))?;
        check_department(tx.as_mut(), update.department_id).await?;

        let name = supplied(update.name);
        let phone = supplied(update.phone);
        if name.is_some() || phone.is_some() {
            tx.update_user_contact(doctor.user_id, name, phone).await?;
        }
        let changes = DoctorUpdate {
            department_id: update.department_id,
            specialization: supplied(update.specialization),
            fees,
        };
        let doctor = if changes.is_empty() { doctor } else { tx.update_doctor(doctor.id, changes).await? };
        for entry in update.schedule {
            tx.upsert_schedule(doctor.id, entry).await?;
        }
        let view = doctor_view(tx.as_mut(), doctor, ADMIN_DOCTOR_SHAPE).await?;
        tx.commit().await?;
        info!("Updated doctor {}", doctor_id);
        Ok(view)
    }

    /// Removes the doctor's user account; the profile and its history go with it.
    pub async fn delete_doctor(&self, doctor_id: i64) -> HospitalResult<()> {
        let mut tx = self.storage.begin().await?;
        let doctor = tx
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Doctor not found".to_string()))?;
        tx.delete_user(doctor.user_id).await?;
        tx.commit().await?;
        info!("Removed doctor {} (user {})", doctor.id, doctor.user_id);
        Ok(())
    }

    pub async fn list_patients(&self) -> HospitalResult<Vec<PatientView>> {
        let mut tx = self.storage.begin().await?;
        let mut views = Vec::new();
        for patient in tx.list_patients().await? {
            views.push(patient_view(tx.as_mut(), patient, UserDetail::Contact).await?);
        }
        Ok(views)
    }

    pub async fn list_departments(&self) -> HospitalResult<Vec<Department>> {
        let mut tx = self.storage.begin().await?;
        tx.list_departments().await
    }

    pub async fn create_department(&self, department: NewDepartment) -> HospitalResult<Department> {
        let name = department.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        let mut tx = self.storage.begin().await?;
        let created = tx
            .insert_department(NewDepartment {
                name,
                description: supplied(department.description),
                image: supplied(department.image),
            })
            .await?;
        tx.commit().await?;
        info!("Created department {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn stats(&self) -> HospitalResult<DashboardStats> {
        let mut tx = self.storage.begin().await?;
        Ok(DashboardStats {
            doctors: tx.count_doctors().await?,
            patients: tx.count_patients().await?,
            appointments: tx.count_appointments().await?,
            revenue: tx.sum_paid_bills().await?,
        })
    }

    /// Lab orders newest first, optionally narrowed to one status.
    pub async fn list_lab_tests(&self, status: Option<LabTestStatus>) -> HospitalResult<Vec<LabTestView>> {
        let mut tx = self.storage.begin().await?;
        let shape = LabTestShape { patient: true, doctor: true, ..Default::default() };
        let mut views = Vec::new();
        for lab_test in tx.list_lab_tests(LabTestFilter { patient_id: None, status }).await? {
            views.push(lab_test_view(tx.as_mut(), lab_test, shape).await?);
        }
        Ok(views)
    }

    pub async fn update_lab_test(&self, lab_test_id: i64, update: LabTestUpdate) -> HospitalResult<LabTest> {
        let mut tx = self.storage.begin().await?;
        let existing = tx
            .get_lab_test(lab_test_id)
            .await?
            .ok_or_else(|| HospitalError::NotFound("Lab test not found".to_string()))?;
        let update = LabTestUpdate { result_url: supplied(update.result_url), ..update };
        if update == LabTestUpdate::default() {
            return Ok(existing);
        }
        let updated = tx.update_lab_test(lab_test_id, update).await?;
        tx.commit().await?;
        info!("Lab test {} updated (status {})", updated.id, updated.status);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal_macros::dec;
    use models::medical::{DayOfWeek, NewAppointment, NewBill, NewLabTest, NewPatient, DEFAULT_LAB_TEST_PRICE};
    use crate::storage_engine::InMemoryStorage;

    fn service() -> (Arc<dyn HospitalStorage>, AdminService) {
        let storage: Arc<dyn HospitalStorage> = Arc::new(InMemoryStorage::new());
        (storage.clone(), AdminService::new(storage, PasswordHasher::new(4)))
    }

    fn account(email: &str) -> DoctorAccount {
        DoctorAccount {
            name: "Dr. Grey".into(),
            email: email.into(),
            password: "secret1".into(),
            phone: Some("555-0199".into()),
            department_id: None,
            specialization: Some("Surgery".into()),
            fees: dec!(120),
            schedule: vec![ScheduleEntry {
                day_of_week: DayOfWeek::Monday,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                is_available: true,
            }],
        }
    }

    #[tokio::test]
    async fn create_doctor_forces_the_role_and_keeps_the_schedule() {
        let (storage, svc) = service();
        let department = svc
            .create_department(NewDepartment { name: "Surgery".into(), ..Default::default() })
            .await
            .unwrap();
        let view = svc
            .create_doctor(DoctorAccount { department_id: Some(department.id), ..account("grey@example.com") })
            .await
            .unwrap();
        assert_eq!(view.doctor.fees, dec!(120.00));
        assert_eq!(view.schedules.len(), 1);
        assert_eq!(view.department.as_ref().unwrap().name, "Surgery");

        let mut tx = storage.begin().await.unwrap();
        let user = tx.get_user(view.doctor.user_id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Doctor);
    }

    #[tokio::test]
    async fn create_doctor_rejects_duplicates_and_bad_input() {
        let (_, svc) = service();
        svc.create_doctor(account("grey@doctor.com")).await.unwrap();
        assert_eq!(
            svc.create_doctor(account("grey@doctor.com")).await.unwrap_err(),
            HospitalError::Conflict("User already exists".into())
        );
        assert!(matches!(
            svc.create_doctor(DoctorAccount { fees: dec!(-5), ..account("a@doctor.com") }).await,
            Err(HospitalError::Validation(ValidationError::NegativeAmount(_)))
        ));
        assert_eq!(
            svc.create_doctor(DoctorAccount { department_id: Some(42), ..account("b@doctor.com") })
                .await
                .unwrap_err(),
            HospitalError::NotFound("Department not found".into())
        );
    }

    #[tokio::test]
    async fn update_doctor_applies_only_supplied_fields() {
        let (_, svc) = service();
        let created = svc.create_doctor(account("grey@doctor.com")).await.unwrap();
        let update = DoctorAccountUpdate {
            name: Some("  ".into()),
            phone: Some("555-0000".into()),
            fees: Some(dec!(80)),
            schedule: vec![ScheduleEntry {
                day_of_week: DayOfWeek::Monday,
                start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                is_available: false,
            }],
            ..Default::default()
        };
        let view = svc.update_doctor(created.doctor.id, update).await.unwrap();
        assert_eq!(view.doctor.fees, dec!(80.00));
        assert_eq!(view.doctor.specialization.as_deref(), Some("Surgery"));
        let user = view.user.unwrap();
        assert_eq!(user.name, "Dr. Grey");
        assert_eq!(user.phone.as_deref(), Some("555-0000"));
        assert_eq!(view.schedules.len(), 1);
        assert!(!view.schedules[0].is_available);

        assert_eq!(
            svc.update_doctor(999, DoctorAccountUpdate::default()).await.unwrap_err(),
            HospitalError::NotFound("Doctor not found".into())
        );
    }

    #[tokio::test]
    async fn delete_doctor_removes_the_account() {
        let (storage, svc) = service();
        let created = svc.create_doctor(account("grey@doctor.com")).await.unwrap();
        svc.delete_doctor(created.doctor.id).await.unwrap();
        assert!(svc.list_doctors().await.unwrap().is_empty());
        let mut tx = storage.begin().await.unwrap();
        assert!(tx.find_user_by_email("grey@doctor.com").await.unwrap().is_none());
        drop(tx);
        assert!(matches!(svc.delete_doctor(created.doctor.id).await, Err(HospitalError::NotFound(_))));
    }

    #[tokio::test]
    async fn departments_require_a_unique_name() {
        let (_, svc) = service();
        svc.create_department(NewDepartment { name: "Cardiology".into(), ..Default::default() }).await.unwrap();
        assert!(matches!(
            svc.create_department(NewDepartment { name: "Cardiology".into(), ..Default::default() }).await,
            Err(HospitalError::Conflict(_))
        ));
        assert!(matches!(
            svc.create_department(NewDepartment::default()).await,
            Err(HospitalError::Validation(ValidationError::MissingField(_)))
        ));
        assert_eq!(svc.list_departments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stats_count_records_and_sum_paid_bills() {
        let (storage, svc) = service();
        let doctor = svc.create_doctor(account("grey@doctor.com")).await.unwrap().doctor;

        let mut tx = storage.begin().await.unwrap();
        let patient_user = tx
            .insert_user(NewUser {
                name: "Jane Roe".into(),
                email: "jane@example.com".into(),
                password_hash: "x".into(),
                phone: None,
                role: Role::Patient,
            })
            .await
            .unwrap();
        let patient = tx.insert_patient(NewPatient { user_id: patient_user.id, ..Default::default() }).await.unwrap();
        let mut bills = Vec::new();
        for hour in [9, 10] {
            let appointment = tx
                .insert_appointment(NewAppointment {
                    patient_id: patient.id,
                    doctor_id: doctor.id,
                    appointment_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    appointment_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                    reason: None,
                })
                .await
                .unwrap();
            bills.push(
                tx.insert_bill(NewBill { patient_id: patient.id, appointment_id: appointment.id, amount: dec!(60) })
                    .await
                    .unwrap(),
            );
        }
        tx.mark_bill_paid(bills[0].id, "Card", Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let stats = svc.stats().await.unwrap();
        assert_eq!((stats.doctors, stats.patients, stats.appointments), (1, 1, 2));
        assert_eq!(stats.revenue, dec!(60.00));
    }

    #[tokio::test]
    async fn lab_tests_filter_by_status_and_update() {
        let (storage, svc) = service();
        let doctor = svc.create_doctor(account("grey@doctor.com")).await.unwrap().doctor;
        let mut tx = storage.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                name: "Jane Roe".into(),
                email: "jane@example.com".into(),
                password_hash: "x".into(),
                phone: None,
                role: Role::Patient,
            })
            .await
            .unwrap();
        let patient = tx.insert_patient(NewPatient { user_id: user.id, ..Default::default() }).await.unwrap();
        let entry = tx.find_or_create_lab_test_catalog("CBC", DEFAULT_LAB_TEST_PRICE).await.unwrap();
        let lab_test = tx
            .insert_lab_test(NewLabTest {
                patient_id: patient.id,
                doctor_id: doctor.id,
                lab_test_catalog_id: entry.id,
                test_date: Utc::now().date_naive(),
                notes: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let ordered = svc.list_lab_tests(Some(LabTestStatus::Ordered)).await.unwrap();
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].patient.as_ref().unwrap().user.as_ref().unwrap().name, "Jane Roe");
        assert_eq!(ordered[0].doctor.as_ref().unwrap().user.as_ref().unwrap().name, "Dr. Grey");

        let update = LabTestUpdate {
            result_url: Some("https://results.example.com/cbc.pdf".into()),
            status: Some(LabTestStatus::InProgress),
            ..Default::default()
        };
        let updated = svc.update_lab_test(lab_test.id, update).await.unwrap();
        assert_eq!(updated.status, LabTestStatus::InProgress);
        assert!(svc.list_lab_tests(Some(LabTestStatus::Ordered)).await.unwrap().is_empty());
        assert_eq!(svc.list_lab_tests(None).await.unwrap().len(), 1);
        assert_eq!(
            svc.update_lab_test(999, LabTestUpdate::default()).await.unwrap_err(),
            HospitalError::NotFound("Lab test not found".into())
        );
    }
}
