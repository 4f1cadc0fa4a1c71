// lib/src/services/mod.rs

pub mod admin_service;
pub mod billing_service;
pub mod catalog_service;
pub mod clinical_service;
pub mod identity_service;
pub mod scheduling_service;
pub mod view_builder;

use std::path::PathBuf;
use std::sync::Arc;
use models::errors::HospitalResult;
use crate::config::HospitalConfig;
use crate::storage_engine::HospitalStorage;

pub use admin_service::{AdminService, DoctorAccount, DoctorAccountUpdate};
pub use billing_service::{apply_charge, BillingService};
pub use catalog_service::CatalogService;
pub use clinical_service::{ClinicalService, LabResultUpload, LabTestRequest, PrescriptionRequest, UPLOADS_URL_PREFIX};
pub use identity_service::{AuthSettings, IdentityService, PasswordHasher, Registration, Session};
pub use scheduling_service::{BookingRequest, SchedulingService};

/// Every use case of the backend over one shared storage engine.
pub struct HospitalServices {
    pub identity: IdentityService,
    pub catalog: CatalogService,
    pub scheduling: SchedulingService,
    pub clinical: ClinicalService,
    pub billing: BillingService,
    pub admin: AdminService,
}

impl HospitalServices {
    pub fn new(storage: Arc<dyn HospitalStorage>, auth: &AuthSettings, upload_dir: PathBuf) -> Self {
        let identity = IdentityService::new(storage.clone(), auth);
        let hasher = identity.hasher();
        HospitalServices {
            catalog: CatalogService::new(storage.clone()),
            scheduling: SchedulingService::new(storage.clone()),
            clinical: ClinicalService::new(storage.clone(), upload_dir),
            billing: BillingService::new(storage.clone()),
            admin: AdminService::new(storage, hasher),
            identity,
        }
    }

    pub fn from_config(storage: Arc<dyn HospitalStorage>, config: &HospitalConfig) -> HospitalResult<Self> {
        let auth = AuthSettings::from_config(config)?;
        Ok(Self::new(storage, &auth, config.uploads.directory.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;
    use models::errors::HospitalError;
    use models::medical::{AppointmentStatus, BillStatus, MedicineLine, Role, User};
    use crate::storage_engine::InMemoryStorage;

    fn services(uploads: &tempfile::TempDir) -> HospitalServices {
        let auth = AuthSettings { bcrypt_cost: 4, ..AuthSettings::with_secret("test-secret") };
        HospitalServices::new(Arc::new(InMemoryStorage::new()), &auth, uploads.path().to_path_buf())
    }

    async fn register(svc: &HospitalServices, name: &str, email: &str) -> User {
        svc.identity
            .register(Registration {
                name: name.into(),
                email: email.into(),
                password: "secret1".into(),
                phone: None,
                dob: None,
                gender: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn booking_to_payment_end_to_end() {
        let uploads = tempfile::tempdir().unwrap();
        let svc = services(&uploads);
        let patient_user = register(&svc, "Jane Roe", "jane@example.com").await;
        let doctor_user = register(&svc, "Dr. House", "house@doctor.com").await;
        assert_eq!(doctor_user.role, Role::Doctor);

        let patient = svc.identity.patient_profile(&patient_user).await.unwrap();
        let doctor = svc.identity.doctor_profile(&doctor_user).await.unwrap();

        let appointment = svc
            .scheduling
            .book(
                &patient,
                BookingRequest {
                    doctor_id: doctor.id,
                    appointment_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    appointment_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);

        svc.clinical
            .create_prescription(
                &doctor,
                PrescriptionRequest {
                    appointment_id: appointment.id,
                    medicines: vec![MedicineLine {
                        name: "Paracetamol".into(),
                        dosage: Some("500mg".into()),
                        duration: Some("5 days".into()),
                    }],
                    instructions: Some("Diagnosis: Viral Fever.".into()),
                },
            )
            .await
            .unwrap();

        let bills = svc.billing.bills_for_patient(&patient).await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].bill.amount, dec!(50.00));
        assert_eq!(bills[0].appointment.as_ref().unwrap().appointment_date, appointment.appointment_date);

        let paid = svc.billing.pay(&patient, bills[0].bill.id, None).await.unwrap();
        assert_eq!(paid.status, BillStatus::Paid);
        assert_eq!(paid.payment_method.as_deref(), Some("Online"));
        assert!(paid.payment_date.is_some());

        let again = svc.billing.pay(&patient, paid.id, Some("Card".into())).await.unwrap_err();
        assert_eq!(again, HospitalError::InvalidState("Bill is already paid".into()));
        let unchanged = svc.billing.bills_for_patient(&patient).await.unwrap();
        assert_eq!(unchanged[0].bill.payment_method.as_deref(), Some("Online"));

        assert_eq!(svc.admin.stats().await.unwrap().revenue, dec!(50.00));
    }

    #[tokio::test]
    async fn bills_are_private_to_their_patient() {
        let uploads = tempfile::tempdir().unwrap();
        let svc = services(&uploads);
        let jane = register(&svc, "Jane Roe", "jane@example.com").await;
        let john = register(&svc, "John Doe", "john@example.com").await;
        let doctor_user = register(&svc, "Dr. House", "house@doctor.com").await;
        let jane = svc.identity.patient_profile(&jane).await.unwrap();
        let john = svc.identity.patient_profile(&john).await.unwrap();
        let doctor = svc.identity.doctor_profile(&doctor_user).await.unwrap();

        let appointment = svc
            .scheduling
            .book(
                &jane,
                BookingRequest {
                    doctor_id: doctor.id,
                    appointment_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                    appointment_time: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
                    reason: Some("Follow-up".into()),
                },
            )
            .await
            .unwrap();
        svc.clinical
            .create_prescription(
                &doctor,
                PrescriptionRequest { appointment_id: appointment.id, medicines: vec![], instructions: None },
            )
            .await
            .unwrap();
        let bills = svc.billing.bills_for_patient(&jane).await.unwrap();
        let bill = &bills[0].bill;

        assert_eq!(
            svc.billing.pay(&john, bill.id, None).await.unwrap_err(),
            HospitalError::NotFound("Bill not found".into())
        );
        assert!(svc.billing.bills_for_patient(&john).await.unwrap().is_empty());
    }
}
