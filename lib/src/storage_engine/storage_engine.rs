// lib/src/storage_engine/storage_engine.rs
//! The persistence seam. Every use case opens one transaction, performs its
//! reads and writes through it and commits; dropping it uncommitted rolls back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use models::errors::HospitalResult;
use models::medical::{
    Appointment, AppointmentFilter, AppointmentStatus, Bill, Department, Doctor, DoctorSchedule,
    DoctorUpdate, LabTest, LabTestCatalogEntry, LabTestFilter, LabTestUpdate, Medicine, NewAppointment,
    NewBill, NewDepartment, NewDoctor, NewLabTest, NewPatient, NewPrescription, NewPrescriptionMedicine,
    NewUser, Patient, Prescription, PrescriptionMedicine, ScheduleEntry, User, UserCredentials,
};
use crate::config::StorageEngineType;

#[async_trait]
pub trait HospitalStorage: Send + Sync {
    async fn begin(&self) -> HospitalResult<Box<dyn StorageTransaction>>;

    /// Creates missing tables. Never drops or alters existing ones.
    async fn init_schema(&self) -> HospitalResult<()>;

    async fn ping(&self) -> HospitalResult<()>;

    fn engine_type(&self) -> StorageEngineType;
}

#[async_trait]
pub trait StorageTransaction: Send {
    // ==== users and profiles ====

    /// Conflict if the e-mail is taken.
    async fn insert_user(&mut self, user: NewUser) -> HospitalResult<User>;
    async fn find_user_by_email(&mut self, email: &str) -> HospitalResult<Option<UserCredentials>>;
    async fn get_user(&mut self, id: i64) -> HospitalResult<Option<User>>;
    async fn update_user_contact(&mut self, id: i64, name: Option<String>, phone: Option<String>) -> HospitalResult<()>;
    /// Removes the user together with its doctor/patient profile.
    async fn delete_user(&mut self, id: i64) -> HospitalResult<()>;

    async fn insert_patient(&mut self, patient: NewPatient) -> HospitalResult<Patient>;
    async fn get_patient(&mut self, id: i64) -> HospitalResult<Option<Patient>>;
    async fn find_patient_by_user(&mut self, user_id: i64) -> HospitalResult<Option<Patient>>;
    async fn list_patients(&mut self) -> HospitalResult<Vec<Patient>>;
    async fn count_patients(&mut self) -> HospitalResult<u64>;

    async fn insert_doctor(&mut self, doctor: NewDoctor) -> HospitalResult<Doctor>;
    async fn get_doctor(&mut self, id: i64) -> HospitalResult<Option<Doctor>>;
    async fn find_doctor_by_user(&mut self, user_id: i64) -> HospitalResult<Option<Doctor>>;
    async fn update_doctor(&mut self, id: i64, update: DoctorUpdate) -> HospitalResult<Doctor>;
    async fn list_doctors(&mut self) -> HospitalResult<Vec<Doctor>>;
    async fn count_doctors(&mut self) -> HospitalResult<u64>;

    async fn upsert_schedule(&mut self, doctor_id: i64, entry: ScheduleEntry) -> HospitalResult<DoctorSchedule>;
    async fn list_schedules(&mut self, doctor_id: i64) -> HospitalResult<Vec<DoctorSchedule>>;

    /// Conflict if the name is taken.
    async fn insert_department(&mut self, department: NewDepartment) -> HospitalResult<Department>;
    async fn get_department(&mut self, id: i64) -> HospitalResult<Option<Department>>;
    async fn list_departments(&mut self) -> HospitalResult<Vec<Department>>;

    // ==== catalogs ====

    /// Atomic find-or-create on the exact name.
    async fn find_or_create_medicine(&mut self, name: &str) -> HospitalResult<Medicine>;
    async fn get_medicine(&mut self, id: i64) -> HospitalResult<Option<Medicine>>;
    async fn list_medicines(&mut self) -> HospitalResult<Vec<Medicine>>;

    /// Atomic find-or-create on the exact test name; `price` only applies on creation.
    async fn find_or_create_lab_test_catalog(&mut self, test_name: &str, price: Decimal) -> HospitalResult<LabTestCatalogEntry>;
    async fn get_lab_test_catalog(&mut self, id: i64) -> HospitalResult<Option<LabTestCatalogEntry>>;
    async fn list_lab_test_catalog(&mut self) -> HospitalResult<Vec<LabTestCatalogEntry>>;

    // ==== appointments ====

    async fn find_active_doctor_slot(&mut self, doctor_id: i64, date: NaiveDate, time: NaiveTime) -> HospitalResult<Option<Appointment>>;
    async fn find_active_patient_slot(&mut self, patient_id: i64, date: NaiveDate, time: NaiveTime) -> HospitalResult<Option<Appointment>>;
    /// Inserts as `pending`. Conflict if either slot is already held.
    async fn insert_appointment(&mut self, appointment: NewAppointment) -> HospitalResult<Appointment>;
    async fn get_appointment(&mut self, id: i64) -> HospitalResult<Option<Appointment>>;
    async fn set_appointment_status(&mut self, id: i64, status: AppointmentStatus) -> HospitalResult<Appointment>;
    /// Ordered by id.
    async fn list_appointments(&mut self, filter: AppointmentFilter) -> HospitalResult<Vec<Appointment>>;
    /// Most recently created pending/confirmed/completed appointment between the pair.
    async fn latest_billable_appointment(&mut self, patient_id: i64, doctor_id: i64) -> HospitalResult<Option<Appointment>>;
    async fn count_appointments(&mut self) -> HospitalResult<u64>;

    // ==== clinical records ====

    async fn find_prescription_by_appointment(&mut self, appointment_id: i64) -> HospitalResult<Option<Prescription>>;
    /// Conflict if the appointment already has one.
    async fn insert_prescription(&mut self, prescription: NewPrescription) -> HospitalResult<Prescription>;
    async fn insert_prescription_medicine(&mut self, line: NewPrescriptionMedicine) -> HospitalResult<PrescriptionMedicine>;
    async fn list_prescription_medicines(&mut self, prescription_id: i64) -> HospitalResult<Vec<PrescriptionMedicine>>;

    async fn insert_lab_test(&mut self, lab_test: NewLabTest) -> HospitalResult<LabTest>;
    async fn get_lab_test(&mut self, id: i64) -> HospitalResult<Option<LabTest>>;
    async fn update_lab_test(&mut self, id: i64, update: LabTestUpdate) -> HospitalResult<LabTest>;
    /// Newest first.
    async fn list_lab_tests(&mut self, filter: LabTestFilter) -> HospitalResult<Vec<LabTest>>;

    // ==== billing ====

    async fn find_bill_by_appointment(&mut self, appointment_id: i64) -> HospitalResult<Option<Bill>>;
    /// Opens an unpaid bill. Conflict if the appointment already has one.
    async fn insert_bill(&mut self, bill: NewBill) -> HospitalResult<Bill>;
    async fn set_bill_amount(&mut self, id: i64, amount: Decimal) -> HospitalResult<Bill>;
    async fn mark_bill_paid(&mut self, id: i64, method: &str, paid_at: DateTime<Utc>) -> HospitalResult<Bill>;
    async fn get_bill(&mut self, id: i64) -> HospitalResult<Option<Bill>>;
    async fn list_bills_for_patient(&mut self, patient_id: i64) -> HospitalResult<Vec<Bill>>;
    async fn sum_paid_bills(&mut self) -> HospitalResult<Decimal>;

    async fn commit(self: Box<Self>) -> HospitalResult<()>;
}
