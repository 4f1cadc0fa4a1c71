// lib/src/storage_engine/inmemory_storage.rs
//! Default engine. All tables live behind one tokio mutex; a transaction owns
//! the guard for its whole lifetime and works on a copy, so transactions are
//! serialized and an uncommitted one leaves no trace.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use models::errors::{HospitalError, HospitalResult};
use models::medical::*;
use crate::config::StorageEngineType;
use crate::storage_engine::{HospitalStorage, StorageTransaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    next_ids: HashMap<&'static str, i64>,
    users: BTreeMap<i64, UserCredentials>,
    patients: BTreeMap<i64, Patient>,
    doctors: BTreeMap<i64, Doctor>,
    schedules: BTreeMap<i64, DoctorSchedule>,
    departments: BTreeMap<i64, Department>,
    medicines: BTreeMap<i64, Medicine>,
    lab_catalog: BTreeMap<i64, LabTestCatalogEntry>,
    appointments: BTreeMap<i64, Appointment>,
    prescriptions: BTreeMap<i64, Prescription>,
    prescription_medicines: BTreeMap<i64, PrescriptionMedicine>,
    lab_tests: BTreeMap<i64, LabTest>,
    bills: BTreeMap<i64, Bill>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.next_ids.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn slot_taken<F>(&self, date: NaiveDate, time: NaiveTime, owner: F) -> Option<&Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        self.appointments.values().find(|a| {
            owner(a) && a.appointment_date == date && a.appointment_time == time && a.status.holds_slot()
        })
    }

    fn remove_appointments<F>(&mut self, doomed: F)
    where
        F: Fn(&Appointment) -> bool,
    {
        let ids: BTreeSet<i64> = self.appointments.values().filter(|a| doomed(a)).map(|a| a.id).collect();
        self.appointments.retain(|id, _| !ids.contains(id));
        let prescriptions: BTreeSet<i64> = self
            .prescriptions
            .values()
            .filter(|p| ids.contains(&p.appointment_id))
            .map(|p| p.id)
            .collect();
        self.prescriptions.retain(|id, _| !prescriptions.contains(id));
        self.prescription_medicines.retain(|_, line| !prescriptions.contains(&line.prescription_id));
        self.bills.retain(|_, bill| !ids.contains(&bill.appointment_id));
    }
}

fn missing(entity: &str, id: i64) -> HospitalError {
    HospitalError::NotFound(format!("{} {} not found", entity, id))
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<TokioMutex<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }
}

#[async_trait]
impl HospitalStorage for InMemoryStorage {
    async fn begin(&self) -> HospitalResult<Box<dyn StorageTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }

    async fn init_schema(&self) -> HospitalResult<()> {
        debug!("In-memory storage needs no schema");
        Ok(())
    }

    async fn ping(&self) -> HospitalResult<()> {
        Ok(())
    }

    fn engine_type(&self) -> StorageEngineType {
        StorageEngineType::InMemory
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StorageTransaction for InMemoryTransaction {
    async fn insert_user(&mut self, user: NewUser) -> HospitalResult<User> {
        if self.working.users.values().any(|u| u.user.email == user.email) {
            return Err(HospitalError::Conflict("User already exists".to_string()));
        }
        let id = self.working.next_id("users");
        let created = User { id, name: user.name, email: user.email, phone: user.phone, role: user.role };
        self.working.users.insert(
            id,
            UserCredentials { user: created.clone(), password_hash: user.password_hash },
        );
        Ok(created)
    }

    async fn find_user_by_email(&mut self, email: &str) -> HospitalResult<Option<UserCredentials>> {
        Ok(self.working.users.values().find(|u| u.user.email == email).cloned())
    }

    async fn get_user(&mut self, id: i64) -> HospitalResult<Option<User>> {
        Ok(self.working.users.get(&id).map(|u| u.user.clone()))
    }

    async fn update_user_contact(&mut self, id: i64, name: Option<String>, phone: Option<String>) -> HospitalResult<()> {
        let row = self.working.users.get_mut(&id).ok_or_else(|| missing("User", id))?;
        if let Some(name) = name {
            row.user.name = name;
        }
        if let Some(phone) = phone {
            row.user.phone = Some(phone);
        }
        Ok(())
    }

    async fn delete_user(&mut self, id: i64) -> HospitalResult<()> {
        let tables = &mut self.working;
        if tables.users.remove(&id).is_none() {
            return Err(missing("User", id));
        }
        let doctors: BTreeSet<i64> = tables.doctors.values().filter(|d| d.user_id == id).map(|d| d.id).collect();
        let patients: BTreeSet<i64> = tables.patients.values().filter(|p| p.user_id == id).map(|p| p.id).collect();
        tables.doctors.retain(|doctor_id, _| !doctors.contains(doctor_id));
        tables.patients.retain(|patient_id, _| !patients.contains(patient_id));
        tables.schedules.retain(|_, s| !doctors.contains(&s.doctor_id));
        tables.lab_tests.retain(|_, t| !doctors.contains(&t.doctor_id) && !patients.contains(&t.patient_id));
        tables.bills.retain(|_, b| !patients.contains(&b.patient_id));
        tables.remove_appointments(|a| doctors.contains(&a.doctor_id) || patients.contains(&a.patient_id));
        Ok(())
    }

    async fn insert_patient(&mut self, patient: NewPatient) -> HospitalResult<Patient> {
        if self.working.patients.values().any(|p| p.user_id == patient.user_id) {
            return Err(HospitalError::Conflict("Patient profile already exists".to_string()));
        }
        let id = self.working.next_id("patients");
        let created = Patient { id, user_id: patient.user_id, dob: patient.dob, gender: patient.gender };
        self.working.patients.insert(id, created.clone());
        Ok(created)
    }

    async fn get_patient(&mut self, id: i64) -> HospitalResult<Option<Patient>> {
        Ok(self.working.patients.get(&id).cloned())
    }

    async fn find_patient_by_user(&mut self, user_id: i64) -> HospitalResult<Option<Patient>> {
        Ok(self.working.patients.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn list_patients(&mut self) -> HospitalResult<Vec<Patient>> {
        Ok(self.working.patients.values().cloned().collect())
    }

    async fn count_patients(&mut self) -> HospitalResult<u64> {
        Ok(self.working.patients.len() as u64)
    }

    async fn insert_doctor(&mut self, doctor: NewDoctor) -> HospitalResult<Doctor> {
        if self.working.doctors.values().any(|d| d.user_id == doctor.user_id) {
            return Err(HospitalError::Conflict("Doctor profile already exists".to_string()));
        }
        let id = self.working.next_id("doctors");
        let created = Doctor {
            id,
            user_id: doctor.user_id,
            department_id: doctor.department_id,
            specialization: doctor.specialization,
            fees: to_money(doctor.fees),
        };
        self.working.doctors.insert(id, created.clone());
        Ok(created)
    }

    async fn get_doctor(&mut self, id: i64) -> HospitalResult<Option<Doctor>> {
        Ok(self.working.doctors.get(&id).cloned())
    }

    async fn find_doctor_by_user(&mut self, user_id: i64) -> HospitalResult<Option<Doctor>> {
        Ok(self.working.doctors.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn update_doctor(&mut self, id: i64, update: DoctorUpdate) -> HospitalResult<Doctor> {
        let doctor = self.working.doctors.get_mut(&id).ok_or_else(|| missing("Doctor", id))?;
        if let Some(department_id) = update.department_id {
            doctor.department_id = Some(department_id);
        }
        if let Some(specialization) = update.specialization {
            doctor.specialization = Some(specialization);
        }
        if let Some(fees) = update.fees {
            doctor.fees = to_money(fees);
        }
        Ok(doctor.clone())
    }

    async fn list_doctors(&mut self) -> HospitalResult<Vec<Doctor>> {
        Ok(self.working.doctors.values().cloned().collect())
    }

    async fn count_doctors(&mut self) -> HospitalResult<u64> {
        Ok(self.working.doctors.len() as u64)
    }

    async fn upsert_schedule(&mut self, doctor_id: i64, entry: ScheduleEntry) -> HospitalResult<DoctorSchedule> {
        let existing = self
            .working
            .schedules
            .values()
            .find(|s| s.doctor_id == doctor_id && s.day_of_week == entry.day_of_week)
            .map(|s| s.id);
        let id = match existing {
            Some(id) => id,
            None => self.working.next_id("doctor_schedules"),
        };
        let schedule = DoctorSchedule {
            id,
            doctor_id,
            day_of_week: entry.day_of_week,
            start_time: entry.start_time,
            end_time: entry.end_time,
            is_available: entry.is_available,
        };
        self.working.schedules.insert(id, schedule.clone());
        Ok(schedule)
    }

    async fn list_schedules(&mut self, doctor_id: i64) -> HospitalResult<Vec<DoctorSchedule>> {
        let mut schedules: Vec<DoctorSchedule> =
            self.working.schedules.values().filter(|s| s.doctor_id == doctor_id).cloned().collect();
        schedules.sort_by_key(|s| s.day_of_week);
        Ok(schedules)
    }

    async fn insert_department(&mut self, department: NewDepartment) -> HospitalResult<Department> {
        if self.working.departments.values().any(|d| d.name == department.name) {
            return Err(HospitalError::Conflict("Department already exists".to_string()));
        }
        let id = self.working.next_id("departments");
        let created = Department {
            id,
            name: department.name,
            description: department.description,
            image: department.image,
        };
        self.working.departments.insert(id, created.clone());
        Ok(created)
    }

    async fn get_department(&mut self, id: i64) -> HospitalResult<Option<Department>> {
        Ok(self.working.departments.get(&id).cloned())
    }

    async fn list_departments(&mut self) -> HospitalResult<Vec<Department>> {
        Ok(self.working.departments.values().cloned().collect())
    }

    async fn find_or_create_medicine(&mut self, name: &str) -> HospitalResult<Medicine> {
        if let Some(found) = self.working.medicines.values().find(|m| m.name == name) {
            return Ok(found.clone());
        }
        let id = self.working.next_id("medicines");
        let created = Medicine::named(id, name);
        self.working.medicines.insert(id, created.clone());
        Ok(created)
    }

    async fn get_medicine(&mut self, id: i64) -> HospitalResult<Option<Medicine>> {
        Ok(self.working.medicines.get(&id).cloned())
    }

    async fn list_medicines(&mut self) -> HospitalResult<Vec<Medicine>> {
        Ok(self.working.medicines.values().cloned().collect())
    }

    async fn find_or_create_lab_test_catalog(&mut self, test_name: &str, price: Decimal) -> HospitalResult<LabTestCatalogEntry> {
        if let Some(found) = self.working.lab_catalog.values().find(|e| e.test_name == test_name) {
            return Ok(found.clone());
        }
        let id = self.working.next_id("lab_test_catalog");
        let created = LabTestCatalogEntry::named(id, test_name, to_money(price));
        self.working.lab_catalog.insert(id, created.clone());
        Ok(created)
    }

    async fn get_lab_test_catalog(&mut self, id: i64) -> HospitalResult<Option<LabTestCatalogEntry>> {
        Ok(self.working.lab_catalog.get(&id).cloned())
    }

    async fn list_lab_test_catalog(&mut self) -> HospitalResult<Vec<LabTestCatalogEntry>> {
        Ok(self.working.lab_catalog.values().cloned().collect())
    }

    async fn find_active_doctor_slot(&mut self, doctor_id: i64, date: NaiveDate, time: NaiveTime) -> HospitalResult<Option<Appointment>> {
        Ok(self.working.slot_taken(date, time, |a| a.doctor_id == doctor_id).cloned())
    }

    async fn find_active_patient_slot(&mut self, patient_id: i64, date: NaiveDate, time: NaiveTime) -> HospitalResult<Option<Appointment>> {
        Ok(self.working.slot_taken(date, time, |a| a.patient_id == patient_id).cloned())
    }

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> HospitalResult<Appointment> {
        let (date, time) = (appointment.appointment_date, appointment.appointment_time);
        if self.working.slot_taken(date, time, |a| a.doctor_id == appointment.doctor_id).is_some() {
            return Err(HospitalError::Conflict("Doctor is not available at this time".to_string()));
        }
        if self.working.slot_taken(date, time, |a| a.patient_id == appointment.patient_id).is_some() {
            return Err(HospitalError::Conflict("You already have an appointment at this time".to_string()));
        }
        let id = self.working.next_id("appointments");
        let created = Appointment {
            id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            appointment_date: date,
            appointment_time: time,
            status: AppointmentStatus::Pending,
            reason: appointment.reason,
            created_at: Utc::now(),
        };
        self.working.appointments.insert(id, created.clone());
        Ok(created)
    }

    async fn get_appointment(&mut self, id: i64) -> HospitalResult<Option<Appointment>> {
        Ok(self.working.appointments.get(&id).cloned())
    }

    async fn set_appointment_status(&mut self, id: i64, status: AppointmentStatus) -> HospitalResult<Appointment> {
        let appointment = self.working.appointments.get_mut(&id).ok_or_else(|| missing("Appointment", id))?;
        appointment.status = status;
        Ok(appointment.clone())
    }

    async fn list_appointments(&mut self, filter: AppointmentFilter) -> HospitalResult<Vec<Appointment>> {
        Ok(self.working.appointments.values().filter(|a| filter.matches(a)).cloned().collect())
    }

    async fn latest_billable_appointment(&mut self, patient_id: i64, doctor_id: i64) -> HospitalResult<Option<Appointment>> {
        Ok(self
            .working
            .appointments
            .values()
            .filter(|a| {
                a.patient_id == patient_id
                    && a.doctor_id == doctor_id
                    && AppointmentStatus::BILLABLE.contains(&a.status)
            })
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn count_appointments(&mut self) -> HospitalResult<u64> {
        Ok(self.working.appointments.len() as u64)
    }

    async fn find_prescription_by_appointment(&mut self, appointment_id: i64) -> HospitalResult<Option<Prescription>> {
        Ok(self.working.prescriptions.values().find(|p| p.appointment_id == appointment_id).cloned())
    }

    async fn insert_prescription(&mut self, prescription: NewPrescription) -> HospitalResult<Prescription> {
        if self.working.prescriptions.values().any(|p| p.appointment_id == prescription.appointment_id) {
            return Err(HospitalError::Conflict("Prescription already exists for this appointment".to_string()));
        }
        let id = self.working.next_id("prescriptions");
        let created = Prescription {
            id,
            appointment_id: prescription.appointment_id,
            diagnosis: prescription.diagnosis,
            instructions: prescription.instructions,
            date: prescription.date,
        };
        self.working.prescriptions.insert(id, created.clone());
        Ok(created)
    }

    async fn insert_prescription_medicine(&mut self, line: NewPrescriptionMedicine) -> HospitalResult<PrescriptionMedicine> {
        let id = self.working.next_id("prescription_medicines");
        let created = PrescriptionMedicine {
            id,
            prescription_id: line.prescription_id,
            medicine_id: line.medicine_id,
            dosage: line.dosage,
            frequency: None,
            duration: line.duration,
            instructions: None,
        };
        self.working.prescription_medicines.insert(id, created.clone());
        Ok(created)
    }

    async fn list_prescription_medicines(&mut self, prescription_id: i64) -> HospitalResult<Vec<PrescriptionMedicine>> {
        Ok(self
            .working
            .prescription_medicines
            .values()
            .filter(|line| line.prescription_id == prescription_id)
            .cloned()
            .collect())
    }

    async fn insert_lab_test(&mut self, lab_test: NewLabTest) -> HospitalResult<LabTest> {
        let id = self.working.next_id("lab_tests");
        let created = LabTest {
            id,
            patient_id: lab_test.patient_id,
            doctor_id: lab_test.doctor_id,
            lab_test_catalog_id: lab_test.lab_test_catalog_id,
            test_date: lab_test.test_date,
            result_url: None,
            result_data: None,
            status: LabTestStatus::Ordered,
            notes: lab_test.notes,
            created_at: Utc::now(),
        };
        self.working.lab_tests.insert(id, created.clone());
        Ok(created)
    }

    async fn get_lab_test(&mut self, id: i64) -> HospitalResult<Option<LabTest>> {
        Ok(self.working.lab_tests.get(&id).cloned())
    }

    async fn update_lab_test(&mut self, id: i64, update: LabTestUpdate) -> HospitalResult<LabTest> {
        let lab_test = self.working.lab_tests.get_mut(&id).ok_or_else(|| missing("Lab test", id))?;
        if let Some(url) = update.result_url {
            lab_test.result_url = Some(url);
        }
        if let Some(data) = update.result_data {
            lab_test.result_data = Some(data);
        }
        if let Some(status) = update.status {
            lab_test.status = status;
        }
        Ok(lab_test.clone())
    }

    async fn list_lab_tests(&mut self, filter: LabTestFilter) -> HospitalResult<Vec<LabTest>> {
        let mut tests: Vec<LabTest> =
            self.working.lab_tests.values().filter(|t| filter.matches(t)).cloned().collect();
        tests.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(tests)
    }

    async fn find_bill_by_appointment(&mut self, appointment_id: i64) -> HospitalResult<Option<Bill>> {
        Ok(self.working.bills.values().find(|b| b.appointment_id == appointment_id).cloned())
    }

    async fn insert_bill(&mut self, bill: NewBill) -> HospitalResult<Bill> {
        if self.working.bills.values().any(|b| b.appointment_id == bill.appointment_id) {
            return Err(HospitalError::Conflict("Bill already exists for this appointment".to_string()));
        }
        let id = self.working.next_id("bills");
        let created = Bill {
            id,
            patient_id: bill.patient_id,
            appointment_id: bill.appointment_id,
            amount: to_money(bill.amount),
            status: BillStatus::Unpaid,
            payment_date: None,
            payment_method: None,
        };
        self.working.bills.insert(id, created.clone());
        Ok(created)
    }

    async fn set_bill_amount(&mut self, id: i64, amount: Decimal) -> HospitalResult<Bill> {
        let bill = self.working.bills.get_mut(&id).ok_or_else(|| missing("Bill", id))?;
        bill.amount = to_money(amount);
        Ok(bill.clone())
    }

    async fn mark_bill_paid(&mut self, id: i64, method: &str, paid_at: DateTime<Utc>) -> HospitalResult<Bill> {
        let bill = self.working.bills.get_mut(&id).ok_or_else(|| missing("Bill", id))?;
        bill.status = BillStatus::Paid;
        bill.payment_date = Some(paid_at);
        bill.payment_method = Some(method.to_string());
        Ok(bill.clone())
    }

    async fn get_bill(&mut self, id: i64) -> HospitalResult<Option<Bill>> {
        Ok(self.working.bills.get(&id).cloned())
    }

    async fn list_bills_for_patient(&mut self, patient_id: i64) -> HospitalResult<Vec<Bill>> {
        Ok(self.working.bills.values().filter(|b| b.patient_id == patient_id).cloned().collect())
    }

    async fn sum_paid_bills(&mut self) -> HospitalResult<Decimal> {
        let total: Decimal = self.working.bills.values().filter(|b| b.is_paid()).map(|b| b.amount).sum();
        Ok(to_money(total))
    }

    async fn commit(self: Box<Self>) -> HospitalResult<()> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
