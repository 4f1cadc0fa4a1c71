// lib/src/storage_engine/mysql_storage.rs
// NOTE: dates and times are selected through DATE_FORMAT/TIME_FORMAT and
// decimals as text, then parsed with the helpers in models::timestamp.

use std::str::FromStr;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::{debug, info, warn};
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Row, Transaction, TxOpts, Value};
use rust_decimal::Decimal;
use models::errors::{HospitalError, HospitalResult, ValidationError};
use models::medical::*;
use models::timestamp::{format_utc_datetime, parse_clock_time, parse_date, parse_utc_datetime, DATE_FORMAT, TIME_FORMAT};
use crate::config::{StorageConfig, StorageEngineType};
use crate::storage_engine::mysql_schema::SCHEMA_STATEMENTS;
use crate::storage_engine::{HospitalStorage, StorageTransaction};

const ER_DUP_ENTRY: u16 = 1062;
const ER_LOCK_DEADLOCK: u16 = 1213;

const DOCTOR_SLOT_TAKEN: &str = "Doctor is not available at this time";
const PATIENT_SLOT_TAKEN: &str = "You already have an appointment at this time";
const RECORD_EXISTS: &str = "Record already exists";
const CONCURRENT_UPDATE: &str = "Another request changed this record, please retry";

const USER_COLUMNS: &str = "id, name, email, password, phone, role";
const PATIENT_COLUMNS: &str = "id, user_id, DATE_FORMAT(dob, '%Y-%m-%d') AS dob, gender";
const DOCTOR_COLUMNS: &str = "id, user_id, department_id, specialization, CAST(fees AS CHAR) AS fees";
const SCHEDULE_COLUMNS: &str = "id, doctor_id, CAST(day_of_week AS CHAR) AS day_of_week, \
    TIME_FORMAT(start_time, '%H:%i:%s') AS start_time, TIME_FORMAT(end_time, '%H:%i:%s') AS end_time, is_available";
const DEPARTMENT_COLUMNS: &str = "id, name, description, image";
const MEDICINE_COLUMNS: &str = "id, name, generic_name, manufacturer, category, \
    CAST(unit_price AS CHAR) AS unit_price, description";
const CATALOG_COLUMNS: &str = "id, test_name, test_code, category, CAST(price AS CHAR) AS price, \
    description, normal_range, sample_type";
const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, \
    DATE_FORMAT(appointment_date, '%Y-%m-%d') AS appointment_date, \
    TIME_FORMAT(appointment_time, '%H:%i:%s') AS appointment_time, CAST(status AS CHAR) AS status, reason, \
    DATE_FORMAT(created_at, '%Y-%m-%d %H:%i:%s') AS created_at";
const PRESCRIPTION_COLUMNS: &str = "id, appointment_id, diagnosis, instructions, DATE_FORMAT(date, '%Y-%m-%d') AS date";
const LINE_COLUMNS: &str = "id, prescription_id, medicine_id, dosage, frequency, duration, instructions";
const LAB_TEST_COLUMNS: &str = "id, patient_id, doctor_id, lab_test_catalog_id, \
    DATE_FORMAT(test_date, '%Y-%m-%d') AS test_date, result_url, CAST(result_data AS CHAR) AS result_data, \
    CAST(status AS CHAR) AS status, notes, DATE_FORMAT(created_at, '%Y-%m-%d %H:%i:%s') AS created_at";
const BILL_COLUMNS: &str = "id, patient_id, appointment_id, CAST(amount AS CHAR) AS amount, \
    CAST(status AS CHAR) AS status, DATE_FORMAT(payment_date, '%Y-%m-%d %H:%i:%s') AS payment_date, payment_method";

/// Client wording for each unique key, matching the in-memory engine.
const DUPLICATE_KEY_MESSAGES: &[(&str, &str)] = &[
    ("uq_users_email", "User already exists"),
    ("uq_departments_name", "Department already exists"),
    ("uq_patients_user", "Patient profile already exists"),
    ("uq_doctors_user", "Doctor profile already exists"),
    ("uq_doctor_active_slot", DOCTOR_SLOT_TAKEN),
    ("uq_patient_active_slot", PATIENT_SLOT_TAKEN),
    ("uq_prescriptions_appointment", "Prescription already exists for this appointment"),
    ("uq_bills_appointment", "Bill already exists for this appointment"),
    ("uq_lab_catalog_code", "Lab test code already exists"),
];

/// Name of the violated key in an ER_DUP_ENTRY message. MySQL 8 prefixes it
/// with the table (`for key 'appointments.uq_doctor_active_slot'`).
fn duplicate_key_name(message: &str) -> Option<&str> {
    let (_, tail) = message.rsplit_once("for key '")?;
    let key = tail.trim_end().trim_end_matches('\'');
    Some(key.rsplit('.').next().unwrap_or(key))
}

fn duplicate_message(server_message: &str) -> &'static str {
    duplicate_key_name(server_message)
        .and_then(|key| DUPLICATE_KEY_MESSAGES.iter().find(|(name, _)| *name == key))
        .map(|(_, message)| *message)
        .unwrap_or(RECORD_EXISTS)
}

fn storage_error(err: mysql_async::Error) -> HospitalError {
    match &err {
        mysql_async::Error::Server(server) if server.code == ER_DUP_ENTRY => {
            debug!("mysql duplicate entry: {}", server.message);
            HospitalError::Conflict(duplicate_message(&server.message).to_string())
        }
        mysql_async::Error::Server(server) if server.code == ER_LOCK_DEADLOCK => {
            warn!("mysql deadlock: {}", server.message);
            HospitalError::Conflict(CONCURRENT_UPDATE.to_string())
        }
        _ => HospitalError::StorageError(err.to_string()),
    }
}

/// Slot statements lose deadlocks to a competing booking of the same slot.
fn slot_error(err: mysql_async::Error, taken: &'static str) -> HospitalError {
    match &err {
        mysql_async::Error::Server(server) if server.code == ER_LOCK_DEADLOCK => {
            warn!("mysql deadlock while booking: {}", server.message);
            HospitalError::Conflict(taken.to_string())
        }
        _ => storage_error(err),
    }
}

// ==== row decoding ====

fn take<T: FromValue>(row: &mut Row, column: &str) -> HospitalResult<T> {
    match row.take_opt::<T, _>(column) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(HospitalError::StorageError(format!("Bad value in column {}: {:?}", column, e))),
        None => Err(HospitalError::StorageError(format!("Missing column {}", column))),
    }
}

fn take_decimal(row: &mut Row, column: &str) -> HospitalResult<Decimal> {
    let raw: String = take(row, column)?;
    Decimal::from_str(&raw)
        .map_err(|e| HospitalError::StorageError(format!("Bad decimal in column {}: {}", column, e)))
}

fn take_opt_decimal(row: &mut Row, column: &str) -> HospitalResult<Option<Decimal>> {
    let raw: Option<String> = take(row, column)?;
    raw.map(|raw| {
        Decimal::from_str(&raw)
            .map_err(|e| HospitalError::StorageError(format!("Bad decimal in column {}: {}", column, e)))
    })
    .transpose()
}

fn take_date(row: &mut Row, column: &str) -> HospitalResult<NaiveDate> {
    let raw: String = take(row, column)?;
    Ok(parse_date(&raw)?)
}

fn take_opt_date(row: &mut Row, column: &str) -> HospitalResult<Option<NaiveDate>> {
    let raw: Option<String> = take(row, column)?;
    Ok(raw.map(|raw| parse_date(&raw)).transpose()?)
}

fn take_time(row: &mut Row, column: &str) -> HospitalResult<NaiveTime> {
    let raw: String = take(row, column)?;
    Ok(parse_clock_time(&raw)?)
}

fn take_datetime(row: &mut Row, column: &str) -> HospitalResult<DateTime<Utc>> {
    let raw: String = take(row, column)?;
    Ok(parse_utc_datetime(&raw)?)
}

fn take_opt_datetime(row: &mut Row, column: &str) -> HospitalResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = take(row, column)?;
    Ok(raw.map(|raw| parse_utc_datetime(&raw)).transpose()?)
}

fn take_parsed<T>(row: &mut Row, column: &str) -> HospitalResult<T>
where
    T: FromStr<Err = ValidationError>,
{
    let raw: String = take(row, column)?;
    Ok(raw.parse::<T>()?)
}

fn user_from_row(row: &mut Row) -> HospitalResult<UserCredentials> {
    Ok(UserCredentials {
        user: User {
            id: take(row, "id")?,
            name: take(row, "name")?,
            email: take(row, "email")?,
            phone: take(row, "phone")?,
            role: take_parsed(row, "role")?,
        },
        password_hash: take(row, "password")?,
    })
}

fn patient_from_row(row: &mut Row) -> HospitalResult<Patient> {
    Ok(Patient {
        id: take(row, "id")?,
        user_id: take(row, "user_id")?,
        dob: take_opt_date(row, "dob")?,
        gender: take(row, "gender")?,
    })
}

fn doctor_from_row(row: &mut Row) -> HospitalResult<Doctor> {
    Ok(Doctor {
        id: take(row, "id")?,
        user_id: take(row, "user_id")?,
        department_id: take(row, "department_id")?,
        specialization: take(row, "specialization")?,
        fees: take_decimal(row, "fees")?,
    })
}

fn schedule_from_row(row: &mut Row) -> HospitalResult<DoctorSchedule> {
    Ok(DoctorSchedule {
        id: take(row, "id")?,
        doctor_id: take(row, "doctor_id")?,
        day_of_week: take_parsed(row, "day_of_week")?,
        start_time: take_time(row, "start_time")?,
        end_time: take_time(row, "end_time")?,
        is_available: take(row, "is_available")?,
    })
}

fn department_from_row(row: &mut Row) -> HospitalResult<Department> {
    Ok(Department {
        id: take(row, "id")?,
        name: take(row, "name")?,
        description: take(row, "description")?,
        image: take(row, "image")?,
    })
}

fn medicine_from_row(row: &mut Row) -> HospitalResult<Medicine> {
    Ok(Medicine {
        id: take(row, "id")?,
        name: take(row, "name")?,
        generic_name: take(row, "generic_name")?,
        manufacturer: take(row, "manufacturer")?,
        category: take(row, "category")?,
        unit_price: take_opt_decimal(row, "unit_price")?,
        description: take(row, "description")?,
    })
}

fn catalog_from_row(row: &mut Row) -> HospitalResult<LabTestCatalogEntry> {
    Ok(LabTestCatalogEntry {
        id: take(row, "id")?,
        test_name: take(row, "test_name")?,
        test_code: take(row, "test_code")?,
        category: take(row, "category")?,
        price: take_decimal(row, "price")?,
        description: take(row, "description")?,
        normal_range: take(row, "normal_range")?,
        sample_type: take(row, "sample_type")?,
    })
}

fn appointment_from_row(row: &mut Row) -> HospitalResult<Appointment> {
    Ok(Appointment {
        id: take(row, "id")?,
        patient_id: take(row, "patient_id")?,
        doctor_id: take(row, "doctor_id")?,
        appointment_date: take_date(row, "appointment_date")?,
        appointment_time: take_time(row, "appointment_time")?,
        status: take_parsed(row, "status")?,
        reason: take(row, "reason")?,
        created_at: take_datetime(row, "created_at")?,
    })
}

fn prescription_from_row(row: &mut Row) -> HospitalResult<Prescription> {
    Ok(Prescription {
        id: take(row, "id")?,
        appointment_id: take(row, "appointment_id")?,
        diagnosis: take(row, "diagnosis")?,
        instructions: take(row, "instructions")?,
        date: take_date(row, "date")?,
    })
}

fn line_from_row(row: &mut Row) -> HospitalResult<PrescriptionMedicine> {
    Ok(PrescriptionMedicine {
        id: take(row, "id")?,
        prescription_id: take(row, "prescription_id")?,
        medicine_id: take(row, "medicine_id")?,
        dosage: take(row, "dosage")?,
        frequency: take(row, "frequency")?,
        duration: take(row, "duration")?,
        instructions: take(row, "instructions")?,
    })
}

fn lab_test_from_row(row: &mut Row) -> HospitalResult<LabTest> {
    let result_data: Option<String> = take(row, "result_data")?;
    Ok(LabTest {
        id: take(row, "id")?,
        patient_id: take(row, "patient_id")?,
        doctor_id: take(row, "doctor_id")?,
        lab_test_catalog_id: take(row, "lab_test_catalog_id")?,
        test_date: take_date(row, "test_date")?,
        result_url: take(row, "result_url")?,
        result_data: result_data.map(|raw| serde_json::from_str(&raw)).transpose()?,
        status: take_parsed(row, "status")?,
        notes: take(row, "notes")?,
        created_at: take_datetime(row, "created_at")?,
    })
}

fn bill_from_row(row: &mut Row) -> HospitalResult<Bill> {
    Ok(Bill {
        id: take(row, "id")?,
        patient_id: take(row, "patient_id")?,
        appointment_id: take(row, "appointment_id")?,
        amount: take_decimal(row, "amount")?,
        status: take_parsed(row, "status")?,
        payment_date: take_opt_datetime(row, "payment_date")?,
        payment_method: take(row, "payment_method")?,
    })
}

fn decode_all<T>(rows: Vec<Row>, decode: fn(&mut Row) -> HospitalResult<T>) -> HospitalResult<Vec<T>> {
    rows.into_iter().map(|mut row| decode(&mut row)).collect()
}

// ==== engine ====

#[derive(Debug, Clone)]
pub struct MySQLStorage {
    pool: Pool,
}

impl MySQLStorage {
    pub fn new(config: &StorageConfig) -> HospitalResult<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            HospitalError::ConfigurationError("DATABASE_URL is required for the mysql storage engine".to_string())
        })?;
        let opts = Opts::from_url(url)
            .map_err(|e| HospitalError::ConfigurationError(format!("Invalid MySQL connection string: {}", e)))?;
        let constraints = PoolConstraints::new(1, config.max_connections.max(1)).unwrap_or_default();
        let builder = OptsBuilder::from_opts(opts).pool_opts(PoolOpts::default().with_constraints(constraints));
        info!("MySQL pool configured with at most {} connections", config.max_connections.max(1));
        Ok(MySQLStorage { pool: Pool::new(builder) })
    }

    pub async fn disconnect(self) -> HospitalResult<()> {
        self.pool.disconnect().await.map_err(storage_error)
    }
}

#[async_trait]
impl HospitalStorage for MySQLStorage {
    async fn begin(&self) -> HospitalResult<Box<dyn StorageTransaction>> {
        let tx = self.pool.start_transaction(TxOpts::default()).await.map_err(storage_error)?;
        Ok(Box::new(MySQLTransaction { tx }))
    }

    async fn init_schema(&self) -> HospitalResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(storage_error)?;
        for statement in SCHEMA_STATEMENTS {
            conn.query_drop(*statement).await.map_err(storage_error)?;
        }
        info!("MySQL schema is up to date ({} tables)", SCHEMA_STATEMENTS.len());
        Ok(())
    }

    async fn ping(&self) -> HospitalResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(storage_error)?;
        conn.ping().await.map_err(storage_error)
    }

    fn engine_type(&self) -> StorageEngineType {
        StorageEngineType::MySQL
    }
}

pub struct MySQLTransaction {
    tx: Transaction<'static>,
}

impl MySQLTransaction {
    async fn first<P>(&mut self, sql: String, params: P) -> HospitalResult<Option<Row>>
    where
        P: Into<Params> + Send,
    {
        let params: Params = params.into();
        debug!("mysql: {}", sql);
        self.tx.exec_first::<Row, _, _>(sql, params).await.map_err(storage_error)
    }

    async fn all<P>(&mut self, sql: String, params: P) -> HospitalResult<Vec<Row>>
    where
        P: Into<Params> + Send,
    {
        let params: Params = params.into();
        debug!("mysql: {}", sql);
        self.tx.exec::<Row, _, _>(sql, params).await.map_err(storage_error)
    }

    async fn run<P>(&mut self, sql: &'static str, params: P) -> HospitalResult<()>
    where
        P: Into<Params> + Send,
    {
        let params: Params = params.into();
        debug!("mysql: {}", sql);
        self.tx.exec_drop(sql, params).await.map_err(storage_error)
    }

    async fn first_slot<P>(&mut self, sql: String, params: P, taken: &'static str) -> HospitalResult<Option<Row>>
    where
        P: Into<Params> + Send,
    {
        let params: Params = params.into();
        debug!("mysql: {}", sql);
        self.tx.exec_first::<Row, _, _>(sql, params).await.map_err(|e| slot_error(e, taken))
    }

    fn inserted_id(&self) -> HospitalResult<i64> {
        self.tx
            .last_insert_id()
            .map(|id| id as i64)
            .ok_or_else(|| HospitalError::StorageError("Insert did not report an id".to_string()))
    }

    async fn count(&mut self, table: &str) -> HospitalResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: Option<u64> = self.tx.exec_first(sql, ()).await.map_err(storage_error)?;
        Ok(count.unwrap_or(0))
    }

    async fn one<T>(&mut self, sql: String, id: i64, decode: fn(&mut Row) -> HospitalResult<T>) -> HospitalResult<Option<T>> {
        match self.first(sql, (id,)).await? {
            Some(mut row) => decode(&mut row).map(Some),
            None => Ok(None),
        }
    }

    async fn must<T>(&mut self, sql: String, id: i64, entity: &str, decode: fn(&mut Row) -> HospitalResult<T>) -> HospitalResult<T> {
        self.one(sql, id, decode)
            .await?
            .ok_or_else(|| HospitalError::NotFound(format!("{} {} not found", entity, id)))
    }
}

fn by_id(columns: &str, table: &str) -> String {
    format!("SELECT {} FROM {} WHERE id = ?", columns, table)
}

#[async_trait]
impl StorageTransaction for MySQLTransaction {
    async fn insert_user(&mut self, user: NewUser) -> HospitalResult<User> {
        self.run(
            "INSERT INTO users (name, email, password, phone, role) VALUES (?, ?, ?, ?, ?)",
            (user.name.clone(), user.email.clone(), user.password_hash, user.phone.clone(), user.role.as_str()),
        )
        .await?;
        let id = self.inserted_id()?;
        Ok(User { id, name: user.name, email: user.email, phone: user.phone, role: user.role })
    }

    async fn find_user_by_email(&mut self, email: &str) -> HospitalResult<Option<UserCredentials>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        match self.first(sql, (email,)).await? {
            Some(mut row) => user_from_row(&mut row).map(Some),
            None => Ok(None),
        }
    }

    async fn get_user(&mut self, id: i64) -> HospitalResult<Option<User>> {
        Ok(self.one(by_id(USER_COLUMNS, "users"), id, user_from_row).await?.map(|c| c.user))
    }

    async fn update_user_contact(&mut self, id: i64, name: Option<String>, phone: Option<String>) -> HospitalResult<()> {
        self.run(
            "UPDATE users SET name = COALESCE(?, name), phone = COALESCE(?, phone) WHERE id = ?",
            (name, phone, id),
        )
        .await
    }

    async fn delete_user(&mut self, id: i64) -> HospitalResult<()> {
        self.run("DELETE FROM users WHERE id = ?", (id,)).await?;
        if self.tx.affected_rows() == 0 {
            return Err(HospitalError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    async fn insert_patient(&mut self, patient: NewPatient) -> HospitalResult<Patient> {
        self.run(
            "INSERT INTO patients (user_id, dob, gender) VALUES (?, ?, ?)",
            (
                patient.user_id,
                patient.dob.map(|d| d.format(DATE_FORMAT).to_string()),
                patient.gender.clone(),
            ),
        )
        .await?;
        let id = self.inserted_id()?;
        Ok(Patient { id, user_id: patient.user_id, dob: patient.dob, gender: patient.gender })
    }

    async fn get_patient(&mut self, id: i64) -> HospitalResult<Option<Patient>> {
        self.one(by_id(PATIENT_COLUMNS, "patients"), id, patient_from_row).await
    }

    async fn find_patient_by_user(&mut self, user_id: i64) -> HospitalResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE user_id = ?", PATIENT_COLUMNS);
        self.one(sql, user_id, patient_from_row).await
    }

    async fn list_patients(&mut self) -> HospitalResult<Vec<Patient>> {
        let rows = self.all(format!("SELECT {} FROM patients ORDER BY id", PATIENT_COLUMNS), ()).await?;
        decode_all(rows, patient_from_row)
    }

    async fn count_patients(&mut self) -> HospitalResult<u64> {
        self.count("patients").await
    }

    async fn insert_doctor(&mut self, doctor: NewDoctor) -> HospitalResult<Doctor> {
        self.run(
            "INSERT INTO doctors (user_id, department_id, specialization, fees) VALUES (?, ?, ?, ?)",
            (doctor.user_id, doctor.department_id, doctor.specialization, to_money(doctor.fees).to_string()),
        )
        .await?;
        let id = self.inserted_id()?;
        self.must(by_id(DOCTOR_COLUMNS, "doctors"), id, "Doctor", doctor_from_row).await
    }

    async fn get_doctor(&mut self, id: i64) -> HospitalResult<Option<Doctor>> {
        self.one(by_id(DOCTOR_COLUMNS, "doctors"), id, doctor_from_row).await
    }

    async fn find_doctor_by_user(&mut self, user_id: i64) -> HospitalResult<Option<Doctor>> {
        let sql = format!("SELECT {} FROM doctors WHERE user_id = ?", DOCTOR_COLUMNS);
        self.one(sql, user_id, doctor_from_row).await
    }

    async fn update_doctor(&mut self, id: i64, update: DoctorUpdate) -> HospitalResult<Doctor> {
        self.run(
            "UPDATE doctors SET department_id = COALESCE(?, department_id), \
             specialization = COALESCE(?, specialization), fees = COALESCE(?, fees) WHERE id = ?",
            (
                update.department_id,
                update.specialization,
                update.fees.map(|fees| to_money(fees).to_string()),
                id,
            ),
        )
        .await?;
        self.must(by_id(DOCTOR_COLUMNS, "doctors"), id, "Doctor", doctor_from_row).await
    }

    async fn list_doctors(&mut self) -> HospitalResult<Vec<Doctor>> {
        let rows = self.all(format!("SELECT {} FROM doctors ORDER BY id", DOCTOR_COLUMNS), ()).await?;
        decode_all(rows, doctor_from_row)
    }

    async fn count_doctors(&mut self) -> HospitalResult<u64> {
        self.count("doctors").await
    }

    async fn upsert_schedule(&mut self, doctor_id: i64, entry: ScheduleEntry) -> HospitalResult<DoctorSchedule> {
        self.run(
            "INSERT INTO doctor_schedules (doctor_id, day_of_week, start_time, end_time, is_available) \
             VALUES (?, ?, ?, ?, ?) ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id), \
             start_time = VALUES(start_time), end_time = VALUES(end_time), is_available = VALUES(is_available)",
            (
                doctor_id,
                entry.day_of_week.as_str(),
                entry.start_time.format(TIME_FORMAT).to_string(),
                entry.end_time.format(TIME_FORMAT).to_string(),
                entry.is_available,
            ),
        )
        .await?;
        let id = self.inserted_id()?;
        self.must(by_id(SCHEDULE_COLUMNS, "doctor_schedules"), id, "Schedule", schedule_from_row).await
    }

    async fn list_schedules(&mut self, doctor_id: i64) -> HospitalResult<Vec<DoctorSchedule>> {
        let sql = format!(
            "SELECT {} FROM doctor_schedules WHERE doctor_id = ? ORDER BY day_of_week",
            SCHEDULE_COLUMNS
        );
        let rows = self.all(sql, (doctor_id,)).await?;
        decode_all(rows, schedule_from_row)
    }

    async fn insert_department(&mut self, department: NewDepartment) -> HospitalResult<Department> {
        self.run(
            "INSERT INTO departments (name, description, image) VALUES (?, ?, ?)",
            (department.name.clone(), department.description.clone(), department.image.clone()),
        )
        .await?;
        let id = self.inserted_id()?;
        Ok(Department { id, name: department.name, description: department.description, image: department.image })
    }

    async fn get_department(&mut self, id: i64) -> HospitalResult<Option<Department>> {
        self.one(by_id(DEPARTMENT_COLUMNS, "departments"), id, department_from_row).await
    }

    async fn list_departments(&mut self) -> HospitalResult<Vec<Department>> {
        let rows = self.all(format!("SELECT {} FROM departments ORDER BY id", DEPARTMENT_COLUMNS), ()).await?;
        decode_all(rows, department_from_row)
    }

    async fn find_or_create_medicine(&mut self, name: &str) -> HospitalResult<Medicine> {
        self.run(
            "INSERT INTO medicines (name) VALUES (?) ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)",
            (name,),
        )
        .await?;
        let id = self.inserted_id()?;
        self.must(by_id(MEDICINE_COLUMNS, "medicines"), id, "Medicine", medicine_from_row).await
    }

    async fn get_medicine(&mut self, id: i64) -> HospitalResult<Option<Medicine>> {
        self.one(by_id(MEDICINE_COLUMNS, "medicines"), id, medicine_from_row).await
    }

    async fn list_medicines(&mut self) -> HospitalResult<Vec<Medicine>> {
        let rows = self.all(format!("SELECT {} FROM medicines ORDER BY name", MEDICINE_COLUMNS), ()).await?;
        decode_all(rows, medicine_from_row)
    }

    async fn find_or_create_lab_test_catalog(&mut self, test_name: &str, price: Decimal) -> HospitalResult<LabTestCatalogEntry> {
        self.run(
            "INSERT INTO lab_test_catalog (test_name, price) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)",
            (test_name, to_money(price).to_string()),
        )
        .await?;
        let id = self.inserted_id()?;
        self.must(by_id(CATALOG_COLUMNS, "lab_test_catalog"), id, "Lab test catalog entry", catalog_from_row).await
    }

    async fn get_lab_test_catalog(&mut self, id: i64) -> HospitalResult<Option<LabTestCatalogEntry>> {
        self.one(by_id(CATALOG_COLUMNS, "lab_test_catalog"), id, catalog_from_row).await
    }

    async fn list_lab_test_catalog(&mut self) -> HospitalResult<Vec<LabTestCatalogEntry>> {
        let rows = self
            .all(format!("SELECT {} FROM lab_test_catalog ORDER BY test_name", CATALOG_COLUMNS), ())
            .await?;
        decode_all(rows, catalog_from_row)
    }

    async fn find_active_doctor_slot(&mut self, doctor_id: i64, date: NaiveDate, time: NaiveTime) -> HospitalResult<Option<Appointment>> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE doctor_id = ? AND appointment_date = ? \
             AND appointment_time = ? AND status IN ('pending', 'confirmed') LIMIT 1 FOR UPDATE",
            APPOINTMENT_COLUMNS
        );
        let params = (doctor_id, date.format(DATE_FORMAT).to_string(), time.format(TIME_FORMAT).to_string());
        match self.first_slot(sql, params, DOCTOR_SLOT_TAKEN).await? {
            Some(mut row) => appointment_from_row(&mut row).map(Some),
            None => Ok(None),
        }
    }

    async fn find_active_patient_slot(&mut self, patient_id: i64, date: NaiveDate, time: NaiveTime) -> HospitalResult<Option<Appointment>> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE patient_id = ? AND appointment_date = ? \
             AND appointment_time = ? AND status IN ('pending', 'confirmed') LIMIT 1 FOR UPDATE",
            APPOINTMENT_COLUMNS
        );
        let params = (patient_id, date.format(DATE_FORMAT).to_string(), time.format(TIME_FORMAT).to_string());
        match self.first_slot(sql, params, PATIENT_SLOT_TAKEN).await? {
            Some(mut row) => appointment_from_row(&mut row).map(Some),
            None => Ok(None),
        }
    }

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> HospitalResult<Appointment> {
        let params: Params = (
            appointment.patient_id,
            appointment.doctor_id,
            appointment.appointment_date.format(DATE_FORMAT).to_string(),
            appointment.appointment_time.format(TIME_FORMAT).to_string(),
            appointment.reason,
            format_utc_datetime(&Utc::now()),
        )
            .into();
        // A duplicate names its key; a deadlock means the doctor slot was contended.
        self.tx
            .exec_drop(
                "INSERT INTO appointments (patient_id, doctor_id, appointment_date, appointment_time, status, reason, created_at) \
                 VALUES (?, ?, ?, ?, 'pending', ?, ?)",
                params,
            )
            .await
            .map_err(|e| slot_error(e, DOCTOR_SLOT_TAKEN))?;
        let id = self.inserted_id()?;
        self.must(by_id(APPOINTMENT_COLUMNS, "appointments"), id, "Appointment", appointment_from_row).await
    }

    async fn get_appointment(&mut self, id: i64) -> HospitalResult<Option<Appointment>> {
        self.one(by_id(APPOINTMENT_COLUMNS, "appointments"), id, appointment_from_row).await
    }

    async fn set_appointment_status(&mut self, id: i64, status: AppointmentStatus) -> HospitalResult<Appointment> {
        self.run("UPDATE appointments SET status = ? WHERE id = ?", (status.as_str(), id)).await?;
        self.must(by_id(APPOINTMENT_COLUMNS, "appointments"), id, "Appointment", appointment_from_row).await
    }

    async fn list_appointments(&mut self, filter: AppointmentFilter) -> HospitalResult<Vec<Appointment>> {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(patient_id) = filter.patient_id {
            clauses.push("patient_id = ?");
            params.push(Value::from(patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            clauses.push("doctor_id = ?");
            params.push(Value::from(doctor_id));
        }
        let mut sql = format!("SELECT {} FROM appointments", APPOINTMENT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        let rows = self.all(sql, positional(params)).await?;
        decode_all(rows, appointment_from_row)
    }

    async fn latest_billable_appointment(&mut self, patient_id: i64, doctor_id: i64) -> HospitalResult<Option<Appointment>> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE patient_id = ? AND doctor_id = ? \
             AND status IN ('pending', 'confirmed', 'completed') ORDER BY created_at DESC, id DESC LIMIT 1",
            APPOINTMENT_COLUMNS
        );
        match self.first(sql, (patient_id, doctor_id)).await? {
            Some(mut row) => appointment_from_row(&mut row).map(Some),
            None => Ok(None),
        }
    }

    async fn count_appointments(&mut self) -> HospitalResult<u64> {
        self.count("appointments").await
    }

    async fn find_prescription_by_appointment(&mut self, appointment_id: i64) -> HospitalResult<Option<Prescription>> {
        let sql = format!("SELECT {} FROM prescriptions WHERE appointment_id = ?", PRESCRIPTION_COLUMNS);
        self.one(sql, appointment_id, prescription_from_row).await
    }

    async fn insert_prescription(&mut self, prescription: NewPrescription) -> HospitalResult<Prescription> {
        self.run(
            "INSERT INTO prescriptions (appointment_id, diagnosis, instructions, date) VALUES (?, ?, ?, ?)",
            (
                prescription.appointment_id,
                prescription.diagnosis.clone(),
                prescription.instructions.clone(),
                prescription.date.format(DATE_FORMAT).to_string(),
            ),
        )
        .await?;
        let id = self.inserted_id()?;
        Ok(Prescription {
            id,
            appointment_id: prescription.appointment_id,
            diagnosis: prescription.diagnosis,
            instructions: prescription.instructions,
            date: prescription.date,
        })
    }

    async fn insert_prescription_medicine(&mut self, line: NewPrescriptionMedicine) -> HospitalResult<PrescriptionMedicine> {
        self.run(
            "INSERT INTO prescription_medicines (prescription_id, medicine_id, dosage, duration) VALUES (?, ?, ?, ?)",
            (line.prescription_id, line.medicine_id, line.dosage.clone(), line.duration.clone()),
        )
        .await?;
        let id = self.inserted_id()?;
        Ok(PrescriptionMedicine {
            id,
            prescription_id: line.prescription_id,
            medicine_id: line.medicine_id,
            dosage: line.dosage,
            frequency: None,
            duration: line.duration,
            instructions: None,
        })
    }

    async fn list_prescription_medicines(&mut self, prescription_id: i64) -> HospitalResult<Vec<PrescriptionMedicine>> {
        let sql = format!(
            "SELECT {} FROM prescription_medicines WHERE prescription_id = ? ORDER BY id",
            LINE_COLUMNS
        );
        let rows = self.all(sql, (prescription_id,)).await?;
        decode_all(rows, line_from_row)
    }

    async fn insert_lab_test(&mut self, lab_test: NewLabTest) -> HospitalResult<LabTest> {
        self.run(
            "INSERT INTO lab_tests (patient_id, doctor_id, lab_test_catalog_id, test_date, status, notes, created_at) \
             VALUES (?, ?, ?, ?, 'ordered', ?, ?)",
            (
                lab_test.patient_id,
                lab_test.doctor_id,
                lab_test.lab_test_catalog_id,
                lab_test.test_date.format(DATE_FORMAT).to_string(),
                lab_test.notes,
                format_utc_datetime(&Utc::now()),
            ),
        )
        .await?;
        let id = self.inserted_id()?;
        self.must(by_id(LAB_TEST_COLUMNS, "lab_tests"), id, "Lab test", lab_test_from_row).await
    }

    async fn get_lab_test(&mut self, id: i64) -> HospitalResult<Option<LabTest>> {
        self.one(by_id(LAB_TEST_COLUMNS, "lab_tests"), id, lab_test_from_row).await
    }

    async fn update_lab_test(&mut self, id: i64, update: LabTestUpdate) -> HospitalResult<LabTest> {
        let result_data = update.result_data.map(|data| serde_json::to_string(&data)).transpose()?;
        self.run(
            "UPDATE lab_tests SET result_url = COALESCE(?, result_url), \
             result_data = COALESCE(?, result_data), status = COALESCE(?, status) WHERE id = ?",
            (update.result_url, result_data, update.status.map(|s| s.as_str()), id),
        )
        .await?;
        self.must(by_id(LAB_TEST_COLUMNS, "lab_tests"), id, "Lab test", lab_test_from_row).await
    }

    async fn list_lab_tests(&mut self, filter: LabTestFilter) -> HospitalResult<Vec<LabTest>> {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(patient_id) = filter.patient_id {
            clauses.push("patient_id = ?");
            params.push(Value::from(patient_id));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            params.push(Value::from(status.as_str()));
        }
        let mut sql = format!("SELECT {} FROM lab_tests", LAB_TEST_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        let rows = self.all(sql, positional(params)).await?;
        decode_all(rows, lab_test_from_row)
    }

    async fn find_bill_by_appointment(&mut self, appointment_id: i64) -> HospitalResult<Option<Bill>> {
        let sql = format!("SELECT {} FROM bills WHERE appointment_id = ? FOR UPDATE", BILL_COLUMNS);
        self.one(sql, appointment_id, bill_from_row).await
    }

    async fn insert_bill(&mut self, bill: NewBill) -> HospitalResult<Bill> {
        self.run(
            "INSERT INTO bills (patient_id, appointment_id, amount, status) VALUES (?, ?, ?, 'unpaid')",
            (bill.patient_id, bill.appointment_id, to_money(bill.amount).to_string()),
        )
        .await?;
        let id = self.inserted_id()?;
        self.must(by_id(BILL_COLUMNS, "bills"), id, "Bill", bill_from_row).await
    }

    async fn set_bill_amount(&mut self, id: i64, amount: Decimal) -> HospitalResult<Bill> {
        self.run("UPDATE bills SET amount = ? WHERE id = ?", (to_money(amount).to_string(), id)).await?;
        self.must(by_id(BILL_COLUMNS, "bills"), id, "Bill", bill_from_row).await
    }

    async fn mark_bill_paid(&mut self, id: i64, method: &str, paid_at: DateTime<Utc>) -> HospitalResult<Bill> {
        self.run(
            "UPDATE bills SET status = 'paid', payment_date = ?, payment_method = ? WHERE id = ?",
            (format_utc_datetime(&paid_at), method, id),
        )
        .await?;
        self.must(by_id(BILL_COLUMNS, "bills"), id, "Bill", bill_from_row).await
    }

    async fn get_bill(&mut self, id: i64) -> HospitalResult<Option<Bill>> {
        self.one(format!("{} FOR UPDATE", by_id(BILL_COLUMNS, "bills")), id, bill_from_row).await
    }

    async fn list_bills_for_patient(&mut self, patient_id: i64) -> HospitalResult<Vec<Bill>> {
        let sql = format!("SELECT {} FROM bills WHERE patient_id = ? ORDER BY id", BILL_COLUMNS);
        let rows = self.all(sql, (patient_id,)).await?;
        decode_all(rows, bill_from_row)
    }

    async fn sum_paid_bills(&mut self) -> HospitalResult<Decimal> {
        let total: Option<String> = self
            .tx
            .exec_first("SELECT CAST(COALESCE(SUM(amount), 0) AS CHAR) FROM bills WHERE status = 'paid'", ())
            .await
            .map_err(storage_error)?;
        let total = total.unwrap_or_else(|| "0".to_string());
        Decimal::from_str(&total)
            .map(to_money)
            .map_err(|e| HospitalError::StorageError(format!("Bad revenue total: {}", e)))
    }

    async fn commit(self: Box<Self>) -> HospitalResult<()> {
        self.tx.commit().await.map_err(storage_error)
    }
}

fn positional(params: Vec<Value>) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use crate::services::apply_charge;

    #[test]
    fn missing_database_url_is_a_configuration_error() {
        let config = StorageConfig { storage_engine_type: StorageEngineType::MySQL, ..StorageConfig::default() };
        assert!(matches!(MySQLStorage::new(&config), Err(HospitalError::ConfigurationError(_))));
    }

    #[test]
    fn duplicate_keys_map_to_client_wording() {
        assert_eq!(
            duplicate_message("Duplicate entry '3-2030-01-10-09:00:00-1' for key 'appointments.uq_doctor_active_slot'"),
            DOCTOR_SLOT_TAKEN
        );
        assert_eq!(
            duplicate_message("Duplicate entry '5-2030-01-10-09:00:00-1' for key 'uq_patient_active_slot'"),
            PATIENT_SLOT_TAKEN
        );
        assert_eq!(
            duplicate_message("Duplicate entry 'jane@example.com' for key 'users.uq_users_email'"),
            "User already exists"
        );
        assert_eq!(duplicate_message("Duplicate entry '7' for key 'PRIMARY'"), RECORD_EXISTS);
        assert_eq!(duplicate_message("garbled"), RECORD_EXISTS);
    }

    // ==== live database, skipped unless HOSPITAL_DATABASE_URL is set ====

    async fn live_storage() -> Option<Arc<MySQLStorage>> {
        let url = std::env::var("HOSPITAL_DATABASE_URL").ok()?;
        let config = StorageConfig {
            storage_engine_type: StorageEngineType::MySQL,
            database_url: Some(url),
            ..StorageConfig::default()
        };
        let storage = MySQLStorage::new(&config).unwrap();
        storage.init_schema().await.unwrap();
        Some(Arc::new(storage))
    }

    fn new_user(prefix: &str, domain: &str, role: Role) -> NewUser {
        NewUser {
            name: prefix.to_string(),
            email: format!("{}-{}@{}", prefix, uuid::Uuid::new_v4(), domain),
            password_hash: "hash".into(),
            phone: None,
            role,
        }
    }

    struct Fixture {
        doctor_user: i64,
        doctor: Doctor,
        patients: Vec<(i64, Patient)>,
    }

    async fn committed_fixture(storage: &MySQLStorage, patients: usize) -> Fixture {
        let mut tx = storage.begin().await.unwrap();
        let doctor_user = tx.insert_user(new_user("doc", "doctor.com", Role::Doctor)).await.unwrap();
        let doctor = tx.insert_doctor(NewDoctor { user_id: doctor_user.id, fees: dec!(50), ..Default::default() }).await.unwrap();
        let mut created = Vec::new();
        for _ in 0..patients {
            let user = tx.insert_user(new_user("pat", "example.com", Role::Patient)).await.unwrap();
            let patient = tx.insert_patient(NewPatient { user_id: user.id, ..Default::default() }).await.unwrap();
            created.push((user.id, patient));
        }
        tx.commit().await.unwrap();
        Fixture { doctor_user: doctor_user.id, doctor, patients: created }
    }

    async fn remove_fixture(storage: &MySQLStorage, fixture: Fixture) {
        let mut tx = storage.begin().await.unwrap();
        tx.delete_user(fixture.doctor_user).await.unwrap();
        for (user_id, _) in fixture.patients {
            tx.delete_user(user_id).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn slot(patient: &Patient, doctor: &Doctor) -> NewAppointment {
        NewAppointment {
            patient_id: patient.id,
            doctor_id: doctor.id,
            appointment_date: NaiveDate::from_ymd_opt(2031, 3, 4).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn active_slot_is_unique_until_cancelled() {
        let Some(storage) = live_storage().await else { return };
        let fixture = committed_fixture(&storage, 2).await;
        let (first, second) = (&fixture.patients[0].1, &fixture.patients[1].1);

        let mut tx = storage.begin().await.unwrap();
        let booked = tx.insert_appointment(slot(first, &fixture.doctor)).await.unwrap();
        let err = tx.insert_appointment(slot(second, &fixture.doctor)).await.unwrap_err();
        assert_eq!(err, HospitalError::Conflict(DOCTOR_SLOT_TAKEN.into()));

        tx.set_appointment_status(booked.id, AppointmentStatus::Cancelled).await.unwrap();
        let rebooked = tx.insert_appointment(slot(second, &fixture.doctor)).await.unwrap();
        assert_eq!(rebooked.status, AppointmentStatus::Pending);
        tx.commit().await.unwrap();

        remove_fixture(&storage, fixture).await;
    }

    #[tokio::test]
    async fn concurrent_booking_loses_with_client_wording() {
        let Some(storage) = live_storage().await else { return };
        let fixture = committed_fixture(&storage, 2).await;

        let mut winner = storage.begin().await.unwrap();
        winner.insert_appointment(slot(&fixture.patients[0].1, &fixture.doctor)).await.unwrap();

        let contender = {
            let storage = storage.clone();
            let appointment = slot(&fixture.patients[1].1, &fixture.doctor);
            tokio::spawn(async move {
                let mut tx = storage.begin().await.unwrap();
                tx.insert_appointment(appointment).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        winner.commit().await.unwrap();

        let err = contender.await.unwrap().unwrap_err();
        assert_eq!(err, HospitalError::Conflict(DOCTOR_SLOT_TAKEN.into()));

        remove_fixture(&storage, fixture).await;
    }

    #[tokio::test]
    async fn catalog_find_or_create_returns_the_existing_row() {
        let Some(storage) = live_storage().await else { return };
        let name = format!("Medicine {}", uuid::Uuid::new_v4());
        let test_name = format!("Panel {}", uuid::Uuid::new_v4());

        let mut tx = storage.begin().await.unwrap();
        let first = tx.find_or_create_medicine(&name).await.unwrap();
        let second = tx.find_or_create_medicine(&name).await.unwrap();
        assert_eq!(first.id, second.id);

        let panel = tx.find_or_create_lab_test_catalog(&test_name, dec!(20.00)).await.unwrap();
        let again = tx.find_or_create_lab_test_catalog(&test_name, dec!(99.00)).await.unwrap();
        assert_eq!(panel.id, again.id);
        assert_eq!(again.price, dec!(20.00));
    }

    #[tokio::test]
    async fn charges_accumulate_on_one_bill_and_cascade_away() {
        let Some(storage) = live_storage().await else { return };
        let fixture = committed_fixture(&storage, 1).await;

        let mut tx = storage.begin().await.unwrap();
        let appointment = tx.insert_appointment(slot(&fixture.patients[0].1, &fixture.doctor)).await.unwrap();
        apply_charge(tx.as_mut(), &appointment, dec!(50)).await.unwrap();
        apply_charge(tx.as_mut(), &appointment, dec!(20)).await.unwrap();
        let bills = tx.list_bills_for_patient(fixture.patients[0].1.id).await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].amount, dec!(70.00));

        let err = tx
            .insert_bill(NewBill { patient_id: appointment.patient_id, appointment_id: appointment.id, amount: dec!(1) })
            .await
            .unwrap_err();
        assert_eq!(err, HospitalError::Conflict("Bill already exists for this appointment".into()));

        tx.delete_user(fixture.doctor_user).await.unwrap();
        assert!(tx.get_doctor(fixture.doctor.id).await.unwrap().is_none());
        assert!(tx.get_appointment(appointment.id).await.unwrap().is_none());
        assert!(tx.find_bill_by_appointment(appointment.id).await.unwrap().is_none());
        // dropped uncommitted: the fixture rows are removed below
        drop(tx);

        remove_fixture(&storage, fixture).await;
    }
}
