// lib/src/storage_engine/mysql_schema.rs
// Additive DDL, applied in order. Foreign keys cascade the profile and
// appointment lifecycle deletes; the generated `active_slot` column is NULL
// for completed/cancelled appointments so only pending/confirmed rows compete
// for the unique slot keys.

pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        email VARCHAR(255) NOT NULL,
        password VARCHAR(255) NOT NULL,
        phone VARCHAR(64) NULL,
        role ENUM('admin', 'doctor', 'patient') NOT NULL DEFAULT 'patient',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
        UNIQUE KEY uq_users_email (email)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS departments (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        description TEXT NULL,
        image VARCHAR(1024) NULL,
        UNIQUE KEY uq_departments_name (name)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS patients (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        user_id BIGINT NOT NULL,
        dob DATE NULL,
        gender VARCHAR(32) NULL,
        UNIQUE KEY uq_patients_user (user_id),
        CONSTRAINT fk_patients_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS doctors (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        user_id BIGINT NOT NULL,
        department_id BIGINT NULL,
        specialization VARCHAR(255) NULL,
        fees DECIMAL(10, 2) NOT NULL DEFAULT 0.00,
        UNIQUE KEY uq_doctors_user (user_id),
        CONSTRAINT fk_doctors_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
        CONSTRAINT fk_doctors_department FOREIGN KEY (department_id) REFERENCES departments (id) ON DELETE SET NULL
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS doctor_schedules (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        doctor_id BIGINT NOT NULL,
        day_of_week ENUM('Monday', 'Tuesday', 'Wednesday', 'Thursday', 'Friday', 'Saturday', 'Sunday') NOT NULL,
        start_time TIME NOT NULL,
        end_time TIME NOT NULL,
        is_available BOOLEAN NOT NULL DEFAULT TRUE,
        UNIQUE KEY uq_schedule_day (doctor_id, day_of_week),
        CONSTRAINT fk_schedules_doctor FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS medicines (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        generic_name VARCHAR(255) NULL,
        manufacturer VARCHAR(255) NULL,
        category VARCHAR(255) NULL,
        unit_price DECIMAL(10, 2) NULL,
        description TEXT NULL,
        UNIQUE KEY uq_medicines_name (name)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS lab_test_catalog (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        test_name VARCHAR(255) NOT NULL,
        test_code VARCHAR(64) NULL,
        category VARCHAR(255) NULL,
        price DECIMAL(10, 2) NOT NULL DEFAULT 20.00,
        description TEXT NULL,
        normal_range VARCHAR(255) NULL,
        sample_type VARCHAR(255) NULL,
        UNIQUE KEY uq_lab_catalog_name (test_name),
        UNIQUE KEY uq_lab_catalog_code (test_code)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS appointments (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        patient_id BIGINT NOT NULL,
        doctor_id BIGINT NOT NULL,
        appointment_date DATE NOT NULL,
        appointment_time TIME NOT NULL,
        status ENUM('pending', 'confirmed', 'completed', 'cancelled') NOT NULL DEFAULT 'pending',
        reason TEXT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        active_slot TINYINT GENERATED ALWAYS AS (IF(status IN ('pending', 'confirmed'), 1, NULL)) STORED,
        UNIQUE KEY uq_doctor_active_slot (doctor_id, appointment_date, appointment_time, active_slot),
        UNIQUE KEY uq_patient_active_slot (patient_id, appointment_date, appointment_time, active_slot),
        CONSTRAINT fk_appointments_patient FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE,
        CONSTRAINT fk_appointments_doctor FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS prescriptions (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        appointment_id BIGINT NOT NULL,
        diagnosis TEXT NULL,
        instructions TEXT NULL,
        date DATE NOT NULL,
        UNIQUE KEY uq_prescriptions_appointment (appointment_id),
        CONSTRAINT fk_prescriptions_appointment FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS prescription_medicines (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        prescription_id BIGINT NOT NULL,
        medicine_id BIGINT NOT NULL,
        dosage VARCHAR(255) NULL,
        frequency VARCHAR(255) NULL,
        duration VARCHAR(255) NULL,
        instructions TEXT NULL,
        CONSTRAINT fk_lines_prescription FOREIGN KEY (prescription_id) REFERENCES prescriptions (id) ON DELETE CASCADE,
        CONSTRAINT fk_lines_medicine FOREIGN KEY (medicine_id) REFERENCES medicines (id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS lab_tests (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        patient_id BIGINT NOT NULL,
        doctor_id BIGINT NOT NULL,
        lab_test_catalog_id BIGINT NOT NULL,
        test_date DATE NOT NULL,
        result_url VARCHAR(1024) NULL,
        result_data JSON NULL,
        status ENUM('ordered', 'in-progress', 'completed', 'cancelled') NOT NULL DEFAULT 'ordered',
        notes TEXT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        CONSTRAINT fk_lab_tests_patient FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE,
        CONSTRAINT fk_lab_tests_doctor FOREIGN KEY (doctor_id) REFERENCES doctors (id) ON DELETE CASCADE,
        CONSTRAINT fk_lab_tests_catalog FOREIGN KEY (lab_test_catalog_id) REFERENCES lab_test_catalog (id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
    r#"CREATE TABLE IF NOT EXISTS bills (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        patient_id BIGINT NOT NULL,
        appointment_id BIGINT NOT NULL,
        amount DECIMAL(10, 2) NOT NULL,
        status ENUM('unpaid', 'paid') NOT NULL DEFAULT 'unpaid',
        payment_date DATETIME NULL,
        payment_method VARCHAR(64) NULL,
        UNIQUE KEY uq_bills_appointment (appointment_id),
        CONSTRAINT fk_bills_patient FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE,
        CONSTRAINT fk_bills_appointment FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE CASCADE
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_additive_only() {
        for statement in SCHEMA_STATEMENTS {
            assert!(statement.trim_start().starts_with("CREATE TABLE IF NOT EXISTS"));
            assert!(!statement.to_uppercase().contains("DROP "));
        }
    }

    #[test]
    fn parents_are_created_before_children() {
        let position = |table: &str| {
            SCHEMA_STATEMENTS
                .iter()
                .position(|s| s.contains(&format!("EXISTS {} (", table)))
                .unwrap()
        };
        assert!(position("users") < position("doctors"));
        assert!(position("appointments") < position("bills"));
        assert!(position("prescriptions") < position("prescription_medicines"));
    }
}
