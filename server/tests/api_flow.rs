// server/tests/api_flow.rs
// End-to-end requests through the warp filter tree over in-memory storage.

use std::sync::Arc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::TempDir;
use warp::http::StatusCode;
use warp::{Filter, Reply};
use hospital_server::api::routes;
use lib::config::HospitalConfig;
use lib::services::{AuthSettings, HospitalServices};
use lib::storage_engine::InMemoryStorage;

struct TestApp {
    config: HospitalConfig,
    services: Arc<HospitalServices>,
    _uploads: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = HospitalConfig::default();
        config.uploads.directory = uploads.path().to_path_buf();
        let auth = AuthSettings { bcrypt_cost: 4, ..AuthSettings::with_secret("integration-secret") };
        let services = HospitalServices::new(Arc::new(InMemoryStorage::new()), &auth, uploads.path().to_path_buf());
        TestApp { config, services: Arc::new(services), _uploads: uploads }
    }

    fn filter(&self) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
        routes(self.services.clone(), &self.config)
    }

    async fn call(&self, method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.reply(&self.filter()).await;
        let value = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status(), value)
    }

    async fn sign_up(&self, name: &str, email: &str) -> String {
        let (status, _) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self
            .call("POST", "/api/auth/login", None, Some(json!({ "email": email, "password": "secret123" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn booking_prescribing_and_paying() {
    let app = TestApp::new();
    let patient = app.sign_up("Jane Roe", "jane@example.com").await;
    let doctor = app.sign_up("Gregory House", "house@doctor.com").await;

    let (status, doctors) = app.call("GET", "/api/patient/doctors", Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    let doctor_id = doctors["data"][0]["id"].as_i64().unwrap();

    let booking = json!({
        "doctorId": doctor_id.to_string(),
        "appointmentDate": "2030-01-10",
        "appointmentTime": "09:00",
        "reason": "Headache"
    });
    let (status, booked) = app.call("POST", "/api/patient/appointments", Some(&patient), Some(booking.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booked["data"]["status"], "pending");
    let appointment_id = booked["data"]["id"].as_i64().unwrap();

    let (status, taken) = app.call("POST", "/api/patient/appointments", Some(&patient), Some(booking)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(taken["success"], false);
    assert_eq!(taken["message"], "Doctor is not available at this time");

    let (status, _) = app
        .call(
            "POST",
            "/api/doctor/prescriptions",
            Some(&doctor),
            Some(json!({
                "appointmentId": appointment_id,
                "medicines": [{ "name": "Ibuprofen", "dosage": "200mg", "duration": "5 days" }],
                "instructions": "Diagnosis: Migraine\nRest"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, bills) = app.call("GET", "/api/patient/bills", Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    let bill = &bills["data"][0];
    assert_eq!(amount(&bill["amount"]), Decimal::new(5000, 2));
    assert_eq!(bill["status"], "unpaid");

    let pay_path = format!("/api/patient/bills/{}/pay", bill["id"].as_i64().unwrap());
    let (status, paid) = app.call("PUT", &pay_path, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["data"]["status"], "paid");
    assert_eq!(paid["data"]["paymentMethod"], "Online");

    let (status, again) = app.call("PUT", &pay_path, Some(&patient), Some(json!({ "paymentMethod": "Card" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["message"], "Bill is already paid");

    let (_, appointments) = app.call("GET", "/api/patient/appointments", Some(&patient), None).await;
    assert_eq!(appointments["data"][0]["status"], "completed");
}

#[tokio::test]
async fn missing_or_wrong_credentials_are_rejected() {
    let app = TestApp::new();
    let patient = app.sign_up("Jane Roe", "jane@example.com").await;

    let (status, body) = app.call("GET", "/api/patient/bills", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, no token");

    let (status, _) = app.call("GET", "/api/patient/bills", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call("GET", "/api/doctor/appointments", Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .call("POST", "/api/auth/login", None, Some(json!({ "email": "jane@example.com", "password": "wrong-one" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn duplicate_registration_is_a_bad_request() {
    let app = TestApp::new();
    app.sign_up("Jane Roe", "jane@example.com").await;
    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Jane Again", "email": "jane@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn admin_manages_doctors_and_reads_stats() {
    let app = TestApp::new();
    let admin = app.sign_up("Root", "root@admin.com").await;

    let (status, department) = app
        .call("POST", "/api/admin/departments", Some(&admin), Some(json!({ "name": "Cardiology" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let department_id = department["data"]["id"].as_i64().unwrap();

    let (status, created) = app
        .call(
            "POST",
            "/api/admin/doctors",
            Some(&admin),
            Some(json!({
                "name": "Meredith Grey",
                "email": "grey@doctor.com",
                "password": "secret123",
                "departmentId": department_id,
                "specialization": "Cardiologist",
                "fees": "75.00",
                "schedule": [{ "dayOfWeek": "Monday", "startTime": "09:00", "endTime": "17:00" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let doctor_id = created["data"]["id"].as_i64().unwrap();

    let (status, listed) = app.call("GET", "/api/admin/doctors", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["Department"]["name"], "Cardiology");

    let (status, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["doctors"], 1);
    assert_eq!(amount(&stats["data"]["revenue"]), Decimal::ZERO);

    let (status, _) = app.call("GET", "/api/admin/lab-tests?status=done", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, removed) = app.call("DELETE", &format!("/api/admin/doctors/{}", doctor_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["message"], "Doctor removed");

    let (status, _) = app.call("DELETE", &format!("/api/admin/doctors/{}", doctor_id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lab_result_upload_requires_a_file() {
    let app = TestApp::new();
    let patient = app.sign_up("Jane Roe", "jane@example.com").await;
    let doctor = app.sign_up("Gregory House", "house@doctor.com").await;

    let (_, me) = app.call("GET", "/api/auth/me", Some(&patient), None).await;
    let patient_id = me["data"]["Patient"]["id"].as_i64().unwrap();

    let (status, ordered) = app
        .call(
            "POST",
            "/api/doctor/lab-tests",
            Some(&doctor),
            Some(json!({ "patientId": patient_id, "testName": "Blood Panel" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let upload_path = format!("/api/doctor/lab-tests/{}/result", ordered["data"]["id"].as_i64().unwrap());

    let (status, body) = app.call("POST", &upload_path, Some(&doctor), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please upload a file");

    let boundary = "hospital-boundary";
    let form = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"panel.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n%PDF-1.4 result\r\n--{b}--\r\n",
        b = boundary
    );
    let response = warp::test::request()
        .method("POST")
        .path(&upload_path)
        .header("authorization", format!("Bearer {}", doctor))
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(form)
        .reply(&app.filter())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["resultUrl"].as_str().unwrap().starts_with("uploads/"));
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let app = TestApp::new();

    let (status, health) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "OK");
    assert_eq!(health["environment"], "development");

    let (status, banner) = app.call("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(banner["message"], "Smart Hospital System API is running");

    let (status, body) = app.call("GET", "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
