// server/src/api/mod.rs
// HTTP surface: route table, CORS, access log and rejection recovery.

use std::convert::Infallible;
use std::time::Instant;
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::multipart::FormData;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};
use lib::config::HospitalConfig;
use models::medical::Role;

pub mod filters;
pub mod handlers_admin;
pub mod handlers_auth;
pub mod handlers_doctor;
pub mod handlers_patient;
pub mod payloads;
pub mod reply;

pub use filters::{authenticated, with_role, with_services, Services};
pub use reply::handle_rejection;

use filters::{json_body, optional_json};
use payloads::{LabTestQuery, PaymentBody};

/// The complete application, ready for `warp::serve`.
pub fn routes(
    services: Services,
    config: &HospitalConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api").and(
        auth_routes(services.clone())
            .or(admin_routes(services.clone()))
            .or(doctor_routes(services.clone(), config.uploads.max_file_size))
            .or(patient_routes(services.clone()))
            .or(catalog_routes(services)),
    );

    system_routes(config)
        .or(api)
        .or(warp::path("uploads").and(warp::fs::dir(config.uploads.directory.clone())))
        .with(cors(config))
        .recover(handle_rejection)
        .with(warp::log::custom(|info| {
            info!(
                "{} {} - {} - {:?}",
                info.method(),
                info.path(),
                info.status().as_u16(),
                info.elapsed()
            );
        }))
}

fn system_routes(config: &HospitalConfig) -> BoxedFilter<(Json,)> {
    let started = Instant::now();
    let environment = config.environment.clone();

    let banner = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "message": "Smart Hospital System API is running" })));

    let health = warp::path!("health").and(warp::get()).map(move || {
        warp::reply::json(&json!({
            "status": "OK",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "environment": environment,
            "uptime": started.elapsed().as_secs_f64(),
        }))
    });

    banner.or(health).unify().boxed()
}

fn auth_routes(services: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(json_body())
        .and(with_services(services.clone()))
        .and_then(handlers_auth::register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_services(services.clone()))
        .and_then(handlers_auth::login);

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(authenticated(services.clone()))
        .and(with_services(services))
        .and_then(handlers_auth::me);

    register.or(login).unify().or(me).unify().boxed()
}

fn catalog_routes(services: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let medicines = warp::path!("catalog" / "medicines")
        .and(warp::get())
        .and(authenticated(services.clone()))
        .and(with_services(services.clone()))
        .and_then(handlers_auth::medicines);

    let lab_tests = warp::path!("catalog" / "lab-tests")
        .and(warp::get())
        .and(authenticated(services.clone()))
        .and(with_services(services))
        .and_then(handlers_auth::lab_test_catalog);

    medicines.or(lab_tests).unify().boxed()
}

fn admin_routes(services: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let admin = || with_role(Role::Admin, services.clone());
    let svc = || with_services(services.clone());

    let doctors = warp::path!("admin" / "doctors")
        .and(warp::get())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::doctors);

    let create_doctor = warp::path!("admin" / "doctors")
        .and(warp::post())
        .and(admin())
        .and(json_body())
        .and(svc())
        .and_then(handlers_admin::create_doctor);

    let update_doctor = warp::path!("admin" / "doctors" / i64)
        .and(warp::put())
        .and(admin())
        .and(json_body())
        .and(svc())
        .and_then(handlers_admin::update_doctor);

    let delete_doctor = warp::path!("admin" / "doctors" / i64)
        .and(warp::delete())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::delete_doctor);

    let patients = warp::path!("admin" / "patients")
        .and(warp::get())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::patients);

    let appointments = warp::path!("admin" / "appointments")
        .and(warp::get())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::appointments);

    let departments = warp::path!("admin" / "departments")
        .and(warp::get())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::departments);

    let create_department = warp::path!("admin" / "departments")
        .and(warp::post())
        .and(admin())
        .and(json_body())
        .and(svc())
        .and_then(handlers_admin::create_department);

    let stats = warp::path!("admin" / "stats")
        .and(warp::get())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::stats);

    let lab_tests = warp::path!("admin" / "lab-tests")
        .and(warp::get())
        .and(warp::query::<LabTestQuery>())
        .and(admin())
        .and(svc())
        .and_then(handlers_admin::lab_tests);

    let update_lab_test = warp::path!("admin" / "lab-tests" / i64)
        .and(warp::put())
        .and(admin())
        .and(json_body())
        .and(svc())
        .and_then(handlers_admin::update_lab_test);

    doctors
        .or(create_doctor)
        .unify()
        .or(update_doctor)
        .unify()
        .or(delete_doctor)
        .unify()
        .or(patients)
        .unify()
        .or(appointments)
        .unify()
        .or(departments)
        .unify()
        .or(create_department)
        .unify()
        .or(stats)
        .unify()
        .or(lab_tests)
        .unify()
        .or(update_lab_test)
        .unify()
        .boxed()
}

/// Multipart form when the request carries one. Oversized uploads still
/// reject so the client sees "File too large".
fn optional_form(max_file_size: u64) -> impl Filter<Extract = (Option<FormData>,), Error = Rejection> + Clone {
    warp::multipart::form()
        .max_length(max_file_size)
        .map(Some)
        .or_else(|rejection: Rejection| async move {
            if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
                Err(rejection)
            } else {
                Ok((None::<FormData>,))
            }
        })
}

fn doctor_routes(services: Services, max_file_size: u64) -> BoxedFilter<(WithStatus<Json>,)> {
    let doctor = || with_role(Role::Doctor, services.clone());
    let svc = || with_services(services.clone());

    let appointments = warp::path!("doctor" / "appointments")
        .and(warp::get())
        .and(doctor())
        .and(svc())
        .and_then(handlers_doctor::appointments);

    let patients = warp::path!("doctor" / "patients")
        .and(warp::get())
        .and(doctor())
        .and(svc())
        .and_then(handlers_doctor::patients);

    let patient_details = warp::path!("doctor" / "patients" / i64)
        .and(warp::get())
        .and(doctor())
        .and(svc())
        .and_then(handlers_doctor::patient_details);

    let prescriptions = warp::path!("doctor" / "prescriptions")
        .and(warp::post())
        .and(doctor())
        .and(json_body())
        .and(svc())
        .and_then(handlers_doctor::create_prescription);

    let lab_tests = warp::path!("doctor" / "lab-tests")
        .and(warp::post())
        .and(doctor())
        .and(json_body())
        .and(svc())
        .and_then(handlers_doctor::recommend_lab_test);

    let upload = warp::path!("doctor" / "lab-tests" / i64 / "result")
        .and(warp::post())
        .and(doctor())
        .and(optional_form(max_file_size))
        .and(svc())
        .and_then(handlers_doctor::upload_lab_result);

    appointments
        .or(patients)
        .unify()
        .or(patient_details)
        .unify()
        .or(prescriptions)
        .unify()
        .or(lab_tests)
        .unify()
        .or(upload)
        .unify()
        .boxed()
}

fn patient_routes(services: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let patient = || with_role(Role::Patient, services.clone());
    let svc = || with_services(services.clone());

    let doctors = warp::path!("patient" / "doctors")
        .and(warp::get())
        .and(patient())
        .and(svc())
        .and_then(handlers_patient::doctors);

    let appointments = warp::path!("patient" / "appointments")
        .and(warp::get())
        .and(patient())
        .and(svc())
        .and_then(handlers_patient::appointments);

    let book = warp::path!("patient" / "appointments")
        .and(warp::post())
        .and(patient())
        .and(json_body())
        .and(svc())
        .and_then(handlers_patient::book_appointment);

    let cancel = warp::path!("patient" / "appointments" / i64 / "cancel")
        .and(warp::put())
        .and(patient())
        .and(svc())
        .and_then(handlers_patient::cancel_appointment);

    let prescriptions = warp::path!("patient" / "prescriptions")
        .and(warp::get())
        .and(patient())
        .and(svc())
        .and_then(handlers_patient::prescriptions);

    let lab_tests = warp::path!("patient" / "lab-tests")
        .and(warp::get())
        .and(patient())
        .and(svc())
        .and_then(handlers_patient::lab_tests);

    let bills = warp::path!("patient" / "bills")
        .and(warp::get())
        .and(patient())
        .and(svc())
        .and_then(handlers_patient::bills);

    let pay = warp::path!("patient" / "bills" / i64 / "pay")
        .and(warp::put())
        .and(patient())
        .and(optional_json::<PaymentBody>())
        .and(svc())
        .and_then(handlers_patient::pay_bill);

    doctors
        .or(appointments)
        .unify()
        .or(book)
        .unify()
        .or(cancel)
        .unify()
        .or(prescriptions)
        .unify()
        .or(lab_tests)
        .unify()
        .or(bills)
        .unify()
        .or(pay)
        .unify()
        .boxed()
}

fn valid_origin(origin: &str) -> bool {
    origin
        .parse::<warp::http::Uri>()
        .map(|uri| uri.scheme().is_some() && uri.host().is_some())
        .unwrap_or(false)
}

fn cors(config: &HospitalConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["authorization", "content-type"]);

    if config.is_development() {
        return builder.allow_any_origin();
    }

    let origins: Vec<&str> = config
        .server
        .allowed_origins
        .iter()
        .map(String::as_str)
        .filter(|origin| {
            let ok = valid_origin(origin);
            if !ok {
                warn!("Ignoring malformed CORS origin {:?}", origin);
            }
            ok
        })
        .collect();
    builder.allow_origins(origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_need_scheme_and_host() {
        assert!(valid_origin("http://localhost:5173"));
        assert!(valid_origin("https://hospital.example.org"));
        assert!(!valid_origin("localhost:5173"));
        assert!(!valid_origin("*"));
    }
}
