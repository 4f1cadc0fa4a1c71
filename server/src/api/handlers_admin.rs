// server/src/api/handlers_admin.rs

use warp::http::StatusCode;
use models::errors::{HospitalError, HospitalResult};
use models::medical::{LabTest, User};
use models::views::DoctorView;
use super::filters::Services;
use super::payloads::{CreateDoctorBody, DepartmentBody, LabTestQuery, LabTestUpdateBody, UpdateDoctorBody};
use super::reply::{error_reply, message, respond, respond_created, ApiReply};

pub async fn doctors(_user: User, services: Services) -> ApiReply {
    respond(services.admin.list_doctors().await)
}

async fn add_doctor(services: &Services, body: CreateDoctorBody) -> HospitalResult<DoctorView> {
    services.admin.create_doctor(body.into_account()?).await
}

pub async fn create_doctor(_user: User, body: CreateDoctorBody, services: Services) -> ApiReply {
    respond_created(add_doctor(&services, body).await)
}

async fn edit_doctor(services: &Services, doctor_id: i64, body: UpdateDoctorBody) -> HospitalResult<DoctorView> {
    services.admin.update_doctor(doctor_id, body.into_update()?).await
}

pub async fn update_doctor(doctor_id: i64, _user: User, body: UpdateDoctorBody, services: Services) -> ApiReply {
    respond(edit_doctor(&services, doctor_id, body).await)
}

pub async fn delete_doctor(doctor_id: i64, _user: User, services: Services) -> ApiReply {
    Ok(match services.admin.delete_doctor(doctor_id).await {
        Ok(()) => message(StatusCode::OK, true, "Doctor removed"),
        Err(err) => error_reply(&err),
    })
}

pub async fn patients(_user: User, services: Services) -> ApiReply {
    respond(services.admin.list_patients().await)
}

pub async fn appointments(_user: User, services: Services) -> ApiReply {
    respond(services.scheduling.list_all().await)
}

pub async fn departments(_user: User, services: Services) -> ApiReply {
    respond(services.admin.list_departments().await)
}

pub async fn create_department(_user: User, body: DepartmentBody, services: Services) -> ApiReply {
    respond_created(services.admin.create_department(body.into()).await)
}

pub async fn stats(_user: User, services: Services) -> ApiReply {
    respond(services.admin.stats().await)
}

pub async fn lab_tests(query: LabTestQuery, _user: User, services: Services) -> ApiReply {
    let result = match query.status() {
        Ok(status) => services.admin.list_lab_tests(status).await,
        Err(err) => Err(HospitalError::Validation(err)),
    };
    respond(result)
}

async fn edit_lab_test(services: &Services, lab_test_id: i64, body: LabTestUpdateBody) -> HospitalResult<LabTest> {
    services.admin.update_lab_test(lab_test_id, body.into_update()?).await
}

pub async fn update_lab_test(lab_test_id: i64, _user: User, body: LabTestUpdateBody, services: Services) -> ApiReply {
    respond(edit_lab_test(&services, lab_test_id, body).await)
}
