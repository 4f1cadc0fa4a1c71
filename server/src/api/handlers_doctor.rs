// server/src/api/handlers_doctor.rs

use bytes::BufMut;
use futures::TryStreamExt;
use warp::multipart::FormData;
use models::errors::{HospitalError, HospitalResult};
use models::medical::{LabTest, Prescription, User};
use lib::services::LabResultUpload;
use super::filters::Services;
use super::payloads::{LabTestBody, PrescriptionBody};
use super::reply::{respond, respond_created, ApiReply};

const FILE_FIELD: &str = "file";

pub async fn appointments(user: User, services: Services) -> ApiReply {
    let result = match services.identity.doctor_profile(&user).await {
        Ok(doctor) => services.scheduling.list_for_doctor(&doctor).await,
        Err(err) => Err(err),
    };
    respond(result)
}

pub async fn patients(user: User, services: Services) -> ApiReply {
    let result = match services.identity.doctor_profile(&user).await {
        Ok(doctor) => services.clinical.doctor_patients(&doctor).await,
        Err(err) => Err(err),
    };
    respond(result)
}

pub async fn patient_details(patient_id: i64, _user: User, services: Services) -> ApiReply {
    respond(services.clinical.patient_details(patient_id).await)
}

async fn prescribe(services: &Services, user: &User, body: PrescriptionBody) -> HospitalResult<Prescription> {
    let doctor = services.identity.doctor_profile(user).await?;
    services.clinical.create_prescription(&doctor, body.into()).await
}

pub async fn create_prescription(user: User, body: PrescriptionBody, services: Services) -> ApiReply {
    respond_created(prescribe(&services, &user, body).await)
}

async fn order_lab_test(services: &Services, user: &User, body: LabTestBody) -> HospitalResult<LabTest> {
    let doctor = services.identity.doctor_profile(user).await?;
    services.clinical.recommend_lab_test(&doctor, body.into()).await
}

pub async fn recommend_lab_test(user: User, body: LabTestBody, services: Services) -> ApiReply {
    respond_created(order_lab_test(&services, &user, body).await)
}

/// First `file` part of the form, if any.
async fn read_file_part(mut form: FormData) -> HospitalResult<Option<LabResultUpload>> {
    let malformed = |e: warp::Error| HospitalError::BadInput(format!("Malformed upload: {}", e));
    while let Some(part) = form.try_next().await.map_err(malformed)? {
        if part.name() != FILE_FIELD {
            continue;
        }
        let file_name = part.filename().unwrap_or("result").to_string();
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut buffer, chunk| async move {
                buffer.put(chunk);
                Ok(buffer)
            })
            .await
            .map_err(malformed)?;
        return Ok(Some(LabResultUpload { file_name, bytes }));
    }
    Ok(None)
}

async fn store_result(services: &Services, lab_test_id: i64, form: Option<FormData>) -> HospitalResult<LabTest> {
    let upload = match form {
        Some(form) => read_file_part(form).await?,
        None => None,
    };
    services.clinical.upload_lab_result(lab_test_id, upload).await
}

pub async fn upload_lab_result(lab_test_id: i64, _user: User, form: Option<FormData>, services: Services) -> ApiReply {
    respond(store_result(&services, lab_test_id, form).await)
}
