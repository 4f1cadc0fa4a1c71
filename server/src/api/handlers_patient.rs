// server/src/api/handlers_patient.rs
// Patient-facing routes. Each resolves the caller's patient profile first.

use models::errors::HospitalResult;
use models::medical::{Appointment, Bill, User};
use super::filters::Services;
use super::payloads::{BookingBody, PaymentBody};
use super::reply::{respond, respond_created, ApiReply};

pub async fn doctors(_user: User, services: Services) -> ApiReply {
    respond(services.scheduling.doctors_for_booking().await)
}

pub async fn appointments(user: User, services: Services) -> ApiReply {
    let result = match services.identity.patient_profile(&user).await {
        Ok(patient) => services.scheduling.list_for_patient(&patient).await,
        Err(err) => Err(err),
    };
    respond(result)
}

async fn book(services: &Services, user: &User, body: BookingBody) -> HospitalResult<Appointment> {
    let patient = services.identity.patient_profile(user).await?;
    services.scheduling.book(&patient, body.into_request()?).await
}

pub async fn book_appointment(user: User, body: BookingBody, services: Services) -> ApiReply {
    respond_created(book(&services, &user, body).await)
}

async fn cancel(services: &Services, user: &User, appointment_id: i64) -> HospitalResult<Appointment> {
    let patient = services.identity.patient_profile(user).await?;
    services.scheduling.cancel(&patient, appointment_id).await
}

pub async fn cancel_appointment(appointment_id: i64, user: User, services: Services) -> ApiReply {
    respond(cancel(&services, &user, appointment_id).await)
}

pub async fn prescriptions(user: User, services: Services) -> ApiReply {
    let result = match services.identity.patient_profile(&user).await {
        Ok(patient) => services.clinical.prescriptions_for_patient(&patient).await,
        Err(err) => Err(err),
    };
    respond(result)
}

pub async fn lab_tests(user: User, services: Services) -> ApiReply {
    let result = match services.identity.patient_profile(&user).await {
        Ok(patient) => services.clinical.lab_tests_for_patient(&patient).await,
        Err(err) => Err(err),
    };
    respond(result)
}

pub async fn bills(user: User, services: Services) -> ApiReply {
    let result = match services.identity.patient_profile(&user).await {
        Ok(patient) => services.billing.bills_for_patient(&patient).await,
        Err(err) => Err(err),
    };
    respond(result)
}

async fn pay(services: &Services, user: &User, bill_id: i64, body: Option<PaymentBody>) -> HospitalResult<Bill> {
    let patient = services.identity.patient_profile(user).await?;
    let method = body.unwrap_or_default().payment_method;
    services.billing.pay(&patient, bill_id, method).await
}

pub async fn pay_bill(bill_id: i64, user: User, body: Option<PaymentBody>, services: Services) -> ApiReply {
    respond(pay(&services, &user, bill_id, body).await)
}
