// server/src/api/reply.rs
// Response envelope `{success, data?, message?}` and the error to status mapping.

use std::convert::Infallible;
use log::{error, warn};
use serde::Serialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Rejection, Reply};
use models::errors::{HospitalError, HospitalResult};

/// Unified return type of every handler.
pub type ApiReply = Result<WithStatus<Json>, Rejection>;

/// Carries a domain error out of a filter.
#[derive(Debug)]
pub struct ApiError(pub HospitalError);

impl warp::reject::Reject for ApiError {}

pub fn reject(err: HospitalError) -> Rejection {
    warp::reject::custom(ApiError(err))
}

pub fn status_for(err: &HospitalError) -> StatusCode {
    match err {
        HospitalError::NotFound(_) => StatusCode::NOT_FOUND,
        HospitalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        HospitalError::Forbidden(_) => StatusCode::FORBIDDEN,
        HospitalError::Conflict(_)
        | HospitalError::InvalidState(_)
        | HospitalError::BadInput(_)
        | HospitalError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn envelope_with_status<T: Serialize>(data: &T, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "success": true, "data": data })), status)
}

pub fn message(status: StatusCode, success: bool, message: &str) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "success": success, "message": message })), status)
}

/// Client errors keep their message; anything else is logged and hidden.
pub fn error_reply(err: &HospitalError) -> WithStatus<Json> {
    if !err.is_client_error() {
        error!("Request failed: {}", err);
        return message(StatusCode::INTERNAL_SERVER_ERROR, false, "Server Error");
    }
    message(status_for(err), false, &err.to_string())
}

pub fn respond<T: Serialize>(result: HospitalResult<T>) -> ApiReply {
    respond_with(result, StatusCode::OK)
}

pub fn respond_created<T: Serialize>(result: HospitalResult<T>) -> ApiReply {
    respond_with(result, StatusCode::CREATED)
}

fn respond_with<T: Serialize>(result: HospitalResult<T>, status: StatusCode) -> ApiReply {
    Ok(match result {
        Ok(data) => envelope_with_status(&data, status),
        Err(err) => error_reply(&err),
    })
}

/// Turns whatever rejection ended a request into an envelope.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(ApiError(inner)) = err.find::<ApiError>() {
        return Ok(error_reply(inner));
    }
    let reply = if err.is_not_found() {
        message(StatusCode::NOT_FOUND, false, "Not Found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        message(StatusCode::BAD_REQUEST, false, &e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        message(StatusCode::BAD_REQUEST, false, &e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        message(StatusCode::PAYLOAD_TOO_LARGE, false, "File too large")
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        message(StatusCode::FORBIDDEN, false, &e.to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        message(StatusCode::LENGTH_REQUIRED, false, "Length Required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        message(StatusCode::METHOD_NOT_ALLOWED, false, "Method Not Allowed")
    } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        message(StatusCode::UNSUPPORTED_MEDIA_TYPE, false, &e.to_string())
    } else {
        warn!("Unhandled rejection: {:?}", err);
        message(StatusCode::INTERNAL_SERVER_ERROR, false, "Server Error")
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::errors::ValidationError;

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(status_for(&HospitalError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&HospitalError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&HospitalError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&HospitalError::Conflict("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&HospitalError::InvalidState("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&HospitalError::Validation(ValidationError::InvalidEmail)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&HospitalError::StorageError("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_client_errors_escape_the_500_bucket() {
        let samples = vec![
            HospitalError::NotFound("x".into()),
            HospitalError::Conflict("x".into()),
            HospitalError::Forbidden("x".into()),
            HospitalError::Unauthorized("x".into()),
            HospitalError::InvalidState("x".into()),
            HospitalError::BadInput("x".into()),
            HospitalError::Validation(ValidationError::InvalidEmail),
            HospitalError::StorageError("x".into()),
            HospitalError::ConfigurationError("x".into()),
            HospitalError::SerializationError("x".into()),
            HospitalError::Io("x".into()),
            HospitalError::InternalError("x".into()),
        ];
        for err in samples {
            let status = error_reply(&err).into_response().status();
            assert_eq!(status == StatusCode::INTERNAL_SERVER_ERROR, !err.is_client_error(), "{:?}", err);
            assert_eq!(status, status_for(&err), "{:?}", err);
        }
    }

    #[test]
    fn server_errors_hide_their_detail() {
        let reply = error_reply(&HospitalError::StorageError("connection refused".into())).into_response();
        assert_eq!(reply.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
