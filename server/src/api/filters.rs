// server/src/api/filters.rs

use std::convert::Infallible;
use std::sync::Arc;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use warp::{Filter, Rejection};
use lib::services::HospitalServices;
use models::errors::HospitalError;
use models::medical::{Role, User};
use super::reply::reject;

pub type Services = Arc<HospitalServices>;

const JSON_BODY_LIMIT: u64 = 1024 * 1024;

// Helper to inject the services into warp filters
pub fn with_services(services: Services) -> impl Filter<Extract = (Services,), Error = Infallible> + Clone {
    warp::any().map(move || services.clone())
}

fn bearer_token(header: Option<String>) -> Option<String> {
    header.and_then(|value| {
        value
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
    })
}

/// Resolves `Authorization: Bearer <jwt>` to the calling user.
pub fn authenticated(services: Services) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_services(services))
        .and_then(|header: Option<String>, services: Services| async move {
            let token = bearer_token(header);
            services.identity.authenticate(token.as_deref()).await.map_err(reject)
        })
}

/// An authenticated user holding `role`.
pub fn with_role(role: Role, services: Services) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    authenticated(services.clone())
        .and(with_services(services))
        .and_then(move |user: User, services: Services| async move {
            services.identity.authorize(&user, role).map_err(reject)?;
            Ok::<User, Rejection>(user)
        })
}

/// JSON body that tolerates an empty payload, including a missing
/// Content-Length header.
pub fn optional_json<T>() -> impl Filter<Extract = (Option<T>,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::bytes()
        .and_then(|body: Bytes| async move {
            if body.len() as u64 > JSON_BODY_LIMIT {
                return Err(reject(HospitalError::BadInput("Request body too large".to_string())));
            }
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            serde_json::from_slice::<T>(&body)
                .map(Some)
                .map_err(|e| reject(HospitalError::BadInput(format!("Invalid JSON body: {}", e))))
        })
}

pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_bearer_scheme_is_accepted() {
        assert_eq!(bearer_token(Some("Bearer abc.def".into())).as_deref(), Some("abc.def"));
        assert_eq!(bearer_token(Some("Basic abc".into())), None);
        assert_eq!(bearer_token(None), None);
    }
}
