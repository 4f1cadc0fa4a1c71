// server/src/api/handlers_auth.rs

use models::medical::User;
use super::filters::Services;
use super::payloads::{LoginBody, RegisterBody};
use super::reply::{respond, respond_created, ApiReply};

pub async fn register(body: RegisterBody, services: Services) -> ApiReply {
    let result = match body.into_registration() {
        Ok(registration) => services.identity.register(registration).await,
        Err(err) => Err(err),
    };
    respond_created(result)
}

pub async fn login(body: LoginBody, services: Services) -> ApiReply {
    respond(services.identity.login(body.email.trim(), &body.password).await)
}

pub async fn me(user: User, services: Services) -> ApiReply {
    respond(services.identity.account(&user).await)
}

pub async fn medicines(_user: User, services: Services) -> ApiReply {
    respond(services.catalog.medicines().await)
}

pub async fn lab_test_catalog(_user: User, services: Services) -> ApiReply {
    respond(services.catalog.lab_tests().await)
}
