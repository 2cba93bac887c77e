//! Public endpoints: login and self-registration.

use std::sync::Arc;

use axum::{Router, extract::Extension, http::StatusCode, routing::post};
use chrono::Utc;

use custodia_users::RegisterUser;

use crate::app::dto;
use crate::app::extract::ApiJson;
use crate::app::routes::common::{ApiResult, blocking, json};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/token", post(issue_token))
        .route("/register", post(register))
}

pub async fn issue_token(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::TokenRequest>,
) -> ApiResult {
    let token = blocking(&services, move |s| {
        s.users.authenticate(&body.username, &body.password, Utc::now())
    })
    .await?;
    Ok(json(StatusCode::OK, &token))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<RegisterUser>,
) -> ApiResult {
    let user = blocking(&services, move |s| s.users.register(body, Utc::now())).await?;
    Ok(json(StatusCode::CREATED, &user))
}
