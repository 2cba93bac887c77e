use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use custodia_auth::Role;
use custodia_core::{DomainError, UserId};
use custodia_users::{ChangePassword, UserPatch};

use crate::app::dto;
use crate::app::errors;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{ApiResult, blocking, json, parse_id};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/me", get(me))
        .route("/me/password", post(change_password))
        .route("/teachers", get(teachers))
        .route("/:id", get(get_one).patch(update).delete(delete))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<dto::UserListQuery>,
) -> ApiResult {
    let role = match query.role.as_deref() {
        Some(raw) => Some(Role::parse(raw).ok_or_else(|| {
            errors::domain_error_to_response(DomainError::validation(format!("unknown role '{raw}'")))
        })?),
        None => None,
    };
    let actor = principal.principal();
    let users = blocking(&services, move |s| s.users.list(&actor, role.as_ref())).await?;
    Ok(json(StatusCode::OK, &users))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let actor = principal.principal();
    let user = blocking(&services, move |s| s.users.get(&actor, actor.principal_id)).await?;
    Ok(json(StatusCode::OK, &user))
}

pub async fn teachers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(_principal): Extension<PrincipalContext>,
) -> ApiResult {
    let users = blocking(&services, |s| s.users.teachers()).await?;
    Ok(json(StatusCode::OK, &users))
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: UserId = parse_id(&id)?;
    let actor = principal.principal();
    let user = blocking(&services, move |s| s.users.get(&actor, id)).await?;
    Ok(json(StatusCode::OK, &user))
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult {
    let id: UserId = parse_id(&id)?;
    let actor = principal.principal();
    let user = blocking(&services, move |s| s.users.update(&actor, id, patch, Utc::now())).await?;
    Ok(json(StatusCode::OK, &user))
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: UserId = parse_id(&id)?;
    let actor = principal.principal();
    blocking(&services, move |s| s.users.delete(&actor, id, &s.custody_lookups())).await?;
    Ok(json(
        StatusCode::OK,
        &serde_json::json!({ "id": id, "message": "user deleted" }),
    ))
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<ChangePassword>,
) -> ApiResult {
    let actor = principal.principal();
    blocking(&services, move |s| s.users.change_password(&actor, body, Utc::now())).await?;
    Ok(json(
        StatusCode::OK,
        &serde_json::json!({ "message": "password changed" }),
    ))
}
