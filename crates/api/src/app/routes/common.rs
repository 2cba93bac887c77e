use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use custodia_auth::{CommandAuthorization, Permission};
use custodia_core::DomainError;
use custodia_infra::ServiceResult;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Handlers return the error branch already rendered.
pub type ApiResult = Result<Response, Response>;

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

pub fn authorize<C>(principal: &PrincipalContext, cmd: &CmdAuth<C>) -> Result<(), Response> {
    crate::authz::authorize_command(principal, cmd).map_err(errors::authz_error_to_response)
}

/// Permission check for queries, which carry no command.
pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), Response> {
    authorize(
        principal,
        &CmdAuth {
            inner: (),
            required: vec![permission],
        },
    )
}

/// Run a service call on the blocking pool; stores may block on IO or locks.
pub async fn blocking<T, F>(services: &Arc<AppServices>, f: F) -> Result<T, Response>
where
    F: FnOnce(&AppServices) -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let services = Arc::clone(services);
    match tokio::task::spawn_blocking(move || f(&services)).await {
        Ok(result) => result.map_err(errors::service_error_to_response),
        Err(e) => {
            tracing::error!(error = %e, "service task failed");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "request could not be completed",
            ))
        }
    }
}

pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, Json(body)).into_response()
}
