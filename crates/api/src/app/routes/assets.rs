use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::post,
};
use chrono::Utc;

use custodia_assets::AssetKind;
use custodia_auth::Permission;
use custodia_custody::SetCondition;

use crate::app::dto;
use crate::app::extract::ApiJson;
use crate::app::routes::common::{ApiResult, CmdAuth, authorize, blocking, json, parse_id};
use crate::app::routes::custody;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    custody::router::<AssetKind>().route("/:id/condition", post(set_condition))
}

pub async fn set_condition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::ConditionRequest>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: SetCondition {
            resource_id: parse_id(&id)?,
            condition: body.condition,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![Permission::ASSETS_MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| s.assets.set_condition(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}
