use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;

use custodia_auth::Permission;
use custodia_infra::activity::ActivityQuery;

use crate::app::extract::ApiQuery;
use crate::app::routes::common::{ApiResult, json, require};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Most recent committed custody events, newest first.
pub async fn recent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> ApiResult {
    require(&principal, Permission::ACTIVITY_READ)?;
    Ok(json(StatusCode::OK, &services.activity.recent(&query)))
}
