//! Routes shared by every resource kind, mounted once per kind.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use custodia_assets::AssetKind;
use custodia_auth::Permission;
use custodia_core::{CustodyId, Quantity, ResourceId, UserId};
use custodia_custody::{
    AddUnits, CustodyKind, CustodyState, DeleteResource, GrantCustody, RecordFilter,
    RegisterResource, RemoveUnits, ResourceFilter, ResourceKind, ReturnCustody, ReturnTarget,
    TransferCustody, UpdateResource,
};
use custodia_library::BookKind;

use crate::app::dto;
use crate::app::errors;
use crate::app::extract::{ApiJson, ApiQuery, optional_json};
use crate::app::routes::common::{ApiResult, CmdAuth, authorize, blocking, json, parse_id, require};
use crate::app::services::{AppServices, CustodyServiceFor};
use crate::context::PrincipalContext;

/// A resource kind exposed over HTTP.
pub trait Mounted: ResourceKind {
    const READ: Permission;
    const MANAGE: Permission;

    fn service(services: &AppServices) -> &CustodyServiceFor<Self>;
}

impl Mounted for AssetKind {
    const READ: Permission = Permission::ASSETS_READ;
    const MANAGE: Permission = Permission::ASSETS_MANAGE;

    fn service(services: &AppServices) -> &CustodyServiceFor<Self> {
        &services.assets
    }
}

impl Mounted for BookKind {
    const READ: Permission = Permission::LIBRARY_READ;
    const MANAGE: Permission = Permission::LIBRARY_MANAGE;

    fn service(services: &AppServices) -> &CustodyServiceFor<Self> {
        &services.books
    }
}

pub fn router<K: Mounted>() -> Router {
    Router::new()
        .route("/", get(list::<K>).post(register::<K>))
        .route("/code/:code", get(find_by_code::<K>))
        .route("/mine", get(mine::<K>))
        .route("/overdue", get(overdue::<K>))
        .route("/held-by/:user_id", get(held_by::<K>))
        .route("/records", get(records::<K>))
        .route("/records/:record_id", get(record::<K>))
        .route("/records/:record_id/return", post(return_record::<K>))
        .route("/records/:record_id/transfer", post(transfer::<K>))
        .route("/:id", get(get_one::<K>).patch(update::<K>).delete(delete::<K>))
        .route("/:id/grant", post(grant::<K>))
        .route("/:id/return", post(return_by_holder::<K>))
        .route("/:id/units/add", post(add_units::<K>))
        .route("/:id/units/remove", post(remove_units::<K>))
        .route("/:id/stock", get(stock::<K>))
        .route("/:id/history", get(history::<K>))
}

fn quantity(raw: Option<i64>) -> Result<Option<Quantity>, axum::response::Response> {
    raw.map(Quantity::from_signed)
        .transpose()
        .map_err(errors::domain_error_to_response)
}

/// Loan unless the caller names another kind.
fn custody_kind(raw: Option<&str>) -> Result<CustodyKind, axum::response::Response> {
    match raw {
        Some(raw) => raw.parse().map_err(errors::domain_error_to_response),
        None => Ok(CustodyKind::Loan),
    }
}

/// Removing stock that people still hold needs the force permission too.
fn removal_permissions<K: Mounted>(force: bool) -> Vec<Permission> {
    if force {
        vec![K::MANAGE, Permission::CUSTODY_FORCE_DELETE]
    } else {
        vec![K::MANAGE]
    }
}

pub async fn list<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<dto::ListQuery>,
    ApiQuery(details): ApiQuery<K::Filter>,
) -> ApiResult {
    require(&principal, K::READ)?;
    let filter = ResourceFilter::<K> {
        search: query.search,
        status: query.status,
        available_only: query.available_only,
        holder: query.holder_id,
        details,
    };
    let resources = blocking(&services, move |s| K::service(s).list(&filter)).await?;
    Ok(json(StatusCode::OK, &resources))
}

pub async fn register<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::RegisterRequest<K::Details>>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: RegisterResource::<K> {
            resource_id: ResourceId::new(),
            code: body.code,
            quantity: body.quantity,
            details: body.details,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| K::service(s).register(cmd_auth.inner)).await?;
    Ok(json(StatusCode::CREATED, &outcome))
}

pub async fn get_one<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, K::READ)?;
    let id: ResourceId = parse_id(&id)?;
    let resource = blocking(&services, move |s| K::service(s).get(id)).await?;
    Ok(json(StatusCode::OK, &resource))
}

pub async fn find_by_code<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> ApiResult {
    require(&principal, K::READ)?;
    let resource = blocking(&services, move |s| K::service(s).find_by_code(&code)).await?;
    Ok(json(StatusCode::OK, &resource))
}

pub async fn update<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateRequest<K::Patch>>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: UpdateResource::<K> {
            resource_id: parse_id(&id)?,
            code: body.code,
            patch: body.patch,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| K::service(s).update(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn delete<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<dto::ForceQuery>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: DeleteResource {
            resource_id: parse_id(&id)?,
            force: query.force,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: removal_permissions::<K>(query.force),
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| K::service(s).delete(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn grant<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::GrantRequest>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: GrantCustody {
            resource_id: parse_id(&id)?,
            holder: body.holder_id,
            quantity: quantity(body.quantity)?.unwrap_or(Quantity::ONE),
            kind: custody_kind(body.kind.as_deref())?,
            due_on: body.due_on,
            notes: body.notes,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| K::service(s).grant(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn return_by_holder<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::ReturnByHolderRequest>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: ReturnCustody {
            target: ReturnTarget::Holder {
                resource_id: parse_id(&id)?,
                holder: body.holder_id,
            },
            quantity: quantity(body.quantity)?,
            notes: body.notes,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome =
        blocking(&services, move |s| K::service(s).return_custody(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn return_record<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(record_id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let body: dto::ReturnRecordRequest = optional_json(&body)?;
    let cmd_auth = CmdAuth {
        inner: ReturnCustody {
            target: ReturnTarget::Record(parse_id(&record_id)?),
            quantity: quantity(body.quantity)?,
            notes: body.notes,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome =
        blocking(&services, move |s| K::service(s).return_custody(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn transfer<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(record_id): Path<String>,
    ApiJson(body): ApiJson<dto::TransferRequest>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: TransferCustody {
            record_id: parse_id(&record_id)?,
            to_holder: body.to_holder_id,
            notes: body.notes,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| K::service(s).transfer(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn add_units<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::AddUnitsRequest>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: AddUnits {
            resource_id: parse_id(&id)?,
            delta: body.delta,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: vec![K::MANAGE],
    };
    authorize(&principal, &cmd_auth)?;

    let outcome = blocking(&services, move |s| K::service(s).add_units(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn remove_units<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::RemoveUnitsRequest>,
) -> ApiResult {
    let cmd_auth = CmdAuth {
        inner: RemoveUnits {
            resource_id: parse_id(&id)?,
            units: body.units,
            force: body.force,
            actor: Some(principal.user_id()),
            occurred_at: Utc::now(),
        },
        required: removal_permissions::<K>(body.force),
    };
    authorize(&principal, &cmd_auth)?;

    let outcome =
        blocking(&services, move |s| K::service(s).remove_units(cmd_auth.inner)).await?;
    Ok(json(StatusCode::OK, &outcome))
}

pub async fn stock<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, K::READ)?;
    let id: ResourceId = parse_id(&id)?;
    let summary = blocking(&services, move |s| K::service(s).stock_summary(id)).await?;
    Ok(json(StatusCode::OK, &summary))
}

pub async fn history<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&principal, K::MANAGE)?;
    let id: ResourceId = parse_id(&id)?;
    let records = blocking(&services, move |s| K::service(s).history(id)).await?;
    Ok(json(StatusCode::OK, &records))
}

pub async fn records<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<dto::RecordQuery>,
) -> ApiResult {
    require(&principal, K::MANAGE)?;
    let state = if query.active_only {
        Some(CustodyState::Active)
    } else {
        query.state
    };
    let filter = RecordFilter {
        resource_id: query.resource_id,
        holder: query.holder_id,
        state,
        kind: query.kind,
    };
    let records = blocking(&services, move |s| K::service(s).records(&filter)).await?;
    Ok(json(StatusCode::OK, &records))
}

pub async fn record<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(record_id): Path<String>,
) -> ApiResult {
    require(&principal, K::READ)?;
    let record_id: CustodyId = parse_id(&record_id)?;
    let record = blocking(&services, move |s| K::service(s).record(record_id)).await?;
    if record.holder != principal.user_id() {
        require(&principal, K::MANAGE)?;
    }
    Ok(json(StatusCode::OK, &record))
}

pub async fn mine<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&principal, K::READ)?;
    let me = principal.user_id();
    let holdings = blocking(&services, move |s| K::service(s).holdings(me)).await?;
    Ok(json(StatusCode::OK, &holdings))
}

pub async fn held_by<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
) -> ApiResult {
    let holder: UserId = parse_id(&user_id)?;
    if holder != principal.user_id() {
        require(&principal, K::MANAGE)?;
    }
    let holdings = blocking(&services, move |s| K::service(s).holdings(holder)).await?;
    Ok(json(StatusCode::OK, &holdings))
}

pub async fn overdue<K: Mounted>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<dto::OverdueQuery>,
) -> ApiResult {
    require(&principal, K::MANAGE)?;
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let records = blocking(&services, move |s| K::service(s).overdue(on)).await?;
    Ok(json(StatusCode::OK, &records))
}
