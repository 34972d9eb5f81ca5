use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use tripstay_auth::{Permission, Role};
use tripstay_core::{DomainError, EntryId, RecordId};
use tripstay_infra::AllocationError;
use tripstay_reservations::Initiator;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::routes::common::{HandlerResult, body, engine, parse_id};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/:entry_id", get(get_entry))
        .route("/:entry_id/checkout", post(checkout))
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::ReserveRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RESERVATION_CREATE)?;
    let record_id: RecordId = parse_id(&id)?;
    let claim = body(payload)?.into_claim().map_err(|e| e.to_response())?;

    let holder = ctx.caller_id();
    let snapshot = engine(&services, move |s| s.allocation.reserve(record_id, holder, claim)).await?;
    Ok((StatusCode::CREATED, Json(snapshot)).into_response())
}

/// Holder cancellation; the cutoff applies.
pub async fn cancel_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path((id, entry_id)): Path<(String, String)>,
    payload: Result<Json<dto::NoteRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RESERVATION_CANCEL)?;
    let record_id: RecordId = parse_id(&id)?;
    let entry_id: EntryId = parse_id(&entry_id)?;
    let note = body(payload)?.into_note().map_err(|e| e.to_response())?;

    let initiator = Initiator::User(ctx.caller_id());
    let snapshot = engine(&services, move |s| {
        s.allocation.cancel(record_id, entry_id, initiator, note)
    })
    .await?;
    Ok(Json(snapshot).into_response())
}

/// Visible to the holder, the record owner, and platform roles.
pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(entry_id): Path<String>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RESERVATION_READ)?;
    let entry_id: EntryId = parse_id(&entry_id)?;

    let caller = ctx.caller_id();
    let platform = matches!(ctx.role(), Role::System | Role::Admin);
    let snapshot = engine(&services, move |s| {
        let snapshot = s.allocation.get_entry(entry_id)?;
        if platform || snapshot.entry.holder_id == caller {
            return Ok(snapshot);
        }
        let record = s.allocation.get_record(snapshot.record_id)?;
        if record.owner_id() == Some(caller) {
            Ok(snapshot)
        } else {
            Err(AllocationError::Domain(DomainError::NotFound))
        }
    })
    .await?;
    Ok(Json(snapshot).into_response())
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(entry_id): Path<String>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::PAYMENT_CHECKOUT)?;
    let entry_id: EntryId = parse_id(&entry_id)?;

    let caller = ctx.caller_id();
    let checkout = engine(&services, move |s| s.allocation.begin_payment(entry_id, caller)).await?;
    Ok(Json(checkout).into_response())
}
