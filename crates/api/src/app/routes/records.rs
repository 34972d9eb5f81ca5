use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use tripstay_auth::Permission;
use tripstay_core::RecordId;

use crate::app::dto::{self, RecordView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{HandlerResult, body, engine, parse_id};
use crate::app::routes::reservations;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_record))
        .route("/:id", get(get_record).patch(update_record))
        .route("/:id/cancel", post(cancel_record))
        .route("/:id/complete", post(complete_record))
        .route("/:id/availability", get(get_availability))
        .route("/:id/reservations", post(reservations::reserve))
        .route("/:id/reservations/:entry_id/cancel", post(reservations::cancel_entry))
}

pub async fn create_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    payload: Result<Json<dto::CreateRecordRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RECORD_CREATE)?;
    let draft = body(payload)?.into_draft().map_err(|e| e.to_response())?;

    let owner = ctx.caller_id();
    let record = engine(&services, move |s| s.allocation.create_record(owner, draft)).await?;

    Ok((StatusCode::CREATED, Json(RecordView::from(&record))).into_response())
}

pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RECORD_READ)?;
    let record_id: RecordId = parse_id(&id)?;

    let record = engine(&services, move |s| s.allocation.get_record(record_id)).await?;
    Ok(Json(RecordView::from(&record)).into_response())
}

pub async fn update_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::UpdateRecordRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RECORD_UPDATE)?;
    let record_id: RecordId = parse_id(&id)?;
    let changes = body(payload)?.into_changes().map_err(|e| e.to_response())?;

    let owner = ctx.caller_id();
    let record = engine(&services, move |s| {
        s.allocation.owner_update_record(record_id, owner, changes)
    })
    .await?;
    Ok(Json(RecordView::from(&record)).into_response())
}

pub async fn cancel_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::NoteRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RECORD_CANCEL)?;
    let record_id: RecordId = parse_id(&id)?;
    let note = body(payload)?.into_note().map_err(|e| e.to_response())?;

    let initiator = ctx.initiator();
    let record = engine(&services, move |s| {
        s.allocation.owner_cancel_record(record_id, initiator, note)
    })
    .await?;
    Ok(Json(RecordView::from(&record)).into_response())
}

pub async fn complete_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RECORD_COMPLETE)?;
    let record_id: RecordId = parse_id(&id)?;

    let initiator = ctx.initiator();
    let record = engine(&services, move |s| s.allocation.complete_record(record_id, initiator)).await?;
    Ok(Json(RecordView::from(&record)).into_response())
}

pub async fn get_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::RECORD_READ)?;
    let record_id: RecordId = parse_id(&id)?;

    let view = engine(&services, move |s| s.allocation.get_availability(record_id)).await?;
    Ok(Json(view).into_response())
}
