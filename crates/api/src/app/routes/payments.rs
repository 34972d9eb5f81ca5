use std::sync::Arc;

use axum::extract::Extension;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::Json;

use tripstay_auth::Permission;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::routes::common::{HandlerResult, body, engine};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

/// Gateway confirmation, relayed by the platform. Replays are idempotent.
pub async fn callback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    payload: Result<Json<dto::PaymentCallbackRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::PAYMENT_CONFIRM)?;
    let req = body(payload)?;
    req.validate().map_err(|e| e.to_response())?;

    let snapshot = engine(&services, move |s| {
        s.allocation.confirm_via_payment(req.entry_id, &req.payment_ref)
    })
    .await?;
    Ok(Json(snapshot).into_response())
}
