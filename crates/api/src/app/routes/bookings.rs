use std::sync::Arc;

use axum::extract::Extension;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use tripstay_auth::Permission;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::routes::common::{HandlerResult, body, engine};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

/// Reserve a stay and a ride together; the stay is released if the ride fails.
pub async fn stay_and_ride(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    payload: Result<Json<dto::StayRideRequest>, JsonRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::BOOKING_BUNDLE)?;
    let req = body(payload)?;
    let range = req.range().map_err(|e| e.to_response())?;

    let guest = ctx.caller_id();
    let booking = engine(&services, move |s| {
        s.saga.book_stay_and_ride(
            s.allocation.as_ref(),
            guest,
            req.listing_id,
            range,
            req.trip_id,
            req.seats,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}
