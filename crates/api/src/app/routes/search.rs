use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::response::IntoResponse;
use axum::Json;

use tripstay_auth::Permission;

use crate::app::dto::{self, TripSuggestionView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{HandlerResult, engine, query};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::CallerContext;

pub async fn trips(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallerContext>,
    params: Result<Query<dto::SearchQuery>, QueryRejection>,
) -> HandlerResult {
    authz::require(&ctx, &Permission::SEARCH)?;
    let params = query(params)?;
    let near = params.near().map_err(|e| e.to_response())?;

    let hits = engine(&services, move |s| {
        s.allocation.suggest_trips(near, params.radius_m, params.seats)
    })
    .await?;
    let views: Vec<TripSuggestionView> = hits.iter().map(TripSuggestionView::from).collect();
    Ok(Json(serde_json::json!({ "trips": views })).into_response())
}
