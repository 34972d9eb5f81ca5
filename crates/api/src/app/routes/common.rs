//! Shared handler plumbing: id parsing, body rejection mapping, engine calls.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Json, extract::Query};

use tripstay_core::DomainError;

use crate::app::errors::{self, ApiError};
use crate::app::services::{AppServices, RunError};

pub type HandlerResult = Result<Response, Response>;

pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|e: DomainError| e.to_response())
}

/// Malformed or unknown-field bodies are validation errors.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
    })
}

pub fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    params.map(|Query(v)| v).map_err(|rejection| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
    })
}

/// Run an engine call under the request deadline and render its error.
pub async fn engine<T, E, F>(services: &Arc<AppServices>, f: F) -> Result<T, Response>
where
    T: Send + 'static,
    E: ApiError + Send + 'static,
    F: FnOnce(&AppServices) -> Result<T, E> + Send + 'static,
{
    match services.run(f).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_response()),
        Err(RunError::TimedOut) => Err(errors::outcome_unknown()),
        Err(RunError::Aborted) => Err(errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "request aborted",
        )),
    }
}
