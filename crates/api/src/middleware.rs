use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use tripstay_auth::{Caller, Role};
use tripstay_core::UserId;

use crate::app::errors::json_error;
use crate::context::CallerContext;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

/// Resolve the caller from the trusted gateway headers.
///
/// Missing or malformed headers end the request with 401.
pub async fn caller_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let caller = extract_caller(req.headers())
        .map_err(|msg| json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg))?;

    req.extensions_mut().insert(CallerContext::new(caller));

    Ok(next.run(req).await)
}

fn extract_caller(headers: &HeaderMap) -> Result<Caller, &'static str> {
    let caller_id: UserId = header(headers, CALLER_ID_HEADER)
        .ok_or("missing x-caller-id")?
        .parse()
        .map_err(|_| "x-caller-id must be a UUID")?;

    let role: Role = header(headers, CALLER_ROLE_HEADER)
        .ok_or("missing x-caller-role")?
        .parse()
        .map_err(|_| "x-caller-role must be one of holder, owner, system, admin")?;

    Ok(Caller::new(caller_id, role))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
