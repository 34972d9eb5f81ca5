//! Single authorization check at the handler boundary.
//!
//! Runs before any allocation call; record ownership is checked later by
//! the record itself.

use axum::http::StatusCode;
use axum::response::Response;

use tripstay_auth::{Permission, authorize};

use crate::app::errors::json_error;
use crate::context::CallerContext;

pub fn require(caller: &CallerContext, permission: &Permission) -> Result<(), Response> {
    authorize(caller.caller(), permission)
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "unauthorized", e.to_string()))
}
