use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tripstay_core::DomainError;
use tripstay_infra::AllocationError;
use tripstay_infra::saga::StayRideError;

/// Errors that know their HTTP rendering.
pub trait ApiError {
    fn to_response(&self) -> Response;
}

impl ApiError for DomainError {
    fn to_response(&self) -> Response {
        let status = match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound => StatusCode::NOT_FOUND,
            DomainError::Unauthorized => StatusCode::FORBIDDEN,
            DomainError::WindowElapsed | DomainError::CutoffPassed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DomainError::InsufficientCapacity { .. }
            | DomainError::Conflict(_)
            | DomainError::HasActiveReservations
            | DomainError::AlreadyConfirmed
            | DomainError::DuplicateHolder => StatusCode::CONFLICT,
        };
        // `invalid_id` surfaces as a validation error on the wire.
        let code = match self {
            DomainError::InvalidId(_) => "validation_error",
            other => other.code(),
        };
        json_error(status, code, self.to_string())
    }
}

impl ApiError for AllocationError {
    fn to_response(&self) -> Response {
        match self {
            AllocationError::Domain(e) => e.to_response(),
            AllocationError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                json_error(StatusCode::SERVICE_UNAVAILABLE, "store_error", e.to_string())
            }
            AllocationError::Gateway(e) => {
                json_error(StatusCode::BAD_GATEWAY, "gateway_error", e.to_string())
            }
            AllocationError::Contended { .. } => {
                json_error(StatusCode::CONFLICT, "conflict", self.to_string())
            }
        }
    }
}

impl ApiError for StayRideError {
    fn to_response(&self) -> Response {
        match self {
            StayRideError::Stay(e) | StayRideError::RideCompensated { ride: e } => {
                e.to_response()
            }
            StayRideError::CompensationFailed { .. } => json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "compensation_failed",
                self.to_string(),
            ),
        }
    }
}

pub fn outcome_unknown() -> Response {
    json_error(
        StatusCode::GATEWAY_TIMEOUT,
        "outcome_unknown",
        "request timed out; re-query before retrying",
    )
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripstay_infra::StoreError;

    #[test]
    fn domain_errors_map_to_stable_statuses() {
        assert_eq!(
            DomainError::insufficient(3, 1).to_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(DomainError::NotFound.to_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            DomainError::CutoffPassed { minutes_left: 30 }.to_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            DomainError::validation("bad").to_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn infrastructure_errors_are_not_client_errors() {
        let store = AllocationError::Store(StoreError::Backend("down".into()));
        assert_eq!(store.to_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(outcome_unknown().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn contention_is_a_plain_conflict() {
        let contended = AllocationError::Contended {
            record_id: tripstay_core::RecordId::new(),
            attempts: 5,
        };
        assert_eq!(contended.to_response().status(), StatusCode::CONFLICT);
    }
}
