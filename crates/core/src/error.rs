//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every guard failure of the reservation engine surfaces as one of these
/// variants so callers can map them to user-facing messages. Infrastructure
/// failures (store outages, gateway errors) live in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Not enough seats (or free nights) to satisfy the request.
    ///
    /// For trips the units are seats; for listings they are nights within the
    /// requested range, where `remaining` counts the nights that are still free.
    #[error("insufficient capacity: requested {requested}, remaining {remaining}")]
    InsufficientCapacity { requested: u32, remaining: u32 },

    /// Illegal transition or optimistic concurrency exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record's window has already started.
    #[error("reservation window has elapsed")]
    WindowElapsed,

    /// Holder cancellation attempted inside the cutoff.
    #[error("cancellation cutoff passed ({minutes_left} minutes before window start)")]
    CutoffPassed { minutes_left: i64 },

    /// Core fields are locked while reservations are held.
    #[error("record has active reservations")]
    HasActiveReservations,

    /// Entry already confirmed with a different payment reference.
    #[error("entry already confirmed")]
    AlreadyConfirmed,

    /// Holder already has a non-cancelled entry on this record.
    #[error("holder already has a reservation on this record")]
    DuplicateHolder,

    /// A requested resource was not found.
    #[error("not found")]
    NotFound,

    /// The caller may not perform this operation on this resource.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient(requested: u32, remaining: u32) -> Self {
        Self::InsufficientCapacity {
            requested,
            remaining,
        }
    }

    /// Stable, machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::InsufficientCapacity { .. } => "insufficient_capacity",
            DomainError::Conflict(_) => "conflict",
            DomainError::WindowElapsed => "window_elapsed",
            DomainError::CutoffPassed { .. } => "cutoff_passed",
            DomainError::HasActiveReservations => "has_active_reservations",
            DomainError::AlreadyConfirmed => "already_confirmed",
            DomainError::DuplicateHolder => "duplicate_holder",
            DomainError::NotFound => "not_found",
            DomainError::Unauthorized => "unauthorized",
        }
    }
}
