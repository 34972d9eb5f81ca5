//! Time-window policies.

use chrono::{DateTime, Duration, Utc};

use tripstay_core::{DomainError, DomainResult};

use crate::entry::ReservationEntry;

/// Tunable policy windows, supplied by configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// Holders may not cancel a trip seat closer than this to departure.
    pub cancellation_cutoff: Duration,
    /// Unpaid entries older than this are swept to `cancelled`.
    pub payment_timeout: Duration,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            cancellation_cutoff: Duration::hours(24),
            payment_timeout: Duration::minutes(15),
        }
    }
}

impl ReservationPolicy {
    /// Reject when `window_start - now` is below the cutoff.
    pub fn ensure_before_cutoff(
        &self,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let left = window_start - now;
        if left < self.cancellation_cutoff {
            return Err(DomainError::CutoffPassed {
                minutes_left: left.num_minutes(),
            });
        }
        Ok(())
    }

    /// Unpaid entry older than the payment timeout.
    pub fn is_payment_overdue(&self, entry: &ReservationEntry, now: DateTime<Utc>) -> bool {
        matches!(
            entry.status,
            crate::EntryStatus::Pending | crate::EntryStatus::Reserved
        ) && now - entry.created_at > self.payment_timeout
    }
}

/// New reservations need a window that has not started yet.
pub fn ensure_window_ahead(window_start: DateTime<Utc>, now: DateTime<Utc>) -> DomainResult<()> {
    if window_start <= now {
        return Err(DomainError::WindowElapsed);
    }
    Ok(())
}
