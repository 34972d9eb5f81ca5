//! Stay + ride saga.
//!
//! 1. Reserve the stay on the listing
//! 2. Reserve seats on the trip
//! 3. Done
//!
//! Compensating action: cancel the stay if the ride cannot be reserved.
//! Compensation is retried on store failures and exhausted write retries.
//! A stay that is already cancelled counts as released. Anything else
//! leaves the stay booked and the failure is logged.

use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use tripstay_core::{DateRange, DomainError, EntryId, RecordId, UserId};
use tripstay_reservations::{Claim, EntryStatus, Initiator};

use crate::allocation::{AllocationError, EntrySnapshot};
use crate::retry::RetryPolicy;
use crate::saga::ReservationExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StayRideSagaState {
    #[default]
    Started,
    StayReserved { stay_entry_id: EntryId },
    Completed,
    /// First leg failed; nothing to undo.
    Failed,
    Compensated,
    CompensationFailed { stay_entry_id: EntryId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StayRideSagaEvent {
    StayReserved { record_id: RecordId, entry_id: EntryId },
    StayFailed { reason: String },
    RideReserved { record_id: RecordId, entry_id: EntryId },
    RideFailed { reason: String },
    StayReleased { entry_id: EntryId },
    CompensationAbandoned { entry_id: EntryId, reason: String },
}

impl StayRideSagaState {
    pub fn apply(&mut self, event: &StayRideSagaEvent) {
        match event {
            StayRideSagaEvent::StayReserved { entry_id, .. } => {
                *self = StayRideSagaState::StayReserved {
                    stay_entry_id: *entry_id,
                };
            }
            StayRideSagaEvent::StayFailed { .. } => {
                *self = StayRideSagaState::Failed;
            }
            StayRideSagaEvent::RideReserved { .. } => {
                *self = StayRideSagaState::Completed;
            }
            StayRideSagaEvent::RideFailed { .. } => {
                // Waiting for compensation.
            }
            StayRideSagaEvent::StayReleased { .. } => {
                *self = StayRideSagaState::Compensated;
            }
            StayRideSagaEvent::CompensationAbandoned { entry_id, .. } => {
                *self = StayRideSagaState::CompensationFailed {
                    stay_entry_id: *entry_id,
                };
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StayRideSagaState::Completed
                | StayRideSagaState::Failed
                | StayRideSagaState::Compensated
                | StayRideSagaState::CompensationFailed { .. }
        )
    }
}

/// Both reservations, held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StayRideBooking {
    pub stay: EntrySnapshot,
    pub ride: EntrySnapshot,
    pub history: Vec<StayRideSagaEvent>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StayRideError {
    #[error("stay reservation failed: {0}")]
    Stay(AllocationError),

    #[error("ride reservation failed, stay released: {ride}")]
    RideCompensated { ride: AllocationError },

    #[error("ride reservation failed and stay {stay_entry_id} could not be released: {compensation}")]
    CompensationFailed {
        ride: AllocationError,
        compensation: AllocationError,
        stay_entry_id: EntryId,
    },
}

impl StayRideError {
    pub fn code(&self) -> &'static str {
        match self {
            StayRideError::Stay(e) => e.code(),
            StayRideError::RideCompensated { ride } => ride.code(),
            StayRideError::CompensationFailed { .. } => "compensation_failed",
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    state: StayRideSagaState,
    history: Vec<StayRideSagaEvent>,
}

impl Progress {
    fn record(&mut self, event: StayRideSagaEvent) {
        self.state.apply(&event);
        debug!(state = ?self.state, "stay+ride saga advanced");
        self.history.push(event);
    }
}

/// Orchestrates the two reservations.
#[derive(Debug, Clone)]
pub struct StayRideSaga {
    pub compensation_retry: RetryPolicy,
}

impl Default for StayRideSaga {
    fn default() -> Self {
        Self {
            compensation_retry: RetryPolicy::exponential(
                5,
                std::time::Duration::from_millis(50),
                std::time::Duration::from_secs(1),
            ),
        }
    }
}

impl StayRideSaga {
    pub fn new(compensation_retry: RetryPolicy) -> Self {
        Self { compensation_retry }
    }

    pub fn book_stay_and_ride<E>(
        &self,
        executor: &E,
        guest: UserId,
        listing_id: RecordId,
        range: DateRange,
        trip_id: RecordId,
        seats: u32,
    ) -> Result<StayRideBooking, StayRideError>
    where
        E: ReservationExecutor + ?Sized,
    {
        let mut progress = Progress::default();

        let stay = match executor.reserve(listing_id, guest, Claim::stay(range)) {
            Ok(stay) => stay,
            Err(e) => {
                progress.record(StayRideSagaEvent::StayFailed { reason: e.to_string() });
                return Err(StayRideError::Stay(e));
            }
        };
        progress.record(
            StayRideSagaEvent::StayReserved {
                record_id: listing_id,
                entry_id: stay.entry.id,
            },
        );

        match executor.reserve(trip_id, guest, Claim::seats(seats)) {
            Ok(ride) => {
                progress.record(
                    StayRideSagaEvent::RideReserved {
                        record_id: trip_id,
                        entry_id: ride.entry.id,
                    },
                );
                info!(
                    listing_id = %listing_id,
                    trip_id = %trip_id,
                    stay_entry_id = %stay.entry.id,
                    ride_entry_id = %ride.entry.id,
                    "stay and ride booked"
                );
                Ok(StayRideBooking {
                    stay,
                    ride,
                    history: progress.history,
                })
            }
            Err(ride_err) => {
                progress.record(
                    StayRideSagaEvent::RideFailed {
                        reason: ride_err.to_string(),
                    },
                );
                warn!(
                    trip_id = %trip_id,
                    stay_entry_id = %stay.entry.id,
                    error = %ride_err,
                    "ride reservation failed, releasing stay"
                );

                match self.release_stay(executor, guest, listing_id, stay.entry.id) {
                    Ok(()) => {
                        progress.record(
                            StayRideSagaEvent::StayReleased {
                                entry_id: stay.entry.id,
                            },
                        );
                        Err(StayRideError::RideCompensated { ride: ride_err })
                    }
                    Err(compensation) => {
                        progress.record(
                            StayRideSagaEvent::CompensationAbandoned {
                                entry_id: stay.entry.id,
                                reason: compensation.to_string(),
                            },
                        );
                        error!(
                            listing_id = %listing_id,
                            stay_entry_id = %stay.entry.id,
                            error = %compensation,
                            "stay compensation failed; entry left reserved"
                        );
                        Err(StayRideError::CompensationFailed {
                            ride: ride_err,
                            compensation,
                            stay_entry_id: stay.entry.id,
                        })
                    }
                }
            }
        }
    }

    fn release_stay<E>(
        &self,
        executor: &E,
        guest: UserId,
        listing_id: RecordId,
        stay_entry_id: EntryId,
    ) -> Result<(), AllocationError>
    where
        E: ReservationExecutor + ?Sized,
    {
        let mut attempt = 1u32;
        loop {
            let result = executor.cancel(
                listing_id,
                stay_entry_id,
                Initiator::User(guest),
                Some("ride could not be reserved".to_string()),
            );
            match result {
                Ok(_) => return Ok(()),
                Err(e) if e.is_transient() && self.compensation_retry.should_retry(attempt) => {
                    let delay = self.compensation_retry.delay_for_attempt(attempt);
                    debug!(
                        stay_entry_id = %stay_entry_id,
                        attempt,
                        error = %e,
                        "compensation attempt failed, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e @ AllocationError::Domain(DomainError::Conflict(_))) => {
                    return match executor.entry(stay_entry_id) {
                        Ok(stay) if stay.entry.status == EntryStatus::Cancelled => {
                            debug!(stay_entry_id = %stay_entry_id, "stay already cancelled");
                            Ok(())
                        }
                        _ => Err(e),
                    };
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
    use tripstay_core::ManualClock;
    use tripstay_events::{EventEnvelope, InMemoryEventBus};
    use tripstay_reservations::{Capacity, ReservationEvent};

    use crate::allocation::{AllocationService, RecordDraft};
    use crate::store::{InMemoryCapacityStore, StoreError};

    type Service = AllocationService<InMemoryCapacityStore, InMemoryEventBus<EventEnvelope<ReservationEvent>>>;

    struct World {
        service: Service,
        listing: RecordId,
        trip: RecordId,
        range: DateRange,
    }

    fn world(trip_seats: u32) -> World {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let service = AllocationService::new(InMemoryCapacityStore::new(), InMemoryEventBus::new())
            .with_clock(std::sync::Arc::new(ManualClock::new(start)));

        let listing = service
            .create_record(
                UserId::new(),
                RecordDraft {
                    capacity: Capacity::Calendar,
                    window_start: start,
                    window_end: start + ChronoDuration::days(60),
                    unit_price: 9000,
                    location: None,
                    destination: None,
                },
            )
            .unwrap()
            .record_id();
        let trip = service
            .create_record(
                UserId::new(),
                RecordDraft {
                    capacity: Capacity::Seats { total: trip_seats },
                    window_start: start + ChronoDuration::days(30),
                    window_end: start + ChronoDuration::days(30) + ChronoDuration::hours(3),
                    unit_price: 1500,
                    location: None,
                    destination: None,
                },
            )
            .unwrap()
            .record_id();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
        )
        .unwrap();

        World {
            service,
            listing,
            trip,
            range,
        }
    }

    fn saga() -> StayRideSaga {
        StayRideSaga::new(RetryPolicy::fixed(3, Duration::ZERO))
    }

    #[test]
    fn books_both_legs() {
        let w = world(4);
        let booking = saga()
            .book_stay_and_ride(&w.service, UserId::new(), w.listing, w.range, w.trip, 2)
            .unwrap();

        assert_eq!(booking.stay.entry.status, EntryStatus::Reserved);
        assert_eq!(booking.ride.entry.status, EntryStatus::Reserved);
        let mut state = StayRideSagaState::default();
        for event in &booking.history {
            state.apply(event);
        }
        assert_eq!(state, StayRideSagaState::Completed);
    }

    #[test]
    fn full_trip_releases_the_stay() {
        let w = world(1);
        let guest = UserId::new();
        let err = saga()
            .book_stay_and_ride(&w.service, guest, w.listing, w.range, w.trip, 2)
            .unwrap_err();

        assert_eq!(err.code(), "insufficient_capacity");
        let listing = w.service.get_record(w.listing).unwrap();
        assert_eq!(listing.entries().len(), 1);
        assert_eq!(listing.entries()[0].status, EntryStatus::Cancelled);
    }

    #[test]
    fn stay_failure_never_touches_the_trip() {
        let w = world(4);
        let taken_by = UserId::new();
        w.service
            .reserve(w.listing, taken_by, Claim::stay(w.range))
            .unwrap();

        let err = saga()
            .book_stay_and_ride(&w.service, UserId::new(), w.listing, w.range, w.trip, 1)
            .unwrap_err();
        assert!(matches!(err, StayRideError::Stay(_)));
        assert!(w.service.get_record(w.trip).unwrap().entries().is_empty());
    }

    /// Passes reserves through; cancels always hit a store outage.
    struct BrokenCancel<'a> {
        inner: &'a Service,
        cancels: AtomicU32,
        last_error: Mutex<Option<String>>,
    }

    impl ReservationExecutor for BrokenCancel<'_> {
        fn reserve(&self, record_id: RecordId, holder: UserId, claim: Claim) -> Result<EntrySnapshot, AllocationError> {
            self.inner.reserve(record_id, holder, claim)
        }

        fn cancel(
            &self,
            _record_id: RecordId,
            _entry_id: EntryId,
            _initiator: Initiator,
            _note: Option<String>,
        ) -> Result<EntrySnapshot, AllocationError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            let err = StoreError::Backend("connection reset".into());
            *self.last_error.lock().unwrap() = Some(err.to_string());
            Err(AllocationError::Store(err))
        }

        fn entry(&self, entry_id: EntryId) -> Result<EntrySnapshot, AllocationError> {
            self.inner.get_entry(entry_id)
        }
    }

    #[test]
    fn compensation_is_retried_then_reported() {
        let w = world(1);
        let broken = BrokenCancel {
            inner: &w.service,
            cancels: AtomicU32::new(0),
            last_error: Mutex::new(None),
        };

        let err = saga()
            .book_stay_and_ride(&broken, UserId::new(), w.listing, w.range, w.trip, 2)
            .unwrap_err();

        assert_eq!(err.code(), "compensation_failed");
        assert_eq!(broken.cancels.load(Ordering::SeqCst), 3);
        assert!(broken.last_error.lock().unwrap().is_some());
        let listing = w.service.get_record(w.listing).unwrap();
        assert_eq!(listing.entries()[0].status, EntryStatus::Reserved);
    }

    /// Runs `before` ahead of every real cancel.
    struct RacedCancel<'a> {
        inner: &'a Service,
        cancels: AtomicU32,
        before: fn(&Service, RecordId, EntryId) -> Result<(), AllocationError>,
    }

    impl ReservationExecutor for RacedCancel<'_> {
        fn reserve(&self, record_id: RecordId, holder: UserId, claim: Claim) -> Result<EntrySnapshot, AllocationError> {
            self.inner.reserve(record_id, holder, claim)
        }

        fn cancel(
            &self,
            record_id: RecordId,
            entry_id: EntryId,
            initiator: Initiator,
            note: Option<String>,
        ) -> Result<EntrySnapshot, AllocationError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            (self.before)(self.inner, record_id, entry_id)?;
            self.inner.cancel(record_id, entry_id, initiator, note)
        }

        fn entry(&self, entry_id: EntryId) -> Result<EntrySnapshot, AllocationError> {
            self.inner.get_entry(entry_id)
        }
    }

    #[test]
    fn stay_cancelled_by_the_guest_meanwhile_counts_as_released() {
        let w = world(1);
        let raced = RacedCancel {
            inner: &w.service,
            cancels: AtomicU32::new(0),
            before: |service, record_id, entry_id| {
                let holder = service.get_entry(entry_id)?.entry.holder_id;
                service.cancel(record_id, entry_id, Initiator::User(holder), None)?;
                Ok(())
            },
        };

        let err = saga()
            .book_stay_and_ride(&raced, UserId::new(), w.listing, w.range, w.trip, 2)
            .unwrap_err();

        assert!(matches!(err, StayRideError::RideCompensated { .. }));
        assert_eq!(raced.cancels.load(Ordering::SeqCst), 1);
        let listing = w.service.get_record(w.listing).unwrap();
        assert_eq!(listing.entries()[0].status, EntryStatus::Cancelled);
    }

    #[test]
    fn rejected_compensation_is_not_retried() {
        let w = world(1);
        let raced = RacedCancel {
            inner: &w.service,
            cancels: AtomicU32::new(0),
            before: |_, _, _| Err(DomainError::conflict("entry is being confirmed").into()),
        };

        let err = saga()
            .book_stay_and_ride(&raced, UserId::new(), w.listing, w.range, w.trip, 2)
            .unwrap_err();

        assert_eq!(err.code(), "compensation_failed");
        assert_eq!(raced.cancels.load(Ordering::SeqCst), 1);
        let listing = w.service.get_record(w.listing).unwrap();
        assert_eq!(listing.entries()[0].status, EntryStatus::Reserved);
    }
}
