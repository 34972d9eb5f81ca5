//! Multi-record bookings.
//!
//! There are no cross-record transactions: each step is an independent
//! conditional write, and a failed later step is undone by a compensating
//! command on the earlier records.

pub mod stay_ride;

pub use stay_ride::{StayRideBooking, StayRideError, StayRideSaga, StayRideSagaEvent, StayRideSagaState};

use tripstay_core::{EntryId, RecordId, UserId};
use tripstay_events::{EventBus, EventEnvelope};
use tripstay_reservations::{Claim, Initiator, ReservationEvent};

use crate::allocation::{AllocationResult, AllocationService, EntrySnapshot};
use crate::store::CapacityStore;

/// The reservation commands a saga step may issue.
pub trait ReservationExecutor: Send + Sync {
    fn reserve(&self, record_id: RecordId, holder: UserId, claim: Claim) -> AllocationResult<EntrySnapshot>;

    fn cancel(
        &self,
        record_id: RecordId,
        entry_id: EntryId,
        initiator: Initiator,
        note: Option<String>,
    ) -> AllocationResult<EntrySnapshot>;

    fn entry(&self, entry_id: EntryId) -> AllocationResult<EntrySnapshot>;
}

impl<S, B> ReservationExecutor for AllocationService<S, B>
where
    S: CapacityStore,
    B: EventBus<EventEnvelope<ReservationEvent>>,
{
    fn reserve(&self, record_id: RecordId, holder: UserId, claim: Claim) -> AllocationResult<EntrySnapshot> {
        AllocationService::reserve(self, record_id, holder, claim)
    }

    fn cancel(
        &self,
        record_id: RecordId,
        entry_id: EntryId,
        initiator: Initiator,
        note: Option<String>,
    ) -> AllocationResult<EntrySnapshot> {
        AllocationService::cancel(self, record_id, entry_id, initiator, note)
    }

    fn entry(&self, entry_id: EntryId) -> AllocationResult<EntrySnapshot> {
        self.get_entry(entry_id)
    }
}

impl<E> ReservationExecutor for std::sync::Arc<E>
where
    E: ReservationExecutor + ?Sized,
{
    fn reserve(&self, record_id: RecordId, holder: UserId, claim: Claim) -> AllocationResult<EntrySnapshot> {
        (**self).reserve(record_id, holder, claim)
    }

    fn cancel(
        &self,
        record_id: RecordId,
        entry_id: EntryId,
        initiator: Initiator,
        note: Option<String>,
    ) -> AllocationResult<EntrySnapshot> {
        (**self).cancel(record_id, entry_id, initiator, note)
    }

    fn entry(&self, entry_id: EntryId) -> AllocationResult<EntrySnapshot> {
        (**self).entry(entry_id)
    }
}
