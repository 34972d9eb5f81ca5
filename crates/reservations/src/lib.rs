//! Reservation domain (pure).
//!
//! Capacity records (trip seats or listing calendars), the entries held
//! against them, and the rules deciding which transitions are legal. No IO:
//! the allocation service in `tripstay-infra` wraps these decisions in the
//! read/decide/conditional-write loop.

pub mod availability;
pub mod entry;
pub mod policy;
pub mod pricing;
pub mod record;
pub mod state_machine;

pub use availability::{
    Availability, booked_ranges, free_nights, held_seats, is_range_free, remaining_seats,
};
pub use entry::{CancelOrigin, CancelReason, Claim, EntryStatus, ReservationEntry};
pub use policy::ReservationPolicy;
pub use pricing::{PriceQuote, TaxPolicy, quote};
pub use record::{
    AttachPayment, Capacity, CapacityRecord, CancelEntry, CancelRecord, CompleteRecord,
    ConfirmPayment, CreateRecord, EntryCancelled, EntryConfirmed, EntryRequested, EntryReserved,
    ExpireStale, Initiator, PaymentAttached, RecordCancelled, RecordChanges, RecordCompleted,
    RecordCreated, RecordStatus, RecordStatusChanged, RecordUpdated, Reserve, ReservationCommand,
    ReservationEvent, UpdateRecord,
};
pub use state_machine::{EntryTransition, RecordTransition};
