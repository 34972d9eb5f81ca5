//! Allocation service: the read / decide / conditional-write loop around
//! capacity records.

mod error;
mod service;

pub use error::AllocationError;
pub use service::{
    AllocationResult, AllocationService, AllocationSettings, AvailabilityView, Checkout,
    EntrySnapshot, RecordDraft, SweepReport,
};
