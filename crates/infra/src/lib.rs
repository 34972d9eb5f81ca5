//! Infrastructure layer: record storage, the allocation service, background
//! sweeping, external collaborators and configuration.

pub mod allocation;
pub mod config;
pub mod external;
pub mod retry;
pub mod saga;
pub mod search;
pub mod store;
pub mod sweep;


pub use allocation::{
    AllocationError, AllocationResult, AllocationService, AllocationSettings, AvailabilityView,
    Checkout, EntrySnapshot, RecordDraft, SweepReport,
};
pub use config::{ConfigError, EngineConfig};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use search::{TripQuery, TripSuggestion};
pub use store::{CapacityStore, InMemoryCapacityStore, StoreError};
pub use sweep::{ExpirySweeper, ExpirySweeperHandle};
