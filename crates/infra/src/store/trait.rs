use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use tripstay_core::{EntryId, ExpectedVersion, RecordId};
use tripstay_reservations::CapacityRecord;

/// Record store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors. The
/// allocation service never surfaces `Concurrency` directly: it feeds the
/// retry loop and becomes a domain conflict once attempts run out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed (expected {expected:?}, found {actual})")]
    Concurrency { expected: ExpectedVersion, actual: u64 },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    Duplicate(RecordId),

    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable storage for capacity records with per-record conditional writes.
///
/// ## Write semantics
///
/// `compare_and_swap()` replaces the whole record iff the stored version
/// matches `expected`, and returns the committed record stamped with the new
/// version (`stored + 1`). Accepted writes on one record are totally ordered;
/// there is no ordering across records and no cross-record transaction.
///
/// ## Read semantics
///
/// `load()` returns a snapshot. Snapshots go stale immediately; callers that
/// write re-read inside their retry loop.
pub trait CapacityStore: Send + Sync {
    /// Load the current snapshot of a record.
    fn load(&self, record_id: RecordId) -> Result<CapacityRecord, StoreError>;

    /// Persist a freshly created record at version 1.
    fn insert(&self, record: CapacityRecord) -> Result<CapacityRecord, StoreError>;

    /// Conditionally replace a record.
    fn compare_and_swap(
        &self,
        record: CapacityRecord,
        expected: ExpectedVersion,
    ) -> Result<CapacityRecord, StoreError>;

    /// Owning record of an entry.
    fn locate_entry(&self, entry_id: EntryId) -> Result<RecordId, StoreError>;

    /// Records holding at least one `pending` or `reserved` entry.
    fn list_expirable(&self) -> Result<Vec<RecordId>, StoreError>;

    /// Trips in `open` status (search candidates).
    fn list_open_trips(&self) -> Result<Vec<CapacityRecord>, StoreError>;
}

impl<S> CapacityStore for Arc<S>
where
    S: CapacityStore + ?Sized,
{
    fn load(&self, record_id: RecordId) -> Result<CapacityRecord, StoreError> {
        (**self).load(record_id)
    }

    fn insert(&self, record: CapacityRecord) -> Result<CapacityRecord, StoreError> {
        (**self).insert(record)
    }

    fn compare_and_swap(
        &self,
        record: CapacityRecord,
        expected: ExpectedVersion,
    ) -> Result<CapacityRecord, StoreError> {
        (**self).compare_and_swap(record, expected)
    }

    fn locate_entry(&self, entry_id: EntryId) -> Result<RecordId, StoreError> {
        (**self).locate_entry(entry_id)
    }

    fn list_expirable(&self) -> Result<Vec<RecordId>, StoreError> {
        (**self).list_expirable()
    }

    fn list_open_trips(&self) -> Result<Vec<CapacityRecord>, StoreError> {
        (**self).list_open_trips()
    }
}
