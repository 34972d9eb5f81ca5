use std::collections::HashMap;
use std::sync::RwLock;

use tripstay_core::{AggregateRoot, EntryId, ExpectedVersion, RecordId};
use tripstay_reservations::{CapacityRecord, EntryStatus, RecordStatus};

use super::r#trait::{CapacityStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<RecordId, CapacityRecord>,
    entry_index: HashMap<EntryId, RecordId>,
}

impl Tables {
    fn index_entries(&mut self, record: &CapacityRecord) {
        let record_id = record.record_id();
        for entry in record.entries() {
            self.entry_index.insert(entry.id, record_id);
        }
    }
}

/// In-memory capacity record store.
///
/// Intended for tests, dev and single-node runs. A single `RwLock` makes every
/// conditional write atomic; readers get cloned snapshots.
#[derive(Debug, Default)]
pub struct InMemoryCapacityStore {
    tables: RwLock<Tables>,
}

impl InMemoryCapacityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl CapacityStore for InMemoryCapacityStore {
    fn load(&self, record_id: RecordId) -> Result<CapacityRecord, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        tables
            .records
            .get(&record_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id}")))
    }

    fn insert(&self, record: CapacityRecord) -> Result<CapacityRecord, StoreError> {
        let record_id = record.record_id();
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.records.contains_key(&record_id) {
            return Err(StoreError::Duplicate(record_id));
        }

        let committed = record.with_version(1);
        tables.index_entries(&committed);
        tables.records.insert(record_id, committed.clone());
        Ok(committed)
    }

    fn compare_and_swap(
        &self,
        record: CapacityRecord,
        expected: ExpectedVersion,
    ) -> Result<CapacityRecord, StoreError> {
        let record_id = record.record_id();
        let mut tables = self.tables.write().map_err(|_| poisoned())?;

        let current = tables
            .records
            .get(&record_id)
            .map(|r| r.version())
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id}")))?;

        if !expected.matches(current) {
            return Err(StoreError::Concurrency {
                expected,
                actual: current,
            });
        }

        let committed = record.with_version(current + 1);
        tables.index_entries(&committed);
        tables.records.insert(record_id, committed.clone());
        Ok(committed)
    }

    fn locate_entry(&self, entry_id: EntryId) -> Result<RecordId, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        tables
            .entry_index
            .get(&entry_id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("entry {entry_id}")))
    }

    fn list_expirable(&self) -> Result<Vec<RecordId>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let mut ids: Vec<RecordId> = tables
            .records
            .values()
            .filter(|r| {
                r.entries()
                    .iter()
                    .any(|e| matches!(e.status, EntryStatus::Pending | EntryStatus::Reserved))
            })
            .map(|r| r.record_id())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn list_open_trips(&self) -> Result<Vec<CapacityRecord>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .records
            .values()
            .filter(|r| r.is_trip() && r.status() == RecordStatus::Open)
            .cloned()
            .collect())
    }
}
