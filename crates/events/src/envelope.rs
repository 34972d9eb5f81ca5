use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tripstay_core::RecordId;

/// Envelope for a committed event, carrying record metadata.
///
/// `record_version` is the version the record reached with the write that
/// produced this event, so consumers can drop stale or duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    record_id: RecordId,
    event_type: String,
    record_version: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        record_id: RecordId,
        event_type: impl Into<String>,
        record_version: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            record_id,
            event_type: event_type.into(),
            record_version,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn record_version(&self) -> u64 {
        self.record_version
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
