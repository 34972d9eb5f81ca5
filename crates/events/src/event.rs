use chrono::{DateTime, Utc};

/// A fact about a committed state change.
///
/// Only emitted after the conditional write that produced it succeeded, so
/// consumers never see an event for a change that was rolled back.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. `"entry.confirmed"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version.
    fn version(&self) -> u32;

    fn occurred_at(&self) -> DateTime<Utc>;
}
