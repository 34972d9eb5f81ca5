//! Reservation entries: one holder's claim against a capacity record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripstay_core::{DateRange, Entity, EntryId, UserId};

/// Entry lifecycle status.
///
/// `Confirmed` and `Cancelled` are terminal for the payment flow; a confirmed
/// entry may still be cancelled by its holder while the window is ahead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Reserved,
    Confirmed,
    Cancelled,
}

impl EntryStatus {
    /// Whether the entry counts against capacity.
    pub fn holds_capacity(self) -> bool {
        !matches!(self, EntryStatus::Cancelled)
    }

    /// `reserved` or `confirmed`: the states that freeze a record's core fields.
    pub fn is_active(self) -> bool {
        matches!(self, EntryStatus::Reserved | EntryStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Reserved => "reserved",
            EntryStatus::Confirmed => "confirmed",
            EntryStatus::Cancelled => "cancelled",
        }
    }
}

/// What an entry claims: seats on a trip, or nights on a listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Claim {
    Seats { count: u32 },
    Stay { range: DateRange },
}

impl Claim {
    pub fn seats(count: u32) -> Self {
        Claim::Seats { count }
    }

    pub fn stay(range: DateRange) -> Self {
        Claim::Stay { range }
    }

    /// Units consumed: seats for trips, nights for stays.
    pub fn units(&self) -> u32 {
        match self {
            Claim::Seats { count } => *count,
            Claim::Stay { range } => range.nights(),
        }
    }

    pub fn seat_count(&self) -> Option<u32> {
        match self {
            Claim::Seats { count } => Some(*count),
            Claim::Stay { .. } => None,
        }
    }

    pub fn stay_range(&self) -> Option<DateRange> {
        match self {
            Claim::Seats { .. } => None,
            Claim::Stay { range } => Some(*range),
        }
    }
}

/// Who (or what) cancelled an entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOrigin {
    Holder,
    Owner,
    PaymentTimeout,
    RecordCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReason {
    pub origin: CancelOrigin,
    pub note: Option<String>,
}

impl CancelReason {
    pub fn new(origin: CancelOrigin, note: Option<String>) -> Self {
        Self { origin, note }
    }
}

/// A holder's claim against a capacity record.
///
/// Entries are owned by their record and only ever change as part of the
/// record's conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEntry {
    pub id: EntryId,
    pub holder_id: UserId,
    pub claim: Claim,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<CancelReason>,
    /// Gateway reference: attached at checkout, fixed at confirmation.
    pub payment_ref: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ReservationEntry {
    pub fn new(id: EntryId, holder_id: UserId, claim: Claim, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            holder_id,
            claim,
            status: EntryStatus::Pending,
            created_at,
            cancelled_at: None,
            cancel_reason: None,
            payment_ref: None,
            confirmed_at: None,
        }
    }

    pub fn holds_capacity(&self) -> bool {
        self.status.holds_capacity()
    }
}

impl Entity for ReservationEntry {
    type Id = EntryId;

    fn id(&self) -> EntryId {
        self.id
    }
}
