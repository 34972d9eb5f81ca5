use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tripstay_core::{DateRange, DomainError, DomainResult, EntryId, GeoPoint, RecordId, UserId};
use tripstay_infra::{RecordDraft, TripSuggestion};
use tripstay_reservations::{
    Availability, Capacity, CapacityRecord, Claim, RecordChanges, RecordStatus,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Trip,
    Listing,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointRequest {
    pub lat: f64,
    pub lon: f64,
}

impl PointRequest {
    fn into_point(self) -> DomainResult<GeoPoint> {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecordRequest {
    pub kind: RecordKind,
    /// Required for trips; rejected for listings.
    pub seats: Option<u32>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub unit_price: u64,
    pub location: Option<PointRequest>,
    pub destination: Option<PointRequest>,
}

impl CreateRecordRequest {
    pub fn into_draft(self) -> DomainResult<RecordDraft> {
        let capacity = match (self.kind, self.seats) {
            (RecordKind::Trip, Some(total)) => Capacity::Seats { total },
            (RecordKind::Trip, None) => return Err(DomainError::validation("trips need seats")),
            (RecordKind::Listing, None) => Capacity::Calendar,
            (RecordKind::Listing, Some(_)) => {
                return Err(DomainError::validation("listings do not take seats"));
            }
        };
        if matches!(capacity, Capacity::Calendar) && self.destination.is_some() {
            return Err(DomainError::validation("listings do not take a destination"));
        }

        Ok(RecordDraft {
            capacity,
            window_start: self.window_start,
            window_end: self.window_end,
            unit_price: self.unit_price,
            location: self.location.map(PointRequest::into_point).transpose()?,
            destination: self.destination.map(PointRequest::into_point).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecordRequest {
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub seats: Option<u32>,
    pub unit_price: Option<u64>,
}

impl UpdateRecordRequest {
    pub fn into_changes(self) -> DomainResult<RecordChanges> {
        let changes = RecordChanges {
            window_start: self.window_start,
            window_end: self.window_end,
            seats: self.seats,
            unit_price: self.unit_price,
        };
        if changes.is_empty() {
            return Err(DomainError::validation("no changes requested"));
        }
        Ok(changes)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoteRequest {
    pub note: Option<String>,
}

impl NoteRequest {
    pub const MAX_NOTE_LEN: usize = 500;

    pub fn into_note(self) -> DomainResult<Option<String>> {
        match self.note {
            Some(n) if n.chars().count() > Self::MAX_NOTE_LEN => {
                Err(DomainError::validation("note is too long"))
            }
            Some(n) if n.trim().is_empty() => Ok(None),
            other => Ok(other),
        }
    }
}

/// Either `seats` (trip) or `from`/`to` (listing stay).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReserveRequest {
    pub seats: Option<u32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReserveRequest {
    pub fn into_claim(self) -> DomainResult<Claim> {
        match (self.seats, self.from, self.to) {
            (Some(seats), None, None) => Ok(Claim::seats(seats)),
            (None, Some(from), Some(to)) => Ok(Claim::stay(DateRange::new(from, to)?)),
            _ => Err(DomainError::validation(
                "provide either seats, or both from and to",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentCallbackRequest {
    pub entry_id: EntryId,
    pub payment_ref: String,
}

impl PaymentCallbackRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.payment_ref.trim().is_empty() {
            return Err(DomainError::validation("payment_ref must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
    #[serde(default = "one_seat")]
    pub seats: u32,
}

fn one_seat() -> u32 {
    1
}

impl SearchQuery {
    pub fn near(&self) -> DomainResult<GeoPoint> {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StayRideRequest {
    pub listing_id: RecordId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub trip_id: RecordId,
    pub seats: u32,
}

impl StayRideRequest {
    pub fn range(&self) -> DomainResult<DateRange> {
        DateRange::new(self.from, self.to)
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Public view of a record; entries are exposed through their own endpoints.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: RecordId,
    pub owner_id: Option<UserId>,
    pub kind: &'static str,
    pub status: RecordStatus,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub unit_price: u64,
    pub location: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub version: u64,
    pub availability: Availability,
}

impl From<&CapacityRecord> for RecordView {
    fn from(record: &CapacityRecord) -> Self {
        use tripstay_core::AggregateRoot;

        Self {
            id: record.record_id(),
            owner_id: record.owner_id(),
            kind: record.capacity().kind(),
            status: record.status(),
            window_start: record.window_start(),
            window_end: record.window_end(),
            unit_price: record.unit_price(),
            location: record.location(),
            destination: record.destination(),
            version: record.version(),
            availability: Availability::of(record),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TripSuggestionView {
    pub trip: RecordView,
    pub distance_m: f64,
    pub remaining: u32,
}

impl From<&TripSuggestion> for TripSuggestionView {
    fn from(s: &TripSuggestion) -> Self {
        Self {
            trip: RecordView::from(&s.record),
            distance_m: s.distance_m,
            remaining: s.remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reserve_request_needs_exactly_one_shape() {
        let seats: ReserveRequest = serde_json::from_value(json!({ "seats": 2 })).unwrap();
        assert_eq!(seats.into_claim().unwrap(), Claim::seats(2));

        let stay: ReserveRequest =
            serde_json::from_value(json!({ "from": "2024-06-01", "to": "2024-06-04" })).unwrap();
        assert_eq!(stay.into_claim().unwrap().units(), 3);

        let both: ReserveRequest =
            serde_json::from_value(json!({ "seats": 1, "from": "2024-06-01", "to": "2024-06-04" }))
                .unwrap();
        assert!(both.into_claim().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: Result<ReserveRequest, _> =
            serde_json::from_value(json!({ "seats": 1, "discount": 50 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn listings_cannot_take_seats() {
        let req: CreateRecordRequest = serde_json::from_value(json!({
            "kind": "listing",
            "seats": 3,
            "window_start": "2024-06-01T00:00:00Z",
            "window_end": "2024-06-30T00:00:00Z",
            "unit_price": 9000,
        }))
        .unwrap();
        assert!(matches!(req.into_draft(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn blank_notes_are_dropped() {
        let req = NoteRequest { note: Some("   ".into()) };
        assert_eq!(req.into_note().unwrap(), None);
        let long = NoteRequest { note: Some("x".repeat(501)) };
        assert!(long.into_note().is_err());
    }
}
