//! Trip suggestions near a point.
//!
//! Read-only: results come from a store snapshot and may be stale by the
//! time the caller reserves. `Reserve` re-checks everything.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tripstay_core::{DomainError, DomainResult, GeoPoint};
use tripstay_reservations::{CapacityRecord, remaining_seats};

use crate::external::GeoLookup;
use crate::store::{CapacityStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripQuery {
    near: GeoPoint,
    radius_m: f64,
    seats: u32,
}

impl TripQuery {
    pub fn new(near: GeoPoint, radius_m: f64, seats: u32) -> DomainResult<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(DomainError::validation("radius must be a positive number of meters"));
        }
        if seats == 0 {
            return Err(DomainError::validation("seat count must be positive"));
        }
        Ok(Self {
            near,
            radius_m,
            seats,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSuggestion {
    pub record: CapacityRecord,
    pub distance_m: f64,
    pub remaining: u32,
}

/// Open trips departing after `now` whose origin lies within the radius
/// and that still fit the requested seats, nearest first.
pub fn suggest_trips<S>(
    store: &S,
    geo: &dyn GeoLookup,
    query: &TripQuery,
    now: DateTime<Utc>,
) -> Result<Vec<TripSuggestion>, StoreError>
where
    S: CapacityStore + ?Sized,
{
    let mut hits: Vec<TripSuggestion> = store
        .list_open_trips()?
        .into_iter()
        .filter(|trip| trip.window_start() > now)
        .filter_map(|trip| {
            let origin = trip.location()?;
            let distance_m = geo.distance_between(query.near, origin);
            let remaining = remaining_seats(&trip);
            (distance_m <= query.radius_m && remaining >= query.seats).then_some(TripSuggestion {
                record: trip,
                distance_m,
                remaining,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.window_start().cmp(&b.record.window_start()))
    });
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tripstay_core::{RecordId, UserId};
    use tripstay_reservations::{Capacity, Claim, CreateRecord, Reserve, ReservationCommand};

    use crate::external::HaversineGeoLookup;
    use crate::store::InMemoryCapacityStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn seed(store: &InMemoryCapacityStore, origin: (f64, f64), seats: u32, departs_in: Duration) -> RecordId {
        let id = RecordId::new();
        let start = now() + departs_in;
        let (record, _) = CapacityRecord::empty(id)
            .decide(&ReservationCommand::CreateRecord(CreateRecord {
                record_id: id,
                owner_id: UserId::new(),
                capacity: Capacity::Seats { total: seats },
                window_start: start,
                window_end: start + Duration::hours(2),
                unit_price: 1000,
                location: Some(GeoPoint::new(origin.0, origin.1).unwrap()),
                destination: None,
                occurred_at: now() - Duration::days(10),
            }))
            .unwrap();
        store.insert(record).unwrap();
        id
    }

    #[test]
    fn nearest_fitting_trips_come_first() {
        let store = InMemoryCapacityStore::new();
        let alexanderplatz = (52.5219, 13.4132);
        let potsdam = seed(&store, (52.3906, 13.0645), 3, Duration::days(1));
        let mitte = seed(&store, (52.5200, 13.4050), 3, Duration::days(2));
        let _hamburg = seed(&store, (53.5511, 9.9937), 3, Duration::days(1));
        let _departed = seed(&store, (52.5200, 13.4050), 3, Duration::hours(-1));
        let _too_small = seed(&store, (52.5200, 13.4050), 1, Duration::days(1));

        let near = GeoPoint::new(alexanderplatz.0, alexanderplatz.1).unwrap();
        let query = TripQuery::new(near, 50_000.0, 2).unwrap();
        let hits = suggest_trips(&store, &HaversineGeoLookup, &query, now()).unwrap();

        let ids: Vec<RecordId> = hits.iter().map(|h| h.record.record_id()).collect();
        assert_eq!(ids, vec![mitte, potsdam]);
        assert!(hits[0].distance_m < hits[1].distance_m);
    }

    #[test]
    fn partially_booked_trips_report_what_is_left() {
        let store = InMemoryCapacityStore::new();
        let id = seed(&store, (52.52, 13.405), 4, Duration::days(1));
        let current = store.load(id).unwrap();
        let (next, _) = current
            .decide(&ReservationCommand::Reserve(Reserve {
                entry_id: tripstay_core::EntryId::new(),
                holder_id: UserId::new(),
                claim: Claim::seats(3),
                occurred_at: now(),
            }))
            .unwrap();
        store
            .compare_and_swap(next, tripstay_core::ExpectedVersion::Exact(1))
            .unwrap();

        let near = GeoPoint::new(52.52, 13.405).unwrap();
        let fits_one = TripQuery::new(near, 1_000.0, 1).unwrap();
        let hits = suggest_trips(&store, &HaversineGeoLookup, &fits_one, now()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].remaining, 1);

        let wants_two = TripQuery::new(near, 1_000.0, 2).unwrap();
        assert!(suggest_trips(&store, &HaversineGeoLookup, &wants_two, now()).unwrap().is_empty());
    }

    #[test]
    fn query_rejects_nonsense() {
        let near = GeoPoint::new(0.0, 0.0).unwrap();
        assert!(TripQuery::new(near, 0.0, 1).is_err());
        assert!(TripQuery::new(near, f64::NAN, 1).is_err());
        assert!(TripQuery::new(near, 10.0, 0).is_err());
    }
}
