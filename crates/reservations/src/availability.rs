//! Availability calculator.
//!
//! Pure functions over a record snapshot. Safe to call on stale snapshots for
//! display; write paths always re-read and recompute inside the conditional
//! write loop.

use serde::{Deserialize, Serialize};

use tripstay_core::DateRange;

use crate::record::{Capacity, CapacityRecord, RecordStatus};

/// Seats currently held by non-cancelled entries.
pub fn held_seats(record: &CapacityRecord) -> u32 {
    record
        .entries()
        .iter()
        .filter(|e| e.holds_capacity())
        .filter_map(|e| e.claim.seat_count())
        .fold(0u32, |acc, n| acc.saturating_add(n))
}

/// `total - held`, clamped at zero. Listings have no seat count and report 0.
pub fn remaining_seats(record: &CapacityRecord) -> u32 {
    match record.capacity() {
        Capacity::Seats { total } => total.saturating_sub(held_seats(record)),
        Capacity::Calendar => 0,
    }
}

/// True iff no non-cancelled stay intersects `range` (half-open comparison).
pub fn is_range_free(record: &CapacityRecord, range: &DateRange) -> bool {
    !record
        .entries()
        .iter()
        .filter(|e| e.holds_capacity())
        .filter_map(|e| e.claim.stay_range())
        .any(|booked| booked.overlaps(range))
}

/// Nights of `range` not covered by any non-cancelled stay.
pub fn free_nights(record: &CapacityRecord, range: &DateRange) -> u32 {
    let booked = booked_ranges(record);
    range
        .from()
        .iter_days()
        .take_while(|day| *day < range.to())
        .filter(|day| !booked.iter().any(|b| b.from() <= *day && *day < b.to()))
        .count() as u32
}

/// Non-cancelled stays ordered by start date.
pub fn booked_ranges(record: &CapacityRecord) -> Vec<DateRange> {
    let mut ranges: Vec<DateRange> = record
        .entries()
        .iter()
        .filter(|e| e.holds_capacity())
        .filter_map(|e| e.claim.stay_range())
        .collect();
    ranges.sort_by_key(|r| (r.from(), r.to()));
    ranges
}

/// Display snapshot returned by `GetAvailability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Availability {
    Seats {
        status: RecordStatus,
        total: u32,
        held: u32,
        remaining: u32,
    },
    Calendar {
        status: RecordStatus,
        booked: Vec<DateRange>,
    },
}

impl Availability {
    pub fn of(record: &CapacityRecord) -> Self {
        match record.capacity() {
            Capacity::Seats { total } => Availability::Seats {
                status: record.status(),
                total,
                held: held_seats(record),
                remaining: remaining_seats(record),
            },
            Capacity::Calendar => Availability::Calendar {
                status: record.status(),
                booked: booked_ranges(record),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CreateRecord, Reserve, ReservationCommand};
    use crate::{CancelEntry, Claim, Initiator, ReservationPolicy};
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;
    use tripstay_core::{Aggregate, DomainError, EntryId, RecordId, UserId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn run(record: &mut CapacityRecord, cmd: ReservationCommand) -> Result<(), DomainError> {
        let events = record.handle(&cmd)?;
        for e in &events {
            record.apply(e);
        }
        Ok(())
    }

    fn trip(total: u32) -> CapacityRecord {
        let id = RecordId::new();
        let mut record = CapacityRecord::empty(id);
        run(
            &mut record,
            ReservationCommand::CreateRecord(CreateRecord {
                record_id: id,
                owner_id: UserId::new(),
                capacity: Capacity::Seats { total },
                window_start: now() + Duration::days(10),
                window_end: now() + Duration::days(10) + Duration::hours(4),
                unit_price: 1500,
                location: None,
                destination: None,
                occurred_at: now(),
            }),
        )
        .unwrap();
        record
    }

    fn listing() -> CapacityRecord {
        let id = RecordId::new();
        let mut record = CapacityRecord::empty(id);
        run(
            &mut record,
            ReservationCommand::CreateRecord(CreateRecord {
                record_id: id,
                owner_id: UserId::new(),
                capacity: Capacity::Calendar,
                window_start: now(),
                window_end: now() + Duration::days(365),
                unit_price: 9000,
                location: None,
                destination: None,
                occurred_at: now(),
            }),
        )
        .unwrap();
        record
    }

    fn reserve(record: &mut CapacityRecord, claim: Claim) -> Result<EntryId, DomainError> {
        let entry_id = EntryId::new();
        run(
            record,
            ReservationCommand::Reserve(Reserve {
                entry_id,
                holder_id: UserId::new(),
                claim,
                occurred_at: now(),
            }),
        )?;
        Ok(entry_id)
    }

    #[test]
    fn remaining_seats_counts_every_non_cancelled_entry() {
        let mut record = trip(4);
        reserve(&mut record, Claim::seats(1)).unwrap();
        let second = reserve(&mut record, Claim::seats(2)).unwrap();
        assert_eq!(remaining_seats(&record), 1);

        let holder = record.entry(second).unwrap().holder_id;
        run(
            &mut record,
            ReservationCommand::CancelEntry(CancelEntry {
                entry_id: second,
                initiator: Initiator::User(holder),
                note: None,
                policy: ReservationPolicy::default(),
                occurred_at: now(),
            }),
        )
        .unwrap();
        assert_eq!(remaining_seats(&record), 3);
    }

    #[test]
    fn free_nights_ignores_booked_nights() {
        let mut record = listing();
        reserve(
            &mut record,
            Claim::stay(DateRange::new(d(6, 1), d(6, 5)).unwrap()),
        )
        .unwrap();

        let wanted = DateRange::new(d(6, 3), d(6, 6)).unwrap();
        assert!(!is_range_free(&record, &wanted));
        assert_eq!(free_nights(&record, &wanted), 1);

        let after = DateRange::new(d(6, 5), d(6, 7)).unwrap();
        assert!(is_range_free(&record, &after));
        assert_eq!(free_nights(&record, &after), 2);
    }

    #[test]
    fn availability_snapshot_for_listing_lists_sorted_bookings() {
        let mut record = listing();
        let late = DateRange::new(d(7, 1), d(7, 3)).unwrap();
        let early = DateRange::new(d(6, 1), d(6, 3)).unwrap();
        reserve(&mut record, Claim::stay(late)).unwrap();
        reserve(&mut record, Claim::stay(early)).unwrap();

        match Availability::of(&record) {
            Availability::Calendar { booked, status } => {
                assert_eq!(status, RecordStatus::Open);
                assert_eq!(booked, vec![early, late]);
            }
            other => panic!("unexpected availability: {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn seats_are_never_oversold(total in 1u32..8, requests in prop::collection::vec(1u32..5, 1..20)) {
            let mut record = trip(total);
            for seats in requests {
                let _ = reserve(&mut record, Claim::seats(seats));
                prop_assert!(held_seats(&record) <= total);
            }
            prop_assert_eq!(remaining_seats(&record), total - held_seats(&record));
        }

        #[test]
        fn stays_never_overlap(stays in prop::collection::vec((0i64..60, 1i64..10), 1..20)) {
            let mut record = listing();
            let base = d(6, 1);
            for (offset, len) in stays {
                let from = base + Duration::days(offset);
                let range = DateRange::new(from, from + Duration::days(len)).unwrap();
                let _ = reserve(&mut record, Claim::stay(range));
            }
            let booked = booked_ranges(&record);
            for pair in booked.windows(2) {
                prop_assert!(!pair[0].overlaps(&pair[1]));
            }
        }
    }
}
