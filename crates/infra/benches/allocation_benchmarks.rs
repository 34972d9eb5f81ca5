use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chrono::{Duration, NaiveDate, Utc};
use tripstay_core::{DateRange, EntryId, RecordId, UserId};
use tripstay_events::{EventEnvelope, InMemoryEventBus};
use tripstay_infra::{AllocationService, InMemoryCapacityStore, RecordDraft};
use tripstay_reservations::{
    Availability, Capacity, CapacityRecord, Claim, CreateRecord, Initiator, Reserve,
    ReservationCommand, ReservationEvent, is_range_free,
};

type Service = AllocationService<InMemoryCapacityStore, InMemoryEventBus<EventEnvelope<ReservationEvent>>>;

fn service() -> Service {
    AllocationService::new(InMemoryCapacityStore::new(), InMemoryEventBus::new())
}

fn trip_draft(seats: u32) -> RecordDraft {
    let start = Utc::now() + Duration::days(30);
    RecordDraft {
        capacity: Capacity::Seats { total: seats },
        window_start: start,
        window_end: start + Duration::hours(5),
        unit_price: 2000,
        location: None,
        destination: None,
    }
}

/// A record with `count` live entries, built without going through a store.
fn record_with_entries(capacity: Capacity, count: u32) -> CapacityRecord {
    let now = Utc::now();
    let id = RecordId::new();
    let (mut record, _) = CapacityRecord::empty(id)
        .decide(&ReservationCommand::CreateRecord(CreateRecord {
            record_id: id,
            owner_id: UserId::new(),
            capacity,
            window_start: now + Duration::days(1),
            window_end: now + Duration::days(4 * i64::from(count) + 30),
            unit_price: 1000,
            location: None,
            destination: None,
            occurred_at: now - Duration::days(2),
        }))
        .unwrap();

    let first_night = (now + Duration::days(2)).date_naive();
    for i in 0..count {
        let claim = match capacity {
            Capacity::Seats { .. } => Claim::seats(1),
            Capacity::Calendar => {
                let from = first_night + Duration::days(2 * i64::from(i));
                Claim::stay(DateRange::new(from, from + Duration::days(1)).unwrap())
            }
        };
        let (next, _) = record
            .decide(&ReservationCommand::Reserve(Reserve {
                entry_id: EntryId::new(),
                holder_id: UserId::new(),
                claim,
                occurred_at: now,
            }))
            .unwrap();
        record = next;
    }
    record
}

fn bench_reserve_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("reserve_latency");

    group.bench_function("reserve_then_cancel", |b| {
        let svc = service();
        let trip = svc.create_record(UserId::new(), trip_draft(4)).unwrap();
        b.iter(|| {
            let holder = UserId::new();
            let snap = svc
                .reserve(trip.record_id(), holder, black_box(Claim::seats(2)))
                .unwrap();
            svc.cancel(trip.record_id(), snap.entry.id, Initiator::User(holder), None)
                .unwrap();
        });
    });

    group.bench_function("rejected_for_capacity", |b| {
        let svc = service();
        let trip = svc.create_record(UserId::new(), trip_draft(2)).unwrap();
        b.iter(|| {
            let err = svc
                .reserve(trip.record_id(), UserId::new(), black_box(Claim::seats(3)))
                .unwrap_err();
            black_box(err);
        });
    });

    group.finish();
}

fn bench_availability(c: &mut Criterion) {
    let mut group = c.benchmark_group("availability");

    for entries in [10u32, 100, 1000] {
        let trip = record_with_entries(Capacity::Seats { total: entries * 2 }, entries);
        group.bench_with_input(BenchmarkId::new("seats", entries), &trip, |b, trip| {
            b.iter(|| black_box(Availability::of(trip)));
        });

        let listing = record_with_entries(Capacity::Calendar, entries);
        let wanted = DateRange::new(
            NaiveDate::from_ymd_opt(2100, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2100, 1, 8).unwrap(),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("calendar_lookup", entries), &listing, |b, listing| {
            b.iter(|| black_box(is_range_free(listing, &wanted)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reserve_latency, bench_availability);
criterion_main!(benches);
