use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tripstay_core::{
    AggregateRoot, Clock, DomainError, EntryId, ExpectedVersion, GeoPoint, RecordId, SystemClock,
    UserId,
};
use tripstay_events::{Event, EventBus, EventEnvelope};
use tripstay_reservations::{
    AttachPayment, Availability, CancelEntry, CancelRecord, Capacity, CapacityRecord, Claim,
    CompleteRecord, ConfirmPayment, CreateRecord, EntryStatus, ExpireStale, Initiator, PriceQuote,
    RecordChanges, Reserve, ReservationCommand, ReservationEntry, ReservationEvent,
    ReservationPolicy, TaxPolicy, UpdateRecord, quote,
};

use crate::allocation::AllocationError;
use crate::config::EngineConfig;
use crate::external::{
    GeoLookup, HaversineGeoLookup, LoggingNotificationSender, NotificationSender, PaymentGateway,
    PaymentRequest, SandboxPaymentGateway, initiate_with_timeout,
};
use crate::retry::RetryPolicy;
use crate::search::{self, TripQuery, TripSuggestion};
use crate::store::{CapacityStore, StoreError};

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Tunables for the allocation service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationSettings {
    pub retry: RetryPolicy,
    pub policy: ReservationPolicy,
    pub tax: TaxPolicy,
    pub gateway_timeout: Duration,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            policy: ReservationPolicy::default(),
            tax: TaxPolicy::default(),
            gateway_timeout: Duration::from_secs(3),
        }
    }
}

impl AllocationSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retry: config.write_retry(),
            policy: config.reservation_policy(),
            tax: config.tax,
            gateway_timeout: config.gateway_timeout,
        }
    }
}

/// Owner input for a new trip or listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub capacity: Capacity,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub unit_price: u64,
    pub location: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
}

/// An entry together with the record version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub record_id: RecordId,
    pub record_version: u64,
    pub entry: ReservationEntry,
}

impl EntrySnapshot {
    fn from_record(record: &CapacityRecord, entry_id: EntryId) -> AllocationResult<Self> {
        let entry = record.entry(entry_id).ok_or(DomainError::NotFound)?;
        Ok(Self {
            record_id: record.record_id(),
            record_version: record.version(),
            entry: entry.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityView {
    pub record_id: RecordId,
    pub version: u64,
    pub availability: Availability,
}

/// Result of starting a checkout with the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkout {
    pub entry_id: EntryId,
    pub quote: PriceQuote,
    pub redirect_url: String,
    pub payment_ref: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Allocation service: the only writer of capacity records.
///
/// Every mutation runs the same loop:
///
/// ```text
/// load snapshot (version v)
///   ↓
/// decide on a scratch copy (pure; guard failures return here)
///   ↓
/// compare_and_swap(expected = v) ── conflict ──→ backoff, reload (bounded)
///   ↓
/// publish events, notify holders (after commit, failures only logged)
/// ```
///
/// No in-process lock is held across the loop; correctness rests on the
/// store's per-record conditional write.
pub struct AllocationService<S, B> {
    store: S,
    bus: B,
    notifier: Arc<dyn NotificationSender>,
    gateway: Arc<dyn PaymentGateway>,
    geo: Arc<dyn GeoLookup>,
    clock: Arc<dyn Clock>,
    settings: AllocationSettings,
}

impl<S, B> AllocationService<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            notifier: Arc::new(LoggingNotificationSender),
            gateway: Arc::new(SandboxPaymentGateway::default()),
            geo: Arc::new(HaversineGeoLookup),
            clock: Arc::new(SystemClock),
            settings: AllocationSettings::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_geo(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = geo;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: AllocationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AllocationSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl<S, B> AllocationService<S, B>
where
    S: CapacityStore,
    B: EventBus<EventEnvelope<ReservationEvent>>,
{
    pub fn create_record(&self, owner: UserId, draft: RecordDraft) -> AllocationResult<CapacityRecord> {
        let record_id = RecordId::new();
        let command = ReservationCommand::CreateRecord(CreateRecord {
            record_id,
            owner_id: owner,
            capacity: draft.capacity,
            window_start: draft.window_start,
            window_end: draft.window_end,
            unit_price: draft.unit_price,
            location: draft.location,
            destination: draft.destination,
            occurred_at: self.clock.now(),
        });
        let (record, events) = CapacityRecord::empty(record_id).decide(&command)?;
        let committed = self.store.insert(record)?;

        info!(record_id = %record_id, kind = committed.capacity().kind(), "record created");
        self.after_commit(&committed, &events);
        Ok(committed)
    }

    pub fn reserve(
        &self,
        record_id: RecordId,
        holder: UserId,
        claim: Claim,
    ) -> AllocationResult<EntrySnapshot> {
        let entry_id = EntryId::new();
        let (record, _) = self.execute(record_id, |now| {
            ReservationCommand::Reserve(Reserve {
                entry_id,
                holder_id: holder,
                claim,
                occurred_at: now,
            })
        })?;
        EntrySnapshot::from_record(&record, entry_id)
    }

    /// Holder cancels their own entry.
    pub fn cancel(
        &self,
        record_id: RecordId,
        entry_id: EntryId,
        initiator: Initiator,
        note: Option<String>,
    ) -> AllocationResult<EntrySnapshot> {
        let policy = self.settings.policy;
        let (record, _) = self.execute(record_id, |now| {
            ReservationCommand::CancelEntry(CancelEntry {
                entry_id,
                initiator,
                note: note.clone(),
                policy,
                occurred_at: now,
            })
        })?;
        EntrySnapshot::from_record(&record, entry_id)
    }

    /// Gateway callback. Replaying the same reference is a no-op.
    pub fn confirm_via_payment(
        &self,
        entry_id: EntryId,
        payment_ref: &str,
    ) -> AllocationResult<EntrySnapshot> {
        let record_id = self.store.locate_entry(entry_id)?;
        let (record, _) = self.execute(record_id, |now| {
            ReservationCommand::ConfirmPayment(ConfirmPayment {
                entry_id,
                payment_ref: payment_ref.to_string(),
                occurred_at: now,
            })
        })?;
        EntrySnapshot::from_record(&record, entry_id)
    }

    pub fn get_availability(&self, record_id: RecordId) -> AllocationResult<AvailabilityView> {
        let record = self.store.load(record_id)?;
        Ok(AvailabilityView {
            record_id,
            version: record.version(),
            availability: Availability::of(&record),
        })
    }

    pub fn get_record(&self, record_id: RecordId) -> AllocationResult<CapacityRecord> {
        Ok(self.store.load(record_id)?)
    }

    pub fn get_entry(&self, entry_id: EntryId) -> AllocationResult<EntrySnapshot> {
        let record_id = self.store.locate_entry(entry_id)?;
        let record = self.store.load(record_id)?;
        EntrySnapshot::from_record(&record, entry_id)
    }

    /// Cancel the whole record, cascading to every live entry.
    pub fn owner_cancel_record(
        &self,
        record_id: RecordId,
        initiator: Initiator,
        note: Option<String>,
    ) -> AllocationResult<CapacityRecord> {
        let (record, _) = self.execute(record_id, |now| {
            ReservationCommand::CancelRecord(CancelRecord {
                initiator,
                note: note.clone(),
                occurred_at: now,
            })
        })?;
        Ok(record)
    }

    pub fn owner_update_record(
        &self,
        record_id: RecordId,
        owner: UserId,
        changes: RecordChanges,
    ) -> AllocationResult<CapacityRecord> {
        let (record, _) = self.execute(record_id, |now| {
            ReservationCommand::UpdateRecord(UpdateRecord {
                caller: owner,
                changes: changes.clone(),
                occurred_at: now,
            })
        })?;
        Ok(record)
    }

    pub fn complete_record(
        &self,
        record_id: RecordId,
        initiator: Initiator,
    ) -> AllocationResult<CapacityRecord> {
        let (record, _) = self.execute(record_id, |now| {
            ReservationCommand::CompleteRecord(CompleteRecord {
                initiator,
                occurred_at: now,
            })
        })?;
        Ok(record)
    }

    /// Start checkout for a reserved entry.
    ///
    /// The gateway is called before any state change; its failure is
    /// returned as-is and leaves the record untouched.
    pub fn begin_payment(&self, entry_id: EntryId, caller: UserId) -> AllocationResult<Checkout> {
        let record_id = self.store.locate_entry(entry_id)?;
        let record = self.store.load(record_id)?;
        let entry = record.entry(entry_id).ok_or(DomainError::NotFound)?;

        if entry.holder_id != caller {
            return Err(DomainError::Unauthorized.into());
        }
        if entry.status != EntryStatus::Reserved {
            return Err(DomainError::conflict(format!(
                "cannot pay for a {} entry",
                entry.status.as_str()
            ))
            .into());
        }
        if entry.payment_ref.is_some() {
            return Err(DomainError::conflict("checkout already started for this entry").into());
        }

        let price = quote(&record, &entry.claim, self.settings.tax)?;
        let request = PaymentRequest {
            entry_id,
            amount: price.charged_total,
            customer: caller,
        };
        let redirect = initiate_with_timeout(
            Arc::clone(&self.gateway),
            request,
            self.settings.gateway_timeout,
        )
        .inspect_err(|e| {
            warn!(record_id = %record_id, entry_id = %entry_id, error = %e, "payment initiation failed");
        })?;

        self.execute(record_id, |now| {
            ReservationCommand::AttachPayment(AttachPayment {
                entry_id,
                caller,
                payment_ref: redirect.payment_ref.clone(),
                occurred_at: now,
            })
        })?;

        Ok(Checkout {
            entry_id,
            quote: price,
            redirect_url: redirect.redirect_url,
            payment_ref: redirect.payment_ref,
        })
    }

    /// Cancel overdue unpaid entries on one record. Returns how many expired.
    pub fn expire_stale(&self, record_id: RecordId) -> AllocationResult<usize> {
        let policy = self.settings.policy;
        let (_, events) = self.execute(record_id, |now| {
            ReservationCommand::ExpireStale(ExpireStale {
                policy,
                occurred_at: now,
            })
        })?;
        Ok(events
            .iter()
            .filter(|e| matches!(e, ReservationEvent::EntryCancelled(_)))
            .count())
    }

    /// One sweep pass over every record holding unpaid entries.
    ///
    /// Failures are logged and left for the next pass.
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let candidates = match self.store.list_expirable() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "sweep could not list candidate records");
                report.failed += 1;
                return report;
            }
        };

        for record_id in candidates {
            report.scanned += 1;
            match self.expire_stale(record_id) {
                Ok(expired) => report.expired += expired,
                Err(AllocationError::Store(e)) => {
                    error!(record_id = %record_id, error = %e, "sweep store failure");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "sweep skipped record");
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                failed = report.failed,
                "expiry sweep finished"
            );
        }
        report
    }

    pub fn suggest_trips(
        &self,
        near: GeoPoint,
        radius_m: f64,
        seats: u32,
    ) -> AllocationResult<Vec<TripSuggestion>> {
        let query = TripQuery::new(near, radius_m, seats)?;
        Ok(search::suggest_trips(
            &self.store,
            self.geo.as_ref(),
            &query,
            self.clock.now(),
        )?)
    }

    /// Read, decide, conditionally write; retry on version conflicts.
    ///
    /// `make` is re-invoked on every attempt so each decision sees a fresh
    /// timestamp and snapshot. A decision with no events commits nothing.
    fn execute<F>(
        &self,
        record_id: RecordId,
        make: F,
    ) -> AllocationResult<(CapacityRecord, Vec<ReservationEvent>)>
    where
        F: Fn(DateTime<Utc>) -> ReservationCommand,
    {
        let retry = self.settings.retry;
        let mut attempt = 1u32;

        loop {
            let current = self.store.load(record_id)?;
            let command = make(self.clock.now());
            let (next, events) = current.decide(&command)?;
            if events.is_empty() {
                return Ok((current, events));
            }

            let expected = ExpectedVersion::Exact(current.version());
            match self.store.compare_and_swap(next, expected) {
                Ok(committed) => {
                    self.after_commit(&committed, &events);
                    return Ok((committed, events));
                }
                Err(StoreError::Concurrency { actual, .. }) if retry.should_retry(attempt) => {
                    let delay = retry.delay_for_attempt(attempt);
                    debug!(
                        record_id = %record_id,
                        attempt,
                        expected = current.version(),
                        actual,
                        delay_ms = delay.as_millis() as u64,
                        "version conflict, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(StoreError::Concurrency { actual, .. }) => {
                    warn!(record_id = %record_id, attempt, actual, "write retries exhausted");
                    return Err(AllocationError::Contended {
                        record_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn after_commit(&self, record: &CapacityRecord, events: &[ReservationEvent]) {
        for event in events {
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                record.record_id(),
                event.event_type(),
                record.version(),
                event.clone(),
            );
            if let Err(e) = self.bus.publish(envelope) {
                warn!(
                    record_id = %record.record_id(),
                    event_type = event.event_type(),
                    error = ?e,
                    "event publish failed after commit"
                );
            }
        }

        for event in events {
            self.notify(event);
        }
    }

    fn notify(&self, event: &ReservationEvent) {
        let (recipient, template, data) = match event {
            ReservationEvent::EntryReserved(e) => (
                e.holder_id,
                "reservation_reserved",
                json!({ "record_id": e.record_id, "entry_id": e.entry_id, "claim": e.claim }),
            ),
            ReservationEvent::EntryConfirmed(e) => (
                e.holder_id,
                "reservation_confirmed",
                json!({ "record_id": e.record_id, "entry_id": e.entry_id, "payment_ref": e.payment_ref }),
            ),
            ReservationEvent::EntryCancelled(e) => (
                e.holder_id,
                "reservation_cancelled",
                json!({ "record_id": e.record_id, "entry_id": e.entry_id, "reason": e.reason }),
            ),
            _ => return,
        };

        if let Err(e) = self.notifier.send(recipient, template, &data) {
            warn!(
                recipient = %recipient,
                template,
                error = %e,
                "notification delivery failed"
            );
        }
    }
}
