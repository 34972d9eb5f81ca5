use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use tripstay_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, EntryId, GeoPoint, RecordId, UserId,
    position_of,
};
use tripstay_events::Event;

use crate::availability::{free_nights, held_seats, is_range_free, remaining_seats};
use crate::entry::{CancelOrigin, CancelReason, Claim, EntryStatus, ReservationEntry};
use crate::policy::{ReservationPolicy, ensure_window_ahead};
use crate::state_machine::{EntryTransition, RecordTransition};

/// What a record offers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capacity {
    /// A trip with a fixed number of seats.
    Seats { total: u32 },
    /// A listing: one guest party per night.
    Calendar,
}

impl Capacity {
    pub fn is_trip(&self) -> bool {
        matches!(self, Capacity::Seats { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Capacity::Seats { .. } => "trip",
            Capacity::Calendar => "listing",
        }
    }
}

/// Record status lifecycle.
///
/// Moves forward only, except `locked → open` once capacity frees up.
/// `locked` is a search hint; write paths always recompute availability.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Open,
    Locked,
    Cancelled,
    Completed,
}

impl RecordStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Cancelled | RecordStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Open => "open",
            RecordStatus::Locked => "locked",
            RecordStatus::Cancelled => "cancelled",
            RecordStatus::Completed => "completed",
        }
    }
}

/// Aggregate root: a trip or listing with the entries held against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRecord {
    id: RecordId,
    owner_id: Option<UserId>,
    capacity: Capacity,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    /// Minor currency units per seat (trip) or per night (listing).
    unit_price: u64,
    location: Option<GeoPoint>,
    destination: Option<GeoPoint>,
    status: RecordStatus,
    entries: Vec<ReservationEntry>,
    version: u64,
    created: bool,
}

impl CapacityRecord {
    /// Create an empty, not-yet-created record for a `CreateRecord` command.
    pub fn empty(id: RecordId) -> Self {
        Self {
            id,
            owner_id: None,
            capacity: Capacity::Calendar,
            window_start: DateTime::<Utc>::default(),
            window_end: DateTime::<Utc>::default(),
            unit_price: 0,
            location: None,
            destination: None,
            status: RecordStatus::Open,
            entries: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Same record stamped with the version a store assigned to it.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn record_id(&self) -> RecordId {
        self.id
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn is_trip(&self) -> bool {
        self.capacity.is_trip()
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.destination
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn entries(&self) -> &[ReservationEntry] {
        &self.entries
    }

    pub fn entry(&self, entry_id: EntryId) -> Option<&ReservationEntry> {
        position_of(&self.entries, entry_id).map(|i| &self.entries[i])
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Any entry in `reserved` or `confirmed`.
    pub fn has_active_entries(&self) -> bool {
        self.entries.iter().any(|e| e.status.is_active())
    }

    /// Run a command against a scratch copy: the next state plus the events
    /// that produced it. `self` is left untouched.
    pub fn decide(&self, command: &ReservationCommand) -> DomainResult<(Self, Vec<ReservationEvent>)> {
        let events = self.handle(command)?;
        let mut next = self.clone();
        for event in &events {
            next.apply(event);
        }
        Ok((next, events))
    }

    fn entry_mut(&mut self, entry_id: EntryId) -> Option<&mut ReservationEntry> {
        position_of(&self.entries, entry_id).map(|i| &mut self.entries[i])
    }
}

impl AggregateRoot for CapacityRecord {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Who is acting on a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Initiator {
    User(UserId),
    /// Scheduler or operator acting on behalf of the platform.
    System,
}

/// Command: CreateRecord.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRecord {
    pub record_id: RecordId,
    pub owner_id: UserId,
    pub capacity: Capacity,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub unit_price: u64,
    pub location: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub occurred_at: DateTime<Utc>,
}

/// Owner patch. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChanges {
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub seats: Option<u32>,
    pub unit_price: Option<u64>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.window_start.is_none()
            && self.window_end.is_none()
            && self.seats.is_none()
            && self.unit_price.is_none()
    }

    /// Date, time or capacity edits; price is not a core field.
    pub fn touches_core_fields(&self) -> bool {
        self.window_start.is_some() || self.window_end.is_some() || self.seats.is_some()
    }
}

/// Command: UpdateRecord.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub caller: UserId,
    pub changes: RecordChanges,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reserve.
#[derive(Debug, Clone, PartialEq)]
pub struct Reserve {
    pub entry_id: EntryId,
    pub holder_id: UserId,
    pub claim: Claim,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelEntry (holder-initiated).
#[derive(Debug, Clone, PartialEq)]
pub struct CancelEntry {
    pub entry_id: EntryId,
    pub initiator: Initiator,
    pub note: Option<String>,
    pub policy: ReservationPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachPayment (checkout started with the gateway).
#[derive(Debug, Clone, PartialEq)]
pub struct AttachPayment {
    pub entry_id: EntryId,
    pub caller: UserId,
    pub payment_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment (gateway callback).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmPayment {
    pub entry_id: EntryId,
    pub payment_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireStale (sweeper).
#[derive(Debug, Clone, PartialEq)]
pub struct ExpireStale {
    pub policy: ReservationPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRecord (owner cancels the whole record).
#[derive(Debug, Clone, PartialEq)]
pub struct CancelRecord {
    pub initiator: Initiator,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteRecord.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRecord {
    pub initiator: Initiator,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReservationCommand {
    CreateRecord(CreateRecord),
    UpdateRecord(UpdateRecord),
    Reserve(Reserve),
    CancelEntry(CancelEntry),
    AttachPayment(AttachPayment),
    ConfirmPayment(ConfirmPayment),
    ExpireStale(ExpireStale),
    CancelRecord(CancelRecord),
    CompleteRecord(CompleteRecord),
}

/// Event: RecordCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordCreated {
    pub record_id: RecordId,
    pub owner_id: UserId,
    pub capacity: Capacity,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub unit_price: u64,
    pub location: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecordUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdated {
    pub record_id: RecordId,
    pub changes: RecordChanges,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryRequested (entry appended as `pending`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequested {
    pub record_id: RecordId,
    pub entry_id: EntryId,
    pub holder_id: UserId,
    pub claim: Claim,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryReserved (capacity provisionally committed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReserved {
    pub record_id: RecordId,
    pub entry_id: EntryId,
    pub holder_id: UserId,
    pub claim: Claim,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttached {
    pub record_id: RecordId,
    pub entry_id: EntryId,
    pub payment_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfirmed {
    pub record_id: RecordId,
    pub entry_id: EntryId,
    pub holder_id: UserId,
    pub payment_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCancelled {
    pub record_id: RecordId,
    pub entry_id: EntryId,
    pub holder_id: UserId,
    pub reason: CancelReason,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecordStatusChanged (`open ⇄ locked`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatusChanged {
    pub record_id: RecordId,
    pub from: RecordStatus,
    pub to: RecordStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecordCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCancelled {
    pub record_id: RecordId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecordCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCompleted {
    pub record_id: RecordId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ReservationEvent {
    RecordCreated(RecordCreated),
    RecordUpdated(RecordUpdated),
    EntryRequested(EntryRequested),
    EntryReserved(EntryReserved),
    PaymentAttached(PaymentAttached),
    EntryConfirmed(EntryConfirmed),
    EntryCancelled(EntryCancelled),
    RecordStatusChanged(RecordStatusChanged),
    RecordCancelled(RecordCancelled),
    RecordCompleted(RecordCompleted),
}

impl ReservationEvent {
    pub fn record_id(&self) -> RecordId {
        match self {
            ReservationEvent::RecordCreated(e) => e.record_id,
            ReservationEvent::RecordUpdated(e) => e.record_id,
            ReservationEvent::EntryRequested(e) => e.record_id,
            ReservationEvent::EntryReserved(e) => e.record_id,
            ReservationEvent::PaymentAttached(e) => e.record_id,
            ReservationEvent::EntryConfirmed(e) => e.record_id,
            ReservationEvent::EntryCancelled(e) => e.record_id,
            ReservationEvent::RecordStatusChanged(e) => e.record_id,
            ReservationEvent::RecordCancelled(e) => e.record_id,
            ReservationEvent::RecordCompleted(e) => e.record_id,
        }
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        match self {
            ReservationEvent::EntryRequested(e) => Some(e.entry_id),
            ReservationEvent::EntryReserved(e) => Some(e.entry_id),
            ReservationEvent::PaymentAttached(e) => Some(e.entry_id),
            ReservationEvent::EntryConfirmed(e) => Some(e.entry_id),
            ReservationEvent::EntryCancelled(e) => Some(e.entry_id),
            _ => None,
        }
    }
}

impl Event for ReservationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::RecordCreated(_) => "record.created",
            ReservationEvent::RecordUpdated(_) => "record.updated",
            ReservationEvent::EntryRequested(_) => "entry.requested",
            ReservationEvent::EntryReserved(_) => "entry.reserved",
            ReservationEvent::PaymentAttached(_) => "entry.payment_attached",
            ReservationEvent::EntryConfirmed(_) => "entry.confirmed",
            ReservationEvent::EntryCancelled(_) => "entry.cancelled",
            ReservationEvent::RecordStatusChanged(e) => match e.to {
                RecordStatus::Locked => "record.locked",
                _ => "record.reopened",
            },
            ReservationEvent::RecordCancelled(_) => "record.cancelled",
            ReservationEvent::RecordCompleted(_) => "record.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReservationEvent::RecordCreated(e) => e.occurred_at,
            ReservationEvent::RecordUpdated(e) => e.occurred_at,
            ReservationEvent::EntryRequested(e) => e.occurred_at,
            ReservationEvent::EntryReserved(e) => e.occurred_at,
            ReservationEvent::PaymentAttached(e) => e.occurred_at,
            ReservationEvent::EntryConfirmed(e) => e.occurred_at,
            ReservationEvent::EntryCancelled(e) => e.occurred_at,
            ReservationEvent::RecordStatusChanged(e) => e.occurred_at,
            ReservationEvent::RecordCancelled(e) => e.occurred_at,
            ReservationEvent::RecordCompleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CapacityRecord {
    type Command = ReservationCommand;
    type Event = ReservationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReservationEvent::RecordCreated(e) => {
                self.id = e.record_id;
                self.owner_id = Some(e.owner_id);
                self.capacity = e.capacity;
                self.window_start = e.window_start;
                self.window_end = e.window_end;
                self.unit_price = e.unit_price;
                self.location = e.location;
                self.destination = e.destination;
                self.status = RecordStatus::Open;
                self.entries.clear();
                self.created = true;
            }
            ReservationEvent::RecordUpdated(e) => {
                if let Some(start) = e.changes.window_start {
                    self.window_start = start;
                }
                if let Some(end) = e.changes.window_end {
                    self.window_end = end;
                }
                if let Some(total) = e.changes.seats {
                    self.capacity = Capacity::Seats { total };
                }
                if let Some(price) = e.changes.unit_price {
                    self.unit_price = price;
                }
            }
            ReservationEvent::EntryRequested(e) => {
                self.entries.push(ReservationEntry::new(
                    e.entry_id,
                    e.holder_id,
                    e.claim,
                    e.occurred_at,
                ));
            }
            ReservationEvent::EntryReserved(e) => {
                if let Some(entry) = self.entry_mut(e.entry_id) {
                    entry.status = EntryStatus::Reserved;
                }
            }
            ReservationEvent::PaymentAttached(e) => {
                if let Some(entry) = self.entry_mut(e.entry_id) {
                    entry.payment_ref = Some(e.payment_ref.clone());
                }
            }
            ReservationEvent::EntryConfirmed(e) => {
                if let Some(entry) = self.entry_mut(e.entry_id) {
                    entry.status = EntryStatus::Confirmed;
                    entry.payment_ref = Some(e.payment_ref.clone());
                    entry.confirmed_at = Some(e.occurred_at);
                }
            }
            ReservationEvent::EntryCancelled(e) => {
                if let Some(entry) = self.entry_mut(e.entry_id) {
                    entry.status = EntryStatus::Cancelled;
                    entry.cancelled_at = Some(e.occurred_at);
                    entry.cancel_reason = Some(e.reason.clone());
                }
            }
            ReservationEvent::RecordStatusChanged(e) => {
                self.status = e.to;
            }
            ReservationEvent::RecordCancelled(_) => {
                self.status = RecordStatus::Cancelled;
            }
            ReservationEvent::RecordCompleted(_) => {
                self.status = RecordStatus::Completed;
            }
        }
        // No version bump here: the store assigns versions on commit.
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReservationCommand::CreateRecord(cmd) => self.handle_create(cmd),
            ReservationCommand::UpdateRecord(cmd) => self.handle_update(cmd),
            ReservationCommand::Reserve(cmd) => self.handle_reserve(cmd),
            ReservationCommand::CancelEntry(cmd) => self.handle_cancel_entry(cmd),
            ReservationCommand::AttachPayment(cmd) => self.handle_attach_payment(cmd),
            ReservationCommand::ConfirmPayment(cmd) => self.handle_confirm_payment(cmd),
            ReservationCommand::ExpireStale(cmd) => self.handle_expire_stale(cmd),
            ReservationCommand::CancelRecord(cmd) => self.handle_cancel_record(cmd),
            ReservationCommand::CompleteRecord(cmd) => self.handle_complete_record(cmd),
        }
    }
}

/// Start of the first night of a stay.
fn stay_start(claim: &Claim) -> Option<DateTime<Utc>> {
    claim
        .stay_range()
        .map(|range| range.from().and_time(NaiveTime::MIN).and_utc())
}

impl CapacityRecord {
    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_owner(&self, initiator: Initiator) -> DomainResult<()> {
        match initiator {
            Initiator::System => Ok(()),
            Initiator::User(user) if Some(user) == self.owner_id => Ok(()),
            Initiator::User(_) => Err(DomainError::Unauthorized),
        }
    }

    fn entry_or_not_found(&self, entry_id: EntryId) -> DomainResult<&ReservationEntry> {
        self.entry(entry_id).ok_or(DomainError::NotFound)
    }

    /// `locked → open` when a trip gets seats back.
    fn reopen_if_freed(&self, freed: u32, at: DateTime<Utc>) -> Option<ReservationEvent> {
        if self.status == RecordStatus::Locked && self.is_trip() && freed > 0 {
            Some(self.status_changed(RecordStatus::Open, at))
        } else {
            None
        }
    }

    fn status_changed(&self, to: RecordStatus, at: DateTime<Utc>) -> ReservationEvent {
        ReservationEvent::RecordStatusChanged(RecordStatusChanged {
            record_id: self.id,
            from: self.status,
            to,
            occurred_at: at,
        })
    }

    fn cancelled(
        &self,
        entry: &ReservationEntry,
        origin: CancelOrigin,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> ReservationEvent {
        ReservationEvent::EntryCancelled(EntryCancelled {
            record_id: self.id,
            entry_id: entry.id,
            holder_id: entry.holder_id,
            reason: CancelReason::new(origin, note),
            occurred_at: at,
        })
    }

    fn handle_create(&self, cmd: &CreateRecord) -> DomainResult<Vec<ReservationEvent>> {
        if self.created {
            return Err(DomainError::conflict("record already exists"));
        }
        if cmd.record_id != self.id {
            return Err(DomainError::validation("record_id mismatch"));
        }
        if cmd.window_end <= cmd.window_start {
            return Err(DomainError::validation("window_end must be after window_start"));
        }
        match cmd.capacity {
            Capacity::Seats { total: 0 } => {
                return Err(DomainError::validation("a trip needs at least one seat"));
            }
            Capacity::Seats { .. } => {
                if cmd.window_start <= cmd.occurred_at {
                    return Err(DomainError::validation("trip must depart in the future"));
                }
            }
            Capacity::Calendar => {
                if cmd.window_end <= cmd.occurred_at {
                    return Err(DomainError::validation("listing validity has already ended"));
                }
                if cmd.destination.is_some() {
                    return Err(DomainError::validation("listings have no destination"));
                }
            }
        }

        Ok(vec![ReservationEvent::RecordCreated(RecordCreated {
            record_id: cmd.record_id,
            owner_id: cmd.owner_id,
            capacity: cmd.capacity,
            window_start: cmd.window_start,
            window_end: cmd.window_end,
            unit_price: cmd.unit_price,
            location: cmd.location,
            destination: cmd.destination,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateRecord) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        self.ensure_owner(Initiator::User(cmd.caller))?;

        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "cannot edit a {} record",
                self.status.as_str()
            )));
        }
        let changes = &cmd.changes;
        if changes.is_empty() {
            return Err(DomainError::validation("no changes given"));
        }
        if changes.touches_core_fields() && self.has_active_entries() {
            return Err(DomainError::HasActiveReservations);
        }

        let start = changes.window_start.unwrap_or(self.window_start);
        let end = changes.window_end.unwrap_or(self.window_end);
        if end <= start {
            return Err(DomainError::validation("window_end must be after window_start"));
        }
        if changes.window_start.is_some() && self.is_trip() && start <= cmd.occurred_at {
            return Err(DomainError::validation("trip must depart in the future"));
        }

        let mut events = vec![ReservationEvent::RecordUpdated(RecordUpdated {
            record_id: self.id,
            changes: changes.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if let Some(seats) = changes.seats {
            if !self.is_trip() {
                return Err(DomainError::validation("listings have no seat count"));
            }
            if seats == 0 {
                return Err(DomainError::validation("a trip needs at least one seat"));
            }
            let held = held_seats(self);
            if seats < held {
                return Err(DomainError::validation(format!(
                    "cannot drop below {held} held seats"
                )));
            }
            let remaining = seats - held;
            match self.status {
                RecordStatus::Open if remaining == 0 => {
                    events.push(self.status_changed(RecordStatus::Locked, cmd.occurred_at));
                }
                RecordStatus::Locked if remaining > 0 => {
                    events.push(self.status_changed(RecordStatus::Open, cmd.occurred_at));
                }
                _ => {}
            }
        }

        Ok(events)
    }

    fn handle_reserve(&self, cmd: &Reserve) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;

        match (&self.capacity, &cmd.claim) {
            (Capacity::Seats { .. }, Claim::Seats { count: 0 }) => {
                return Err(DomainError::validation("seat count must be positive"));
            }
            (Capacity::Seats { .. }, Claim::Seats { .. }) => {}
            (Capacity::Calendar, Claim::Stay { .. }) => {}
            (capacity, _) => {
                return Err(DomainError::validation(format!(
                    "claim does not match a {}",
                    capacity.kind()
                )));
            }
        }
        if Some(cmd.holder_id) == self.owner_id {
            return Err(DomainError::validation("owners cannot reserve their own record"));
        }
        if self.entry(cmd.entry_id).is_some() {
            return Err(DomainError::conflict("entry id already in use"));
        }

        // `locked` is only a hint; capacity is recomputed below.
        match self.status {
            RecordStatus::Open | RecordStatus::Locked => {}
            status => {
                return Err(DomainError::conflict(format!(
                    "record is {}",
                    status.as_str()
                )));
            }
        }

        let now = cmd.occurred_at;
        match stay_start(&cmd.claim) {
            None => ensure_window_ahead(self.window_start, now)?,
            Some(first_night) => {
                ensure_window_ahead(self.window_end, now)?;
                ensure_window_ahead(first_night, now)?;
                if let Some(range) = cmd.claim.stay_range() {
                    let valid_from = self.window_start.date_naive();
                    let valid_to = self.window_end.date_naive();
                    if range.from() < valid_from || range.to() > valid_to {
                        return Err(DomainError::validation(format!(
                            "stay {range} is outside the listing's availability window"
                        )));
                    }
                }
            }
        }

        if self
            .entries
            .iter()
            .any(|e| e.holder_id == cmd.holder_id && e.holds_capacity())
        {
            return Err(DomainError::DuplicateHolder);
        }

        let mut lock = false;
        match cmd.claim {
            Claim::Seats { count } => {
                let remaining = remaining_seats(self);
                if count > remaining {
                    return Err(DomainError::insufficient(count, remaining));
                }
                lock = count == remaining;
            }
            Claim::Stay { range } => {
                if !is_range_free(self, &range) {
                    return Err(DomainError::insufficient(
                        range.nights(),
                        free_nights(self, &range),
                    ));
                }
            }
        }

        // Pending and reserved land in the same write: capacity was checked
        // against this exact snapshot.
        EntryStatus::Pending.transition(EntryTransition::ProvisionalCommit)?;

        let mut events = vec![
            ReservationEvent::EntryRequested(EntryRequested {
                record_id: self.id,
                entry_id: cmd.entry_id,
                holder_id: cmd.holder_id,
                claim: cmd.claim,
                occurred_at: now,
            }),
            ReservationEvent::EntryReserved(EntryReserved {
                record_id: self.id,
                entry_id: cmd.entry_id,
                holder_id: cmd.holder_id,
                claim: cmd.claim,
                occurred_at: now,
            }),
        ];
        if lock {
            self.status.transition(RecordTransition::Lock)?;
            events.push(self.status_changed(RecordStatus::Locked, now));
        }
        Ok(events)
    }

    fn handle_cancel_entry(&self, cmd: &CancelEntry) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        let entry = self.entry_or_not_found(cmd.entry_id)?;

        match cmd.initiator {
            Initiator::User(user) if user == entry.holder_id => {}
            // Owners withdraw capacity through CancelRecord.
            _ => return Err(DomainError::Unauthorized),
        }
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "record is {}",
                self.status.as_str()
            )));
        }
        entry.status.transition(EntryTransition::HolderCancel)?;

        let now = cmd.occurred_at;
        match stay_start(&entry.claim) {
            None => {
                if entry.status == EntryStatus::Confirmed && self.window_start <= now {
                    return Err(DomainError::conflict(
                        "confirmed entry is immutable once the trip has departed",
                    ));
                }
                cmd.policy.ensure_before_cutoff(self.window_start, now)?;
            }
            Some(first_night) => {
                if first_night <= now {
                    return Err(DomainError::CutoffPassed {
                        minutes_left: (first_night - now).num_minutes(),
                    });
                }
            }
        }

        let mut events = vec![self.cancelled(entry, CancelOrigin::Holder, cmd.note.clone(), now)];
        if let Some(reopen) = self.reopen_if_freed(entry.claim.seat_count().unwrap_or(0), now) {
            events.push(reopen);
        }
        Ok(events)
    }

    fn handle_attach_payment(&self, cmd: &AttachPayment) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        let entry = self.entry_or_not_found(cmd.entry_id)?;

        if entry.holder_id != cmd.caller {
            return Err(DomainError::Unauthorized);
        }
        if entry.status != EntryStatus::Reserved {
            return Err(DomainError::conflict(format!(
                "cannot pay for a {} entry",
                entry.status.as_str()
            )));
        }
        if cmd.payment_ref.trim().is_empty() {
            return Err(DomainError::validation("payment_ref must not be empty"));
        }
        // The first checkout's reference stays authoritative: its callback
        // must still confirm the entry.
        match entry.payment_ref.as_deref() {
            Some(attached) if attached == cmd.payment_ref => return Ok(Vec::new()),
            Some(_) => {
                return Err(DomainError::conflict("checkout already started for this entry"));
            }
            None => {}
        }

        Ok(vec![ReservationEvent::PaymentAttached(PaymentAttached {
            record_id: self.id,
            entry_id: entry.id,
            payment_ref: cmd.payment_ref.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_payment(&self, cmd: &ConfirmPayment) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        let entry = self.entry_or_not_found(cmd.entry_id)?;

        match entry.status {
            EntryStatus::Confirmed => {
                return if entry.payment_ref.as_deref() == Some(cmd.payment_ref.as_str()) {
                    Ok(Vec::new())
                } else {
                    Err(DomainError::AlreadyConfirmed)
                };
            }
            EntryStatus::Reserved => {
                if let Some(attached) = entry.payment_ref.as_deref() {
                    if attached != cmd.payment_ref {
                        return Err(DomainError::conflict(
                            "payment reference does not match the checkout",
                        ));
                    }
                }
            }
            EntryStatus::Pending | EntryStatus::Cancelled => {}
        }
        entry.status.transition(EntryTransition::PaymentSuccess)?;

        Ok(vec![ReservationEvent::EntryConfirmed(EntryConfirmed {
            record_id: self.id,
            entry_id: entry.id,
            holder_id: entry.holder_id,
            payment_ref: cmd.payment_ref.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire_stale(&self, cmd: &ExpireStale) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        let now = cmd.occurred_at;

        let mut events = Vec::new();
        let mut freed = 0u32;
        for entry in self
            .entries
            .iter()
            .filter(|e| cmd.policy.is_payment_overdue(e, now))
        {
            entry.status.transition(EntryTransition::PaymentTimeout)?;
            freed = freed.saturating_add(entry.claim.seat_count().unwrap_or(0));
            events.push(self.cancelled(entry, CancelOrigin::PaymentTimeout, None, now));
        }
        if let Some(reopen) = self.reopen_if_freed(freed, now) {
            events.push(reopen);
        }
        Ok(events)
    }

    fn handle_cancel_record(&self, cmd: &CancelRecord) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        self.ensure_owner(cmd.initiator)?;
        self.status.transition(RecordTransition::Cancel)?;

        let now = cmd.occurred_at;
        if self.is_trip() {
            ensure_window_ahead(self.window_start, now)?;
        } else {
            ensure_window_ahead(self.window_end, now)?;
        }

        let mut events = Vec::new();
        for entry in self.entries.iter().filter(|e| e.holds_capacity()) {
            entry.status.transition(EntryTransition::OwnerCancel)?;
            events.push(self.cancelled(entry, CancelOrigin::Owner, cmd.note.clone(), now));
        }
        events.push(ReservationEvent::RecordCancelled(RecordCancelled {
            record_id: self.id,
            note: cmd.note.clone(),
            occurred_at: now,
        }));
        Ok(events)
    }

    fn handle_complete_record(&self, cmd: &CompleteRecord) -> DomainResult<Vec<ReservationEvent>> {
        self.ensure_created()?;
        self.ensure_owner(cmd.initiator)?;
        self.status.transition(RecordTransition::Complete)?;

        let now = cmd.occurred_at;
        if now < self.window_end {
            return Err(DomainError::conflict("record window has not ended yet"));
        }

        let mut events = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Pending | EntryStatus::Reserved))
        {
            entry.status.transition(EntryTransition::RecordCompleted)?;
            events.push(self.cancelled(entry, CancelOrigin::RecordCompleted, None, now));
        }
        events.push(ReservationEvent::RecordCompleted(RecordCompleted {
            record_id: self.id,
            occurred_at: now,
        }));
        Ok(events)
    }
}
