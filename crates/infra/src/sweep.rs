//! Background expiry of unpaid entries.

use std::io;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use tripstay_events::{EventBus, EventEnvelope};
use tripstay_reservations::ReservationEvent;

use crate::allocation::AllocationService;
use crate::store::CapacityStore;

/// Periodic sweeper configuration.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    pub interval: Duration,
}

impl Default for ExpirySweeper {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Handle for a running sweeper thread.
#[derive(Debug)]
pub struct ExpirySweeperHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ExpirySweeperHandle {
    /// Ask for a pass before the next tick. Triggers coalesce.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the thread and wait for the current pass to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl ExpirySweeper {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the sweeper on its own thread.
    ///
    /// Each pass runs `sweep_once`; failures are logged there and the
    /// affected records are picked up again on the next tick.
    pub fn spawn<S, B>(
        &self,
        name: &str,
        service: Arc<AllocationService<S, B>>,
    ) -> io::Result<ExpirySweeperHandle>
    where
        S: CapacityStore + 'static,
        B: EventBus<EventEnvelope<ReservationEvent>> + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let interval = self.interval;
        let thread_name = name.to_string();
        let join = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || sweep_loop(&thread_name, interval, shutdown_rx, trigger_rx, service))?;

        Ok(ExpirySweeperHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn sweep_loop<S, B>(
    name: &str,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    service: Arc<AllocationService<S, B>>,
) where
    S: CapacityStore,
    B: EventBus<EventEnvelope<ReservationEvent>>,
{
    info!(sweeper = name, interval_ms = interval.as_millis() as u64, "expiry sweeper started");

    let mut next_tick = Instant::now() + interval;
    let mut pending = false;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            while next_tick <= now {
                next_tick += interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;
        let report = service.sweep_once();
        debug!(
            sweeper = name,
            scanned = report.scanned,
            expired = report.expired,
            failed = report.failed,
            "sweep pass"
        );
    }

    info!(sweeper = name, "expiry sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use tripstay_core::{ManualClock, UserId};
    use tripstay_events::InMemoryEventBus;
    use tripstay_reservations::{Capacity, Claim, EntryStatus};

    use crate::allocation::RecordDraft;
    use crate::store::InMemoryCapacityStore;

    #[test]
    fn triggered_pass_expires_overdue_entries() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let service = Arc::new(
            AllocationService::new(
                InMemoryCapacityStore::new(),
                InMemoryEventBus::<EventEnvelope<ReservationEvent>>::new(),
            )
            .with_clock(clock.clone()),
        );

        let trip = service
            .create_record(
                UserId::new(),
                RecordDraft {
                    capacity: Capacity::Seats { total: 3 },
                    window_start: start + ChronoDuration::days(2),
                    window_end: start + ChronoDuration::days(2) + ChronoDuration::hours(1),
                    unit_price: 500,
                    location: None,
                    destination: None,
                },
            )
            .unwrap();
        let snap = service
            .reserve(trip.record_id(), UserId::new(), Claim::seats(1))
            .unwrap();
        clock.advance(ChronoDuration::minutes(20));

        let handle = ExpirySweeper::new(Duration::from_secs(3600))
            .spawn("sweeper-test", Arc::clone(&service))
            .unwrap();
        handle.trigger();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut status = EntryStatus::Reserved;
        while Instant::now() < deadline {
            status = service.get_entry(snap.entry.id).unwrap().entry.status;
            if status == EntryStatus::Cancelled {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        handle.shutdown();

        assert_eq!(status, EntryStatus::Cancelled);
    }
}
