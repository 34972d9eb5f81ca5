use std::io;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use tripstay_core::UserId;

/// Delivery failures are non-fatal: they are logged and never roll back a
/// committed transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("recipient unreachable: {0}")]
    Unreachable(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

pub trait NotificationSender: Send + Sync {
    fn send(&self, recipient: UserId, template: &str, data: &JsonValue) -> Result<(), DeliveryError>;
}

impl<N> NotificationSender for std::sync::Arc<N>
where
    N: NotificationSender + ?Sized,
{
    fn send(&self, recipient: UserId, template: &str, data: &JsonValue) -> Result<(), DeliveryError> {
        (**self).send(recipient, template, data)
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationSender;

impl NotificationSender for LoggingNotificationSender {
    fn send(&self, recipient: UserId, template: &str, data: &JsonValue) -> Result<(), DeliveryError> {
        tracing::info!(recipient = %recipient, template, data = %data, "notification");
        Ok(())
    }
}

/// Hands notifications to a background worker so a slow channel never holds
/// up the request that committed the transition.
///
/// `send` only enqueues; delivery failures are logged by the worker. The
/// worker exits once the queue is dropped.
#[derive(Debug)]
pub struct QueuedNotificationSender {
    queue: Sender<Notification>,
}

impl QueuedNotificationSender {
    pub fn spawn(name: &str, inner: Arc<dyn NotificationSender>) -> io::Result<Self> {
        let (queue, rx) = mpsc::channel::<Notification>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            for n in rx {
                if let Err(e) = inner.send(n.recipient, &n.template, &n.data) {
                    tracing::warn!(
                        recipient = %n.recipient,
                        template = %n.template,
                        error = %e,
                        "notification delivery failed"
                    );
                }
            }
            tracing::debug!("notification worker stopped");
        })?;
        Ok(Self { queue })
    }
}

impl NotificationSender for QueuedNotificationSender {
    fn send(&self, recipient: UserId, template: &str, data: &JsonValue) -> Result<(), DeliveryError> {
        self.queue
            .send(Notification {
                recipient,
                template: template.to_string(),
                data: data.clone(),
            })
            .map_err(|_| DeliveryError::Unreachable("notification worker stopped".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: UserId,
    pub template: String,
    pub data: JsonValue,
}

/// Records notifications for tests; can be switched to failing mode.
#[derive(Debug, Default)]
pub struct InMemoryNotificationSender {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl InMemoryNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent `send` fails with `Unreachable`.
    pub fn fail_deliveries(&self, failing: bool) {
        if let Ok(mut f) = self.failing.lock() {
            *f = failing;
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, recipient: UserId) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }
}

impl NotificationSender for InMemoryNotificationSender {
    fn send(&self, recipient: UserId, template: &str, data: &JsonValue) -> Result<(), DeliveryError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(DeliveryError::Unreachable(recipient.to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| DeliveryError::Rejected("sender lock poisoned".to_string()))?;
        sent.push(Notification {
            recipient,
            template: template.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Blocks every delivery until released.
    struct GatedSender {
        release: Mutex<mpsc::Receiver<()>>,
        delivered: InMemoryNotificationSender,
    }

    impl NotificationSender for GatedSender {
        fn send(&self, recipient: UserId, template: &str, data: &JsonValue) -> Result<(), DeliveryError> {
            let release = self.release.lock().unwrap();
            release.recv_timeout(Duration::from_secs(5)).unwrap();
            self.delivered.send(recipient, template, data)
        }
    }

    #[test]
    fn queued_sender_returns_before_a_slow_delivery_finishes() {
        let (release_tx, release_rx) = mpsc::channel();
        let gated = Arc::new(GatedSender {
            release: Mutex::new(release_rx),
            delivered: InMemoryNotificationSender::new(),
        });
        let queued = QueuedNotificationSender::spawn("notify-test", gated.clone()).unwrap();
        let user = UserId::new();

        queued.send(user, "reservation_reserved", &JsonValue::Null).unwrap();
        assert!(gated.delivered.sent().is_empty());

        release_tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while gated.delivered.sent().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(gated.delivered.sent_to(user).len(), 1);
    }

    #[test]
    fn in_memory_sender_records_and_fails_on_demand() {
        let sender = InMemoryNotificationSender::new();
        let user = UserId::new();
        sender
            .send(user, "entry_confirmed", &serde_json::json!({ "seats": 2 }))
            .unwrap();
        assert_eq!(sender.sent_to(user).len(), 1);

        sender.fail_deliveries(true);
        assert!(sender.send(user, "entry_cancelled", &JsonValue::Null).is_err());
        assert_eq!(sender.sent().len(), 1);
    }
}
