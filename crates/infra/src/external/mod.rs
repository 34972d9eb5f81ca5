//! External collaborators consumed by the engine.
//!
//! Each sits behind a narrow synchronous trait so the allocation service
//! stays storage- and transport-agnostic. The implementations here are the
//! defaults for single-node runs and tests.

pub mod geo;
pub mod notification;
pub mod payment;

pub use geo::{GeoLookup, HaversineGeoLookup};
pub use notification::{
    DeliveryError, InMemoryNotificationSender, LoggingNotificationSender, Notification,
    NotificationSender, QueuedNotificationSender,
};
pub use payment::{
    GatewayError, PaymentGateway, PaymentRedirect, PaymentRequest, SandboxPaymentGateway,
    initiate_with_timeout,
};
