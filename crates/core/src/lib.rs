//! `tripstay-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::{Entity, position_of};
pub use error::{DomainError, DomainResult};
pub use id::{EntryId, RecordId, UserId};
pub use value_object::{DateRange, GeoPoint, ValueObject};
