//! Capacity record store boundary.
//!
//! Storage-agnostic: the allocation service only relies on atomic
//! compare-and-swap per record. An in-memory store backs tests and
//! single-node runs; the Postgres store sits behind the `postgres` feature.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCapacityStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresCapacityStore;
pub use r#trait::{CapacityStore, StoreError};
