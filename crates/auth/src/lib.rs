//! `tripstay-auth`: role check performed once before any allocation call.
//!
//! This crate is decoupled from HTTP and storage. Identity is established
//! upstream; here a verified `Caller` is checked against a permission table.
//! Record ownership is a domain rule and is enforced by the record itself.

pub mod authorize;
pub mod caller;
pub mod permissions;
pub mod roles;

pub use authorize::{AuthzError, authorize, explain};
pub use caller::Caller;
pub use permissions::Permission;
pub use roles::{ParseRoleError, Role};
