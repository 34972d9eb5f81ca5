use serde::{Deserialize, Serialize};

use tripstay_core::UserId;

use crate::Role;

/// A verified caller, resolved by the trusted gateway before any call into
/// the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub caller_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(caller_id: UserId, role: Role) -> Self {
        Self { caller_id, role }
    }
}
