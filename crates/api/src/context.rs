use tripstay_auth::{Caller, Role};
use tripstay_core::UserId;
use tripstay_reservations::Initiator;

/// Verified caller for a request, inserted by the caller middleware.
///
/// Immutable; present on every route except `/health`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller: Caller,
}

impl CallerContext {
    pub fn new(caller: Caller) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn caller_id(&self) -> UserId {
        self.caller.caller_id
    }

    pub fn role(&self) -> Role {
        self.caller.role
    }

    /// Owners act as themselves; platform roles act as the system.
    pub fn initiator(&self) -> Initiator {
        match self.caller.role {
            Role::System | Role::Admin => Initiator::System,
            Role::Holder | Role::Owner => Initiator::User(self.caller.caller_id),
        }
    }
}
