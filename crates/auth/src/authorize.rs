use serde::Serialize;
use thiserror::Error;

use crate::{Caller, Permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: String, permission: String },
}

/// Check a caller's role against a required permission.
///
/// - No IO
/// - No panics
/// - No business logic (ownership is checked by the record)
pub fn authorize(caller: &Caller, required: &Permission) -> Result<(), AuthzError> {
    let granted = caller
        .role
        .permissions()
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        tracing::debug!(
            caller_id = %caller.caller_id,
            role = %caller.role,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden {
            role: caller.role.as_str().to_string(),
            permission: required.as_str().to_string(),
        })
    }
}

/// Audit view of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub required_permission: String,
    pub granted: bool,
    pub role: String,
    pub effective_permissions: Vec<String>,
}

/// Explain why `authorize` would allow or deny a request.
pub fn explain(caller: &Caller, required: &Permission) -> Explanation {
    let mut effective_permissions: Vec<String> = caller
        .role
        .permissions()
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    effective_permissions.sort();

    Explanation {
        required_permission: required.as_str().to_string(),
        granted: authorize(caller, required).is_ok(),
        role: caller.role.as_str().to_string(),
        effective_permissions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use tripstay_core::UserId;

    fn caller(role: Role) -> Caller {
        Caller::new(UserId::new(), role)
    }

    #[test]
    fn holder_can_reserve_but_not_publish() {
        let holder = caller(Role::Holder);
        assert!(authorize(&holder, &Permission::RESERVATION_CREATE).is_ok());
        assert!(matches!(
            authorize(&holder, &Permission::RECORD_CREATE),
            Err(AuthzError::Forbidden { .. })
        ));
    }

    #[test]
    fn only_system_confirms_payments() {
        assert!(authorize(&caller(Role::System), &Permission::PAYMENT_CONFIRM).is_ok());
        assert!(authorize(&caller(Role::Holder), &Permission::PAYMENT_CONFIRM).is_err());
        assert!(authorize(&caller(Role::Owner), &Permission::PAYMENT_CONFIRM).is_err());
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let admin = caller(Role::Admin);
        for p in [
            Permission::RECORD_CANCEL,
            Permission::PAYMENT_CONFIRM,
            Permission::new("anything.else"),
        ] {
            assert!(authorize(&admin, &p).is_ok(), "{p}");
        }
    }

    #[test]
    fn explanation_lists_effective_permissions() {
        let e = explain(&caller(Role::System), &Permission::RECORD_CREATE);
        assert!(!e.granted);
        assert!(e.effective_permissions.contains(&"payment.confirm".to_string()));
        assert!(e.effective_permissions.windows(2).all(|w| w[0] <= w[1]));
    }
}
