use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Permission;

/// Role a caller acts in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books seats or stays.
    Holder,
    /// Publishes trips (driver) or listings (host).
    Owner,
    /// Trusted services: payment callbacks, schedulers.
    System,
    Admin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Holder => "holder",
            Role::Owner => "owner",
            Role::System => "system",
            Role::Admin => "admin",
        }
    }

    /// Permissions granted to the role.
    pub fn permissions(self) -> &'static [Permission] {
        const HOLDER: &[Permission] = &[
            Permission::RECORD_READ,
            Permission::RESERVATION_CREATE,
            Permission::RESERVATION_CANCEL,
            Permission::RESERVATION_READ,
            Permission::PAYMENT_CHECKOUT,
            Permission::SEARCH,
            Permission::BOOKING_BUNDLE,
        ];
        const OWNER: &[Permission] = &[
            Permission::RECORD_READ,
            Permission::RECORD_CREATE,
            Permission::RECORD_UPDATE,
            Permission::RECORD_CANCEL,
            Permission::RECORD_COMPLETE,
            Permission::RESERVATION_READ,
            Permission::SEARCH,
        ];
        const SYSTEM: &[Permission] = &[
            Permission::RECORD_READ,
            Permission::RECORD_COMPLETE,
            Permission::RESERVATION_READ,
            Permission::PAYMENT_CONFIRM,
        ];
        const ADMIN: &[Permission] = &[Permission::WILDCARD];

        match self {
            Role::Holder => HOLDER,
            Role::Owner => OWNER,
            Role::System => SYSTEM,
            Role::Admin => ADMIN,
        }
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "holder" => Ok(Role::Holder),
            "owner" => Ok(Role::Owner),
            "system" => Ok(Role::System),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!(" holder ".parse::<Role>(), Ok(Role::Holder));
        assert!("driver".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }
}
