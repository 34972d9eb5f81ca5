use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "reservation.create"). The wildcard
/// `"*"` grants everything and is only handed to the admin role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const RECORD_READ: Permission = Permission::from_static("record.read");
    pub const RECORD_CREATE: Permission = Permission::from_static("record.create");
    pub const RECORD_UPDATE: Permission = Permission::from_static("record.update");
    pub const RECORD_CANCEL: Permission = Permission::from_static("record.cancel");
    pub const RECORD_COMPLETE: Permission = Permission::from_static("record.complete");

    pub const RESERVATION_CREATE: Permission = Permission::from_static("reservation.create");
    pub const RESERVATION_CANCEL: Permission = Permission::from_static("reservation.cancel");
    pub const RESERVATION_READ: Permission = Permission::from_static("reservation.read");

    pub const PAYMENT_CHECKOUT: Permission = Permission::from_static("payment.checkout");
    pub const PAYMENT_CONFIRM: Permission = Permission::from_static("payment.confirm");

    pub const SEARCH: Permission = Permission::from_static("search.trips");
    pub const BOOKING_BUNDLE: Permission = Permission::from_static("booking.stay_and_ride");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
