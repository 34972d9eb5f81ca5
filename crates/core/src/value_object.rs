//! Value objects: equality by value, not identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two date ranges
/// with the same bounds are the same range, regardless of where they came from.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Half-open calendar range `[from, to)`.
///
/// `to` is the checkout day: a stay `[06-01, 06-05)` occupies the nights of
/// June 1st through June 4th and leaves June 5th free for the next guest.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange", into = "RawDateRange")]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct RawDateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = DomainError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.from, raw.to)
    }
}

impl From<DateRange> for RawDateRange {
    fn from(range: DateRange) -> Self {
        Self {
            from: range.from,
            to: range.to,
        }
    }
}

impl core::fmt::Display for DateRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

impl ValueObject for DateRange {}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> DomainResult<Self> {
        if from >= to {
            return Err(DomainError::validation(format!(
                "date range must end after it starts ({from} >= {to})"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Number of nights covered by the range.
    pub fn nights(&self) -> u32 {
        u32::try_from((self.to - self.from).num_days()).unwrap_or(u32::MAX)
    }

    /// Half-open intersection test.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.from < other.to && other.from < self.to
    }

    /// Nights shared by both ranges (0 when disjoint).
    pub fn overlap_nights(&self, other: &DateRange) -> u32 {
        if !self.overlaps(other) {
            return 0;
        }
        let start = self.from.max(other.from);
        let end = self.to.min(other.to);
        u32::try_from((end - start).num_days()).unwrap_or(0)
    }
}

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl ValueObject for GeoPoint {}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> DomainResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DomainError::validation(format!("latitude out of range: {lat}")));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(DomainError::validation(format!("longitude out of range: {lon}")));
        }
        Ok(Self { lat, lon })
    }
}
