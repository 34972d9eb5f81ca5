//! Price quotes for checkout.

use serde::{Deserialize, Serialize};

use tripstay_core::{DomainError, DomainResult};

use crate::entry::Claim;
use crate::record::CapacityRecord;

/// Tax configuration applied to every quote.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Basis points (1/100 of a percent).
    pub rate_bps: u32,
    /// When set, tax is reported but not added to what the holder pays.
    pub absorbed_by_platform: bool,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            rate_bps: 500,
            absorbed_by_platform: true,
        }
    }
}

/// All amounts in minor currency units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base: u64,
    pub tax: u64,
    pub charged_total: u64,
}

/// Quote a claim against a record's unit price.
///
/// Tax rounds half up to the nearest minor unit.
pub fn quote(record: &CapacityRecord, claim: &Claim, tax: TaxPolicy) -> DomainResult<PriceQuote> {
    let overflow = || DomainError::validation("price overflow");

    let base = record
        .unit_price()
        .checked_mul(u64::from(claim.units()))
        .ok_or_else(overflow)?;
    let tax_amount = base
        .checked_mul(u64::from(tax.rate_bps))
        .and_then(|v| v.checked_add(5_000))
        .map(|v| v / 10_000)
        .ok_or_else(overflow)?;
    let charged_total = if tax.absorbed_by_platform {
        base
    } else {
        base.checked_add(tax_amount).ok_or_else(overflow)?
    };

    Ok(PriceQuote {
        base,
        tax: tax_amount,
        charged_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Capacity, CreateRecord, ReservationCommand};
    use chrono::{Duration, TimeZone, Utc};
    use tripstay_core::{RecordId, UserId};

    fn trip(unit_price: u64) -> CapacityRecord {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let id = RecordId::new();
        let (record, _) = CapacityRecord::empty(id)
            .decide(&ReservationCommand::CreateRecord(CreateRecord {
                record_id: id,
                owner_id: UserId::new(),
                capacity: Capacity::Seats { total: 4 },
                window_start: now + Duration::days(2),
                window_end: now + Duration::days(2) + Duration::hours(3),
                unit_price,
                location: None,
                destination: None,
                occurred_at: now,
            }))
            .unwrap();
        record
    }

    #[test]
    fn absorbed_tax_is_reported_but_not_charged() {
        let q = quote(&trip(2000), &Claim::seats(3), TaxPolicy::default()).unwrap();
        assert_eq!(q.base, 6000);
        assert_eq!(q.tax, 300);
        assert_eq!(q.charged_total, 6000);
    }

    #[test]
    fn passed_through_tax_is_added() {
        let policy = TaxPolicy {
            rate_bps: 750,
            absorbed_by_platform: false,
        };
        let q = quote(&trip(999), &Claim::seats(1), policy).unwrap();
        // 999 * 7.5% = 74.925 -> 75
        assert_eq!(q.tax, 75);
        assert_eq!(q.charged_total, 1074);
    }

    #[test]
    fn overflow_is_a_validation_error() {
        let err = quote(&trip(u64::MAX), &Claim::seats(2), TaxPolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
