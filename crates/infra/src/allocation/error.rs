use thiserror::Error;

use tripstay_core::{DomainError, RecordId};

use crate::external::GatewayError;
use crate::store::StoreError;

/// Error surfaced by the allocation service.
///
/// Store `Concurrency` never reaches callers: the write loop retries it and
/// turns exhaustion into `Contended`, which callers see as a conflict.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Every write attempt lost the version race.
    #[error("record {record_id} kept changing; gave up after {attempts} attempts")]
    Contended { record_id: RecordId, attempts: u32 },
}

impl AllocationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::Domain(e) => e.code(),
            AllocationError::Store(_) => "store_error",
            AllocationError::Gateway(_) => "gateway_error",
            AllocationError::Contended { .. } => "conflict",
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            AllocationError::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Worth repeating as-is: nothing about the request itself was wrong.
    pub fn is_transient(&self) -> bool {
        matches!(self, AllocationError::Store(_) | AllocationError::Contended { .. })
    }
}

impl From<StoreError> for AllocationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => AllocationError::Domain(DomainError::NotFound),
            StoreError::Concurrency { expected, actual } => AllocationError::Domain(
                DomainError::conflict(format!(
                    "record changed concurrently (expected {expected:?}, found {actual})"
                )),
            ),
            StoreError::Duplicate(record_id) => AllocationError::Domain(DomainError::conflict(
                format!("record {record_id} already exists"),
            )),
            other => AllocationError::Store(other),
        }
    }
}
