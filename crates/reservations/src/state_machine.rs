//! Legal status transitions for entries and records.
//!
//! Guards that need record context (capacity, windows, ownership) are checked
//! by the record's command handlers; this module only knows which
//! `(state, transition)` pairs exist. Anything else is a conflict.

use tripstay_core::{DomainError, DomainResult};

use crate::entry::EntryStatus;
use crate::record::RecordStatus;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryTransition {
    /// Capacity committed in the same write that created the entry.
    ProvisionalCommit,
    PaymentSuccess,
    PaymentTimeout,
    HolderCancel,
    /// Cascade from the owner cancelling the whole record.
    OwnerCancel,
    /// Unpaid entries left behind when a record completes.
    RecordCompleted,
}

impl EntryStatus {
    pub fn transition(self, transition: EntryTransition) -> DomainResult<EntryStatus> {
        use EntryStatus::*;
        use EntryTransition::*;

        match (self, transition) {
            (Pending, ProvisionalCommit) => Ok(Reserved),
            (Reserved, PaymentSuccess) => Ok(Confirmed),
            (Pending | Reserved, PaymentTimeout) => Ok(Cancelled),
            // Confirmed entries are only cancellable while the window is ahead;
            // the record handler enforces that before asking.
            (Pending | Reserved | Confirmed, HolderCancel) => Ok(Cancelled),
            (Pending | Reserved | Confirmed, OwnerCancel) => Ok(Cancelled),
            (Pending | Reserved, RecordCompleted) => Ok(Cancelled),
            (from, transition) => Err(DomainError::conflict(format!(
                "illegal entry transition {transition:?} from {}",
                from.as_str()
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordTransition {
    /// No seats left; search hint only.
    Lock,
    /// Capacity freed on a locked record.
    Reopen,
    Cancel,
    Complete,
}

impl RecordStatus {
    /// Status moves forward only, except `locked → open`.
    pub fn transition(self, transition: RecordTransition) -> DomainResult<RecordStatus> {
        use RecordStatus::*;
        use RecordTransition::*;

        match (self, transition) {
            (Open, Lock) => Ok(Locked),
            (Locked, Reopen) => Ok(Open),
            (Open | Locked, Cancel) => Ok(Cancelled),
            (Open | Locked, Complete) => Ok(Completed),
            (from, transition) => Err(DomainError::conflict(format!(
                "illegal record transition {transition:?} from {}",
                from.as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_pending_reserved_confirmed() {
        let s = EntryStatus::Pending
            .transition(EntryTransition::ProvisionalCommit)
            .unwrap();
        assert_eq!(s, EntryStatus::Reserved);
        let s = s.transition(EntryTransition::PaymentSuccess).unwrap();
        assert_eq!(s, EntryStatus::Confirmed);
    }

    #[test]
    fn confirmed_entries_do_not_time_out() {
        let err = EntryStatus::Confirmed
            .transition(EntryTransition::PaymentTimeout)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn cancelled_is_terminal() {
        for t in [
            EntryTransition::ProvisionalCommit,
            EntryTransition::PaymentSuccess,
            EntryTransition::PaymentTimeout,
            EntryTransition::HolderCancel,
            EntryTransition::OwnerCancel,
            EntryTransition::RecordCompleted,
        ] {
            assert!(EntryStatus::Cancelled.transition(t).is_err(), "{t:?}");
        }
    }

    #[test]
    fn pending_cannot_skip_to_confirmed() {
        assert!(
            EntryStatus::Pending
                .transition(EntryTransition::PaymentSuccess)
                .is_err()
        );
    }

    #[test]
    fn record_only_reopens_from_locked() {
        assert_eq!(
            RecordStatus::Locked.transition(RecordTransition::Reopen),
            Ok(RecordStatus::Open)
        );
        assert!(RecordStatus::Open.transition(RecordTransition::Reopen).is_err());
        assert!(
            RecordStatus::Cancelled
                .transition(RecordTransition::Reopen)
                .is_err()
        );
        assert!(
            RecordStatus::Completed
                .transition(RecordTransition::Cancel)
                .is_err()
        );
    }
}
