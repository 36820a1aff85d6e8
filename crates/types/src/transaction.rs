//! Transaction vocabulary shared by the manager and its callers.

use crate::SiteId;
use std::fmt;

/// Kind of transaction, fixed at `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Takes locks under strict two-phase locking and may write.
    Regular,
    /// Reads from a snapshot captured at `beginRO`; never locks, never writes.
    ReadOnly,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Regular => write!(f, "regular"),
            TransactionKind::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Status of a live transaction.
///
/// Committed and aborted transactions leave the active set, so they have no
/// status of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionStatus {
    /// No command of this transaction is queued.
    #[default]
    Running,
    /// At least one command of this transaction sits in the wait queue.
    Waiting,
}

/// Why a transaction was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// Chosen as the victim of a wait-for cycle.
    Deadlock,

    /// A read found no running site hosting the item.
    AllCopiesDown,

    /// A write found no running site hosting the item.
    NoWriteTarget,

    /// The transaction read from or wrote to a site that later failed.
    SiteFailure {
        /// The site whose failure triggered the abort.
        site: SiteId,
    },
}

impl AbortReason {
    /// Short stable label, used for statistics keys.
    pub fn label(&self) -> &'static str {
        match self {
            AbortReason::Deadlock => "deadlock",
            AbortReason::AllCopiesDown => "all_copies_down",
            AbortReason::NoWriteTarget => "no_write_target",
            AbortReason::SiteFailure { .. } => "site_failure",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadlock => write!(f, "deadlock"),
            AbortReason::AllCopiesDown => write!(f, "all sites holding the item are down"),
            AbortReason::NoWriteTarget => write!(f, "no running site to write to"),
            AbortReason::SiteFailure { site } => write!(f, "failure of site {}", site),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_reason_display() {
        assert_eq!(
            AbortReason::SiteFailure { site: SiteId(3) }.to_string(),
            "failure of site 3"
        );
        assert_eq!(AbortReason::Deadlock.label(), "deadlock");
    }

    #[test]
    fn test_default_status_is_running() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Running);
    }
}
