//! Counters kept by the transaction manager.

use repldb_types::AbortReason;
use std::collections::BTreeMap;

/// Running totals since the manager was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Regular transactions started.
    pub begun: u64,
    /// Read-only transactions started.
    pub read_only_begun: u64,
    /// Regular transactions committed.
    pub committed: u64,
    /// Read-only transactions ended.
    pub read_only_ended: u64,
    /// Aborts keyed by [`AbortReason::label`].
    pub aborts: BTreeMap<&'static str, u64>,
    /// Wait-for cycles broken.
    pub deadlocks: u64,
    /// Commands that joined the wait queue, retries included.
    pub queued: u64,
    /// Full queue replays started.
    pub replays: u64,
    pub site_failures: u64,
    pub site_recoveries: u64,
}

impl ManagerStats {
    pub fn record_abort(&mut self, reason: AbortReason) {
        *self.aborts.entry(reason.label()).or_default() += 1;
    }

    pub fn total_aborts(&self) -> u64 {
        self.aborts.values().sum()
    }

    pub fn aborts_for(&self, reason: AbortReason) -> u64 {
        self.aborts.get(reason.label()).copied().unwrap_or(0)
    }

    /// Transactions that reached commit or read-only end.
    pub fn finished(&self) -> u64 {
        self.committed + self.read_only_ended
    }
}
