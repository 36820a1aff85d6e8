//! FIFO queue of commands waiting for locks.

use crate::PendingCommand;
use repldb_types::TxnId;
use std::collections::VecDeque;

/// A queued command and its arrival number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedCommand {
    /// Unique, increasing with arrival order.
    pub seq: u64,
    pub command: PendingCommand,
}

/// Commands that could not proceed, in arrival order.
///
/// Replay works on a [`snapshot`](Self::snapshot) and removes entries by
/// sequence number, so entries purged mid-replay are simply not found.
#[derive(Debug, Clone, Default)]
pub struct WaitQueue {
    entries: VecDeque<QueuedCommand>,
    next_seq: u64,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `command`. Returns its sequence number.
    pub fn push(&mut self, command: PendingCommand) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(QueuedCommand { seq, command });
        seq
    }

    /// Remove the entry with `seq`, if it is still queued.
    pub fn remove(&mut self, seq: u64) -> Option<PendingCommand> {
        let pos = self.entries.iter().position(|e| e.seq == seq)?;
        self.entries.remove(pos).map(|e| e.command)
    }

    /// Copy of the queue in arrival order.
    pub fn snapshot(&self) -> Vec<QueuedCommand> {
        self.entries.iter().copied().collect()
    }

    /// Whether `txn` has anything queued.
    pub fn has_pending(&self, txn: TxnId) -> bool {
        self.entries.iter().any(|e| e.command.txn() == txn)
    }

    /// Drop every entry of `txn`. Returns how many went.
    pub fn purge(&mut self, txn: TxnId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.command.txn() != txn);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedCommand> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
