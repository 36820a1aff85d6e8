//! Record of the reads and writes issued by live transactions.

use crate::PendingCommand;
use repldb_types::{ItemId, TxnId};

/// Every read and write submitted by a still-active transaction, in
/// submission order, whether it was granted or queued.
///
/// Conflict scanning runs against this record rather than the lock tables,
/// so a queued write already blocks later readers of the same item.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    commands: Vec<PendingCommand>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `command`. An identical command is only kept once.
    pub fn record(&mut self, command: PendingCommand) -> bool {
        if matches!(command, PendingCommand::End { .. }) || self.contains(&command) {
            return false;
        }
        self.commands.push(command);
        true
    }

    pub fn contains(&self, command: &PendingCommand) -> bool {
        self.commands.contains(command)
    }

    /// Transactions a read of `item` by `txn` must wait for: every other
    /// transaction with a recorded write on it.
    pub fn read_conflicts(&self, txn: TxnId, item: ItemId) -> Vec<TxnId> {
        self.conflicts(txn, item, PendingCommand::is_write)
    }

    /// Transactions a write of `item` by `txn` must wait for: every other
    /// transaction with any recorded command on it.
    pub fn write_conflicts(&self, txn: TxnId, item: ItemId) -> Vec<TxnId> {
        self.conflicts(txn, item, |_| true)
    }

    fn conflicts(
        &self,
        txn: TxnId,
        item: ItemId,
        relevant: impl Fn(&PendingCommand) -> bool,
    ) -> Vec<TxnId> {
        let mut blockers = Vec::new();
        for command in &self.commands {
            let other = command.txn();
            if other != txn
                && command.item() == Some(item)
                && relevant(command)
                && !blockers.contains(&other)
            {
                blockers.push(other);
            }
        }
        blockers
    }

    /// Forget everything `txn` submitted. Returns how many records went.
    pub fn purge(&mut self, txn: TxnId) -> usize {
        let before = self.commands.len();
        self.commands.retain(|c| c.txn() != txn);
        before - self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
