//! Commands the manager remembers between calls.

use repldb_core::CommandKind;
use repldb_types::{ItemId, TxnId, Value};
use std::fmt;

/// A transaction command that can be recorded for conflict scanning or
/// parked in the wait queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingCommand {
    Read { txn: TxnId, item: ItemId },
    Write { txn: TxnId, item: ItemId, value: Value },
    /// A deferred commit. Only ever queued, never recorded in history.
    End { txn: TxnId },
}

impl PendingCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            PendingCommand::Read { .. } => CommandKind::Read,
            PendingCommand::Write { .. } => CommandKind::Write,
            PendingCommand::End { .. } => CommandKind::End,
        }
    }

    pub fn txn(&self) -> TxnId {
        match self {
            PendingCommand::Read { txn, .. }
            | PendingCommand::Write { txn, .. }
            | PendingCommand::End { txn } => *txn,
        }
    }

    pub fn item(&self) -> Option<ItemId> {
        match self {
            PendingCommand::Read { item, .. } | PendingCommand::Write { item, .. } => Some(*item),
            PendingCommand::End { .. } => None,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, PendingCommand::Write { .. })
    }
}

impl fmt::Display for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingCommand::Read { txn, item } => write!(f, "R({},{})", txn, item),
            PendingCommand::Write { txn, item, value } => {
                write!(f, "W({},{},{})", txn, item, value)
            }
            PendingCommand::End { txn } => write!(f, "end({})", txn),
        }
    }
}
