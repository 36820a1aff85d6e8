//! Command types: the external entry points of the simulator.

use repldb_types::{ItemId, SiteId, TxnId, Value};
use std::fmt;

/// One external request.
///
/// Commands are **passive data**: the simulation dispatches each one to the
/// transaction manager or the site registry and collects the resulting
/// traces. `Display` renders the script syntax the command was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // ═══════════════════════════════════════════════════════════════════════
    // Transactions
    // ═══════════════════════════════════════════════════════════════════════
    /// Start a regular transaction.
    Begin { txn: TxnId },

    /// Start a read-only transaction with a snapshot of all readable copies.
    BeginReadOnly { txn: TxnId },

    /// Read one item.
    Read { txn: TxnId, item: ItemId },

    /// Write one item; the value stays invisible until commit.
    Write {
        txn: TxnId,
        item: ItemId,
        value: Value,
    },

    /// Commit (or, for read-only transactions, simply finish).
    End { txn: TxnId },

    // ═══════════════════════════════════════════════════════════════════════
    // Sites
    // ═══════════════════════════════════════════════════════════════════════
    /// Fail a site, losing its lock table.
    Fail { site: SiteId },

    /// Bring a failed site back.
    Recover { site: SiteId },

    // ═══════════════════════════════════════════════════════════════════════
    // Diagnostics
    // ═══════════════════════════════════════════════════════════════════════
    /// Committed values at every site.
    DumpAll,

    /// Committed values at one site.
    DumpSite { site: SiteId },

    /// Committed values of one item across running sites.
    DumpItem { item: ItemId },
}

impl Command {
    /// The transaction this command belongs to, if any.
    pub fn txn(&self) -> Option<TxnId> {
        match self {
            Command::Begin { txn }
            | Command::BeginReadOnly { txn }
            | Command::Read { txn, .. }
            | Command::Write { txn, .. }
            | Command::End { txn } => Some(*txn),
            _ => None,
        }
    }

    /// The site this command names, if any.
    pub fn site(&self) -> Option<SiteId> {
        match self {
            Command::Fail { site } | Command::Recover { site } | Command::DumpSite { site } => {
                Some(*site)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Begin { txn } => write!(f, "begin({})", txn),
            Command::BeginReadOnly { txn } => write!(f, "beginRO({})", txn),
            Command::Read { txn, item } => write!(f, "R({},{})", txn, item),
            Command::Write { txn, item, value } => write!(f, "W({},{},{})", txn, item, value),
            Command::End { txn } => write!(f, "end({})", txn),
            Command::Fail { site } => write!(f, "fail({})", site),
            Command::Recover { site } => write!(f, "recover({})", site),
            Command::DumpAll => write!(f, "dump()"),
            Command::DumpSite { site } => write!(f, "dump({})", site),
            Command::DumpItem { item } => write!(f, "dump({})", item),
        }
    }
}

/// Kind of a command that can wait in the manager's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// A read that found no grantable copy.
    Read,
    /// A write that could not lock every running copy.
    Write,
    /// A commit deferred behind the transaction's own queued commands.
    End,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Read => write!(f, "read"),
            CommandKind::Write => write!(f, "write"),
            CommandKind::End => write!(f, "end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_script_syntax() {
        let write = Command::Write {
            txn: TxnId(1),
            item: ItemId(4),
            value: 91,
        };
        assert_eq!(write.to_string(), "W(T1,x4,91)");
        assert_eq!(
            Command::BeginReadOnly { txn: TxnId(2) }.to_string(),
            "beginRO(T2)"
        );
        assert_eq!(Command::DumpItem { item: ItemId(3) }.to_string(), "dump(x3)");
        assert_eq!(Command::DumpSite { site: SiteId(3) }.to_string(), "dump(3)");
    }

    #[test]
    fn test_txn_accessor() {
        assert_eq!(Command::End { txn: TxnId(7) }.txn(), Some(TxnId(7)));
        assert_eq!(Command::Fail { site: SiteId(1) }.txn(), None);
        assert_eq!(Command::DumpAll.txn(), None);
        assert_eq!(
            Command::DumpSite { site: SiteId(4) }.site(),
            Some(SiteId(4))
        );
        assert_eq!(Command::End { txn: TxnId(7) }.site(), None);
    }
}
