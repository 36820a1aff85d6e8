//! Observable events.

use crate::{CommandKind, CopyDump, SiteDump};
use repldb_types::{AbortReason, ItemId, SiteId, Timestamp, TransactionKind, TxnId, Value};
use std::fmt;

/// Something observable that happened while processing a command.
///
/// Traces are emitted in causal order. The set of traces and their order is
/// the contract; the `Display` text is for humans only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    // ═══════════════════════════════════════════════════════════════════════
    // Transaction lifecycle
    // ═══════════════════════════════════════════════════════════════════════
    /// A transaction started.
    Began {
        txn: TxnId,
        kind: TransactionKind,
        start: Timestamp,
    },

    /// A committed value (or the transaction's own pending write) was read.
    ReadValue {
        txn: TxnId,
        item: ItemId,
        site: SiteId,
        value: Value,
    },

    /// A read-only transaction's snapshot has no copy of the item.
    ReadUnavailable { txn: TxnId, item: ItemId },

    /// A write was submitted (or retried) and is about to try for locks.
    WriteAttempt {
        txn: TxnId,
        item: ItemId,
        value: Value,
    },

    /// A write took write locks at every running host and is buffered.
    WriteLocked {
        txn: TxnId,
        item: ItemId,
        value: Value,
        sites: Vec<SiteId>,
    },

    /// A command could not proceed and joined the wait queue.
    Queued {
        txn: TxnId,
        kind: CommandKind,
        item: Option<ItemId>,
    },

    /// `end` was deferred behind the transaction's own queued commands.
    EndDeferred { txn: TxnId },

    /// A buffered write became the committed value at one site.
    CommitApplied {
        txn: TxnId,
        item: ItemId,
        site: SiteId,
        value: Value,
    },

    /// A regular transaction committed.
    Committed { txn: TxnId },

    /// A read-only transaction finished.
    ReadOnlyEnded { txn: TxnId },

    // ═══════════════════════════════════════════════════════════════════════
    // Aborts
    // ═══════════════════════════════════════════════════════════════════════
    /// A wait-for cycle was found.
    ///
    /// `participants` are the transactions on the detection path, victim
    /// first; `edges` are the wait-for edges among them.
    DeadlockDetected {
        victim: TxnId,
        participants: Vec<TxnId>,
        edges: Vec<(TxnId, TxnId)>,
    },

    /// A transaction was aborted and removed.
    Aborted { txn: TxnId, reason: AbortReason },

    // ═══════════════════════════════════════════════════════════════════════
    // Sites
    // ═══════════════════════════════════════════════════════════════════════
    SiteFailed { site: SiteId },
    SiteAlreadyFailed { site: SiteId },
    SiteRecovered { site: SiteId },
    SiteAlreadyRunning { site: SiteId },

    // ═══════════════════════════════════════════════════════════════════════
    // Dumps
    // ═══════════════════════════════════════════════════════════════════════
    /// Committed values at a running site.
    SiteDump(SiteDump),

    /// A dumped site is failed.
    SiteDown { site: SiteId },

    /// Copies of one item at running sites.
    ItemDump { item: ItemId, copies: Vec<CopyDump> },

    /// No running site hosts the dumped item.
    ItemUnavailable { item: ItemId },
}

impl Trace {
    /// The transaction this trace is about, if any.
    pub fn txn(&self) -> Option<TxnId> {
        match self {
            Trace::Began { txn, .. }
            | Trace::ReadValue { txn, .. }
            | Trace::ReadUnavailable { txn, .. }
            | Trace::WriteAttempt { txn, .. }
            | Trace::WriteLocked { txn, .. }
            | Trace::Queued { txn, .. }
            | Trace::EndDeferred { txn }
            | Trace::CommitApplied { txn, .. }
            | Trace::Committed { txn }
            | Trace::ReadOnlyEnded { txn }
            | Trace::Aborted { txn, .. } => Some(*txn),
            Trace::DeadlockDetected { victim, .. } => Some(*victim),
            _ => None,
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trace::Began { txn, kind, .. } => write!(f, "{} starts as a {} transaction", txn, kind),
            Trace::ReadValue {
                txn,
                item,
                site,
                value,
            } => write!(f, "{} reads data item {}.{} = {}", txn, item, site, value),
            Trace::ReadUnavailable { txn, item } => write!(f, "{} cannot read item {}", txn, item),
            Trace::WriteAttempt { txn, item, value } => write!(
                f,
                "{} attempts to write the value {} to data item {}",
                txn, value, item
            ),
            Trace::WriteLocked {
                txn, item, sites, ..
            } => write!(
                f,
                "{} holds write locks on {} at sites [{}]",
                txn,
                item,
                join(sites, ", ")
            ),
            Trace::Queued { txn, kind, item } => match item {
                Some(item) => write!(f, "{} waits: {} of {} queued", txn, kind, item),
                None => write!(f, "{} waits: {} queued", txn, kind),
            },
            Trace::EndDeferred { txn } => {
                write!(f, "{} end deferred until its queued commands run", txn)
            }
            Trace::CommitApplied {
                txn,
                item,
                site,
                value,
            } => write!(f, "{} writes value {} to data item {}.{}", txn, value, item, site),
            Trace::Committed { txn } => write!(f, "{} commits", txn),
            Trace::ReadOnlyEnded { txn } => write!(f, "{} ended", txn),
            Trace::DeadlockDetected {
                victim,
                participants,
                edges,
            } => {
                let others: Vec<TxnId> = participants
                    .iter()
                    .copied()
                    .filter(|t| t != victim)
                    .collect();
                let edges: Vec<String> = edges
                    .iter()
                    .map(|(waiter, blocker)| format!("{} --> {}", waiter, blocker))
                    .collect();
                write!(
                    f,
                    "{} aborted for a deadlock with transactions {} [{}]",
                    victim,
                    join(&others, " "),
                    edges.join(", ")
                )
            }
            Trace::Aborted { txn, reason } => write!(f, "{} aborted because of {}", txn, reason),
            Trace::SiteFailed { site } => write!(f, "Site {} failed.", site),
            Trace::SiteAlreadyFailed { site } => write!(f, "Site {} is already failed.", site),
            Trace::SiteRecovered { site } => write!(f, "Site {} recovered.", site),
            Trace::SiteAlreadyRunning { site } => write!(f, "Site {} is already running.", site),
            Trace::SiteDump(dump) => write!(f, "{}", dump),
            Trace::SiteDown { site } => write!(f, "Site {} is down.", site),
            Trace::ItemDump { copies, .. } => write!(f, "{}", join(copies, "\n")),
            Trace::ItemUnavailable { item } => write!(
                f,
                "Data item index {} is unavailable on running sites.",
                item.0
            ),
        }
    }
}
