//! Per-item lock lists.

use repldb_types::{ItemId, LockMode, TxnId};
use std::collections::BTreeMap;
use std::fmt;

/// One granted lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub txn: TxnId,
    pub mode: LockMode,
}

impl fmt::Display for LockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.mode, self.txn)
    }
}

/// Lock lists for the items of one site, each in grant order.
///
/// Invariant: a list holding a `Write` entry holds nothing else. Every
/// transaction appears at most once per list.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    locks: BTreeMap<ItemId, Vec<LockEntry>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries on `item`, in grant order.
    pub fn entries(&self, item: ItemId) -> &[LockEntry] {
        self.locks.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a read by `txn` on `item` would be granted.
    ///
    /// True when no other transaction holds a write lock.
    pub fn can_read(&self, item: ItemId, txn: TxnId) -> bool {
        self.entries(item)
            .iter()
            .all(|e| e.mode == LockMode::Read || e.txn == txn)
    }

    /// Whether a write by `txn` on `item` would be granted.
    ///
    /// True when the list is empty or every entry belongs to `txn`; in the
    /// latter case a read lock is upgraded.
    pub fn can_write(&self, item: ItemId, txn: TxnId) -> bool {
        self.entries(item).iter().all(|e| e.txn == txn)
    }

    /// Grant a read lock. Returns `false` and changes nothing on conflict.
    ///
    /// A transaction that already holds any lock on the item keeps it as is.
    pub fn grant_read(&mut self, item: ItemId, txn: TxnId) -> bool {
        if !self.can_read(item, txn) {
            return false;
        }
        let list = self.locks.entry(item).or_default();
        if !list.iter().any(|e| e.txn == txn) {
            list.push(LockEntry {
                txn,
                mode: LockMode::Read,
            });
        }
        true
    }

    /// Grant a write lock. Returns `false` and changes nothing on conflict.
    ///
    /// On success the list holds exactly one `Write` entry for `txn`.
    pub fn grant_write(&mut self, item: ItemId, txn: TxnId) -> bool {
        if !self.can_write(item, txn) {
            return false;
        }
        let list = self.locks.entry(item).or_default();
        list.clear();
        list.push(LockEntry {
            txn,
            mode: LockMode::Write,
        });
        true
    }

    /// Whether `txn` holds the write lock on `item`.
    pub fn holds_write(&self, item: ItemId, txn: TxnId) -> bool {
        self.entries(item)
            .iter()
            .any(|e| e.txn == txn && e.mode == LockMode::Write)
    }

    /// Whether `txn` holds any lock on `item`.
    pub fn holds(&self, item: ItemId, txn: TxnId) -> bool {
        self.entries(item).iter().any(|e| e.txn == txn)
    }

    /// Remove `txn`'s entries on `item`. Returns whether anything was removed.
    pub fn release(&mut self, item: ItemId, txn: TxnId) -> bool {
        let Some(list) = self.locks.get_mut(&item) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.txn != txn);
        let removed = list.len() != before;
        if list.is_empty() {
            self.locks.remove(&item);
        }
        removed
    }

    /// Remove every entry of `txn`. Returns the items it had locked.
    pub fn release_all(&mut self, txn: TxnId) -> Vec<ItemId> {
        let items: Vec<ItemId> = self
            .locks
            .iter()
            .filter(|(_, list)| list.iter().any(|e| e.txn == txn))
            .map(|(item, _)| *item)
            .collect();
        for item in &items {
            self.release(*item, txn);
        }
        items
    }

    /// Drop every lock.
    pub fn clear(&mut self) {
        self.locks.clear();
    }

    /// Number of items with at least one lock.
    pub fn locked_items(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Iterate over `(item, entries)` in item order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &[LockEntry])> {
        self.locks.iter().map(|(item, list)| (*item, list.as_slice()))
    }
}
