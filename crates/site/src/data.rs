//! One site's copy of one item.

use repldb_types::{ItemId, Timestamp, TxnId, Value};
use std::collections::BTreeMap;

/// A copy of an item at a single site.
///
/// Holds exactly one externally visible value, the last committed one.
/// Writers stage tentative values keyed by transaction; a staged value is
/// removed when it is committed or when its writer aborts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    item: ItemId,
    committed: Value,
    /// Tentative values, invisible to readers.
    uncommitted: BTreeMap<TxnId, Value>,
    last_commit: Timestamp,
    last_access: BTreeMap<TxnId, Timestamp>,
}

impl Data {
    /// A fresh copy holding `value`, committed at `now`.
    pub fn new(item: ItemId, value: Value, now: Timestamp) -> Self {
        Self {
            item,
            committed: value,
            uncommitted: BTreeMap::new(),
            last_commit: now,
            last_access: BTreeMap::new(),
        }
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    /// The committed value.
    pub fn value(&self) -> Value {
        self.committed
    }

    pub fn last_commit(&self) -> Timestamp {
        self.last_commit
    }

    /// The value `txn` staged here, if any.
    pub fn uncommitted(&self, txn: TxnId) -> Option<Value> {
        self.uncommitted.get(&txn).copied()
    }

    /// Whether any writer has a staged value.
    pub fn has_uncommitted(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Last time `txn` read or wrote this copy.
    pub fn last_access(&self, txn: TxnId) -> Option<Timestamp> {
        self.last_access.get(&txn).copied()
    }

    /// Record that `txn` touched this copy.
    pub fn touch(&mut self, txn: TxnId, now: Timestamp) {
        self.last_access.insert(txn, now);
    }

    /// Stage `value` for `txn`, replacing any earlier staged value.
    pub fn stage(&mut self, txn: TxnId, value: Value, now: Timestamp) {
        self.uncommitted.insert(txn, value);
        self.touch(txn, now);
    }

    /// Make `value` the committed value and drop `txn`'s staged entry.
    pub fn commit(&mut self, txn: TxnId, value: Value, now: Timestamp) {
        self.committed = value;
        self.last_commit = now;
        self.uncommitted.remove(&txn);
        self.last_access.remove(&txn);
    }

    /// Forget everything `txn` left on this copy.
    pub fn discard(&mut self, txn: TxnId) {
        self.uncommitted.remove(&txn);
        self.last_access.remove(&txn);
    }

    /// Forget every staged value. Used when the site fails.
    pub fn discard_all(&mut self) {
        self.uncommitted.clear();
        self.last_access.clear();
    }
}
