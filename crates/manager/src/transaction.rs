//! A live transaction.

use repldb_types::{ItemId, SiteId, Timestamp, TransactionKind, TransactionStatus, TxnId, Value};
use std::collections::BTreeMap;

/// The latest read of an item: what was seen and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadEntry {
    pub value: Value,
    pub site: SiteId,
}

/// A buffered write: the value and every site it must be committed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry {
    pub value: Value,
    pub sites: Vec<SiteId>,
}

/// A transaction between `begin` and commit/abort.
///
/// For a read-only transaction the read-set is the snapshot taken at
/// `beginRO` and never changes afterwards.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TxnId,
    kind: TransactionKind,
    /// Larger means younger.
    start: Timestamp,
    status: TransactionStatus,
    read_set: BTreeMap<ItemId, ReadEntry>,
    write_set: BTreeMap<ItemId, WriteEntry>,
}

impl Transaction {
    pub fn regular(id: TxnId, start: Timestamp) -> Self {
        Self {
            id,
            kind: TransactionKind::Regular,
            start,
            status: TransactionStatus::Running,
            read_set: BTreeMap::new(),
            write_set: BTreeMap::new(),
        }
    }

    pub fn read_only(id: TxnId, start: Timestamp, snapshot: BTreeMap<ItemId, ReadEntry>) -> Self {
        Self {
            id,
            kind: TransactionKind::ReadOnly,
            start,
            status: TransactionStatus::Running,
            read_set: snapshot,
            write_set: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    pub fn read_set(&self) -> &BTreeMap<ItemId, ReadEntry> {
        &self.read_set
    }

    pub fn write_set(&self) -> &BTreeMap<ItemId, WriteEntry> {
        &self.write_set
    }

    /// Remember that `item` was read from `site`, replacing an earlier read.
    pub fn record_read(&mut self, item: ItemId, value: Value, site: SiteId) {
        self.read_set.insert(item, ReadEntry { value, site });
    }

    /// Buffer a write of `item`, replacing an earlier one.
    pub fn record_write(&mut self, item: ItemId, value: Value, sites: Vec<SiteId>) {
        self.write_set.insert(item, WriteEntry { value, sites });
    }

    /// This transaction's own uncommitted value for `item` and the first
    /// site it is buffered for.
    pub fn pending_write(&self, item: ItemId) -> Option<(Value, SiteId)> {
        let entry = self.write_set.get(&item)?;
        entry.sites.first().map(|site| (entry.value, *site))
    }

    /// Whether any read or buffered write of this transaction involved `site`.
    pub fn touches_site(&self, site: SiteId) -> bool {
        self.read_set.values().any(|r| r.site == site)
            || self.write_set.values().any(|w| w.sites.contains(&site))
    }
}
