//! A single site.

use crate::{Data, LockTable, SiteError};
use repldb_core::{CopyDump, SiteDump};
use repldb_types::{ItemId, SiteId, Timestamp, TxnId, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Running/failed status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    Running,
    Failed,
}

/// One site: its item copies, their availability and its lock table.
///
/// The site is the only code that mutates its lock table and data. The
/// transaction manager talks to it through grant/release/commit calls.
#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    status: SiteStatus,
    last_recovery: Timestamp,
    data: BTreeMap<ItemId, Data>,
    /// False for a replica that recovered and has not seen a committed write yet.
    available: BTreeMap<ItemId, bool>,
    locks: LockTable,
}

impl Site {
    /// A running site with no items.
    pub fn new(id: SiteId) -> Self {
        Self {
            id,
            status: SiteStatus::Running,
            last_recovery: Timestamp::ZERO,
            data: BTreeMap::new(),
            available: BTreeMap::new(),
            locks: LockTable::new(),
        }
    }

    /// Host a copy of `item` holding `value`, immediately readable.
    pub fn add_item(&mut self, item: ItemId, value: Value, now: Timestamp) {
        self.data.insert(item, Data::new(item, value, now));
        self.available.insert(item, true);
    }

    pub fn id(&self) -> SiteId {
        self.id
    }

    pub fn status(&self) -> SiteStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SiteStatus::Running
    }

    pub fn last_recovery(&self) -> Timestamp {
        self.last_recovery
    }

    /// Whether this site hosts a copy of `item`, regardless of status.
    pub fn hosts(&self, item: ItemId) -> bool {
        self.data.contains_key(&item)
    }

    /// Hosted items, in order.
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.data.keys().copied()
    }

    /// Whether the copy of `item` may be read (ignoring locks).
    pub fn is_available(&self, item: ItemId) -> bool {
        self.available.get(&item).copied().unwrap_or(false)
    }

    /// Whether a reader could be served `item` here right now, locks aside.
    pub fn can_serve_read(&self, item: ItemId) -> bool {
        self.is_running() && self.is_available(item)
    }

    /// Committed value of `item`.
    pub fn value(&self, item: ItemId) -> Option<Value> {
        self.data.get(&item).map(Data::value)
    }

    pub fn data(&self, item: ItemId) -> Option<&Data> {
        self.data.get(&item)
    }

    /// Read-only view of the lock table.
    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    // ─── Locking ───

    /// Try to take a read lock on `item` for `txn`.
    ///
    /// Fails on a failed site, an unhosted item, or a foreign write lock.
    pub fn grant_read(&mut self, item: ItemId, txn: TxnId, now: Timestamp) -> bool {
        if !self.is_running() || !self.hosts(item) {
            return false;
        }
        if !self.locks.grant_read(item, txn) {
            trace!(site = self.id.0, %item, %txn, "Read lock refused");
            return false;
        }
        if let Some(data) = self.data.get_mut(&item) {
            data.touch(txn, now);
        }
        debug!(site = self.id.0, %item, %txn, "Read lock granted");
        true
    }

    /// Whether a write lock on `item` would be granted to `txn`.
    pub fn can_grant_write(&self, item: ItemId, txn: TxnId) -> bool {
        self.is_running() && self.hosts(item) && self.locks.can_write(item, txn)
    }

    /// Take the write lock on `item` for `txn` and stage `value`.
    ///
    /// All or nothing: on refusal neither the lock table nor the data change.
    pub fn grant_write(&mut self, item: ItemId, txn: TxnId, value: Value, now: Timestamp) -> bool {
        if !self.can_grant_write(item, txn) {
            return false;
        }
        self.locks.grant_write(item, txn);
        if let Some(data) = self.data.get_mut(&item) {
            data.stage(txn, value, now);
        }
        debug!(site = self.id.0, %item, %txn, value, "Write lock granted");
        true
    }

    /// Release `txn`'s lock on `item`.
    pub fn release_lock(&mut self, item: ItemId, txn: TxnId) -> bool {
        self.locks.release(item, txn)
    }

    /// Release every lock of `txn` and discard its staged values.
    pub fn release_all(&mut self, txn: TxnId) {
        let released = self.locks.release_all(txn);
        for data in self.data.values_mut() {
            data.discard(txn);
        }
        if !released.is_empty() {
            trace!(site = self.id.0, %txn, items = ?released, "Released locks");
        }
    }

    // ─── Commit ───

    /// Install `value` as the committed value of `item` on behalf of `txn`.
    ///
    /// Requires the write lock, which is released. The copy becomes readable
    /// even if it was waiting for a post-recovery write.
    pub fn apply_commit(
        &mut self,
        item: ItemId,
        txn: TxnId,
        value: Value,
        now: Timestamp,
    ) -> Result<(), SiteError> {
        if !self.locks.holds_write(item, txn) {
            return Err(SiteError::LockNotHeld {
                site: self.id,
                item,
                txn,
            });
        }
        let data = self.data.get_mut(&item).ok_or(SiteError::ItemNotHosted {
            site: self.id,
            item,
        })?;
        data.commit(txn, value, now);
        self.locks.release(item, txn);
        self.available.insert(item, true);
        debug!(site = self.id.0, %item, %txn, value, "Commit applied");
        Ok(())
    }

    // ─── Failure and recovery ───

    /// Fail the site. Returns `false` if it was already failed.
    ///
    /// The lock table and all staged values are lost; committed values stay.
    pub fn fail(&mut self) -> bool {
        if self.status == SiteStatus::Failed {
            return false;
        }
        self.status = SiteStatus::Failed;
        self.locks.clear();
        for data in self.data.values_mut() {
            data.discard_all();
        }
        true
    }

    /// Recover the site. Returns `false` if it was already running.
    ///
    /// A copy of an item hosted elsewhere too stays unreadable until the next
    /// committed write here; a copy nobody else hosts is readable at once.
    pub fn recover(&mut self, now: Timestamp, replicated: impl Fn(ItemId) -> bool) -> bool {
        if self.status == SiteStatus::Running {
            return false;
        }
        self.status = SiteStatus::Running;
        self.last_recovery = now;
        for item in self.data.keys() {
            self.available.insert(*item, !replicated(*item));
        }
        true
    }

    // ─── Dumps ───

    /// Committed value and availability of one copy.
    pub fn copy_dump(&self, item: ItemId) -> Option<CopyDump> {
        self.data.get(&item).map(|data| CopyDump {
            site: self.id,
            item,
            value: data.value(),
            available: self.is_available(item),
        })
    }

    /// Every copy on this site.
    pub fn dump(&self) -> SiteDump {
        SiteDump {
            site: self.id,
            copies: self.items().filter_map(|i| self.copy_dump(i)).collect(),
        }
    }
}
