//! The transaction manager.
//!
//! Drives every transaction through strict two-phase locking over the
//! available copies of each item. The manager is the only component that
//! talks to several sites at once; sites just grant, release and commit.
//!
//! # Lifecycle
//!
//! ```text
//! begin ──► Running ◄──► Waiting ──► Committed
//!              │            │
//!              └────────────┴──────► Aborted
//! ```
//!
//! A command that cannot get its locks is parked in the [`WaitQueue`]. Every
//! commit and every abort replays the whole queue once, in arrival order.
//! Conflicts add edges to the wait-for graph and a new edge immediately
//! triggers cycle detection.

use crate::{CommandHistory, ManagerStats, PendingCommand, ReadEntry, Transaction, WaitQueue};
use repldb_core::{Outcome, Trace};
use repldb_deadlock::WaitForGraph;
use repldb_site::{SiteError, SiteRegistry};
use repldb_types::{
    AbortReason, ItemId, SiteId, Timestamp, TransactionKind, TransactionStatus, TxnId, Value,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, trace, warn};

/// Orchestrates transactions across all sites.
///
/// Every public operation advances the logical clock by one tick before
/// doing anything else, so start times strictly increase. Observable effects
/// are collected as [`Trace`]s; drain them with [`take_traces`](Self::take_traces).
#[derive(Debug, Default)]
pub struct TransactionManager {
    clock: Timestamp,

    /// Live transactions. Committed and aborted ones are removed for good.
    active: BTreeMap<TxnId, Transaction>,

    // ═══════════════════════════════════════════════════════════════════════
    // Conflict tracking
    // ═══════════════════════════════════════════════════════════════════════
    graph: WaitForGraph,
    history: CommandHistory,
    queue: WaitQueue,

    // ═══════════════════════════════════════════════════════════════════════
    // Output
    // ═══════════════════════════════════════════════════════════════════════
    traces: Vec<Trace>,
    stats: ManagerStats,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transaction operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Start a regular transaction. Returns `false` if `txn` is already active.
    #[instrument(skip_all, fields(txn = %txn))]
    pub fn begin(&mut self, txn: TxnId) -> bool {
        let now = self.tick();
        if self.active.contains_key(&txn) {
            warn!("Transaction already active, begin ignored");
            return false;
        }
        self.active.insert(txn, Transaction::regular(txn, now));
        self.stats.begun += 1;
        debug!(start = %now, "Transaction started");
        self.emit(Trace::Began {
            txn,
            kind: TransactionKind::Regular,
            start: now,
        });
        true
    }

    /// Start a read-only transaction and capture its snapshot.
    ///
    /// For every item the snapshot takes the first running site (in id
    /// order) whose copy is available. No locks are taken.
    #[instrument(skip_all, fields(txn = %txn))]
    pub fn begin_read_only(&mut self, txn: TxnId, sites: &SiteRegistry) -> bool {
        let now = self.tick();
        if self.active.contains_key(&txn) {
            warn!("Transaction already active, begin ignored");
            return false;
        }

        let placement = sites.placement();
        let mut snapshot = BTreeMap::new();
        for item in placement.items() {
            let source = placement.hosts(item).iter().find_map(|id| {
                let site = sites.get(*id)?;
                if !site.can_serve_read(item) {
                    return None;
                }
                site.value(item).map(|value| ReadEntry { value, site: *id })
            });
            if let Some(entry) = source {
                snapshot.insert(item, entry);
            }
        }

        debug!(start = %now, items = snapshot.len(), "Read-only transaction started");
        self.active
            .insert(txn, Transaction::read_only(txn, now, snapshot));
        self.stats.read_only_begun += 1;
        self.emit(Trace::Began {
            txn,
            kind: TransactionKind::ReadOnly,
            start: now,
        });
        true
    }

    /// Read `item` on behalf of `txn`.
    #[instrument(skip_all, fields(txn = %txn, item = %item))]
    pub fn read(&mut self, txn: TxnId, item: ItemId, sites: &mut SiteRegistry) -> Outcome {
        self.tick();
        self.try_read(txn, item, sites)
    }

    /// Write `value` to `item` on behalf of `txn`.
    #[instrument(skip_all, fields(txn = %txn, item = %item, value = value))]
    pub fn write(
        &mut self,
        txn: TxnId,
        item: ItemId,
        value: Value,
        sites: &mut SiteRegistry,
    ) -> Outcome {
        self.tick();
        self.try_write(txn, item, value, sites)
    }

    /// Commit `txn`, or defer the commit behind its queued commands.
    #[instrument(skip_all, fields(txn = %txn))]
    pub fn end(&mut self, txn: TxnId, sites: &mut SiteRegistry) -> Outcome {
        self.tick();
        self.try_end(txn, sites)
    }

    /// Abort `txn` for `reason`. Returns `false` if it was not active.
    #[instrument(skip_all, fields(txn = %txn, reason = %reason))]
    pub fn abort(&mut self, txn: TxnId, reason: AbortReason, sites: &mut SiteRegistry) -> bool {
        self.tick();
        self.abort_with(txn, reason, sites)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Site operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Fail `site` and abort every transaction that touched it.
    ///
    /// Returns `Ok(false)` if the site was already failed.
    #[instrument(skip_all, fields(site = site.0))]
    pub fn fail_site(&mut self, site: SiteId, sites: &mut SiteRegistry) -> Result<bool, SiteError> {
        self.tick();
        if !sites.fail(site)? {
            info!("Site already failed");
            self.emit(Trace::SiteAlreadyFailed { site });
            return Ok(false);
        }
        self.stats.site_failures += 1;
        self.emit(Trace::SiteFailed { site });
        self.on_site_fail(site, sites);
        Ok(true)
    }

    /// Recover `site`. Returns `Ok(false)` if it was already running.
    ///
    /// Recovery alone does not replay the wait queue.
    #[instrument(skip_all, fields(site = site.0))]
    pub fn recover_site(
        &mut self,
        site: SiteId,
        sites: &mut SiteRegistry,
    ) -> Result<bool, SiteError> {
        let now = self.tick();
        if !sites.recover(site, now)? {
            info!("Site already running");
            self.emit(Trace::SiteAlreadyRunning { site });
            return Ok(false);
        }
        self.stats.site_recoveries += 1;
        self.emit(Trace::SiteRecovered { site });
        Ok(true)
    }

    /// Abort every active transaction whose read-set or write-set names
    /// `site`, then replay the queue once. Returns the aborted transactions.
    ///
    /// Read-only transactions are included: their snapshot is their read-set.
    pub fn on_site_fail(&mut self, site: SiteId, sites: &mut SiteRegistry) -> Vec<TxnId> {
        let victims: Vec<TxnId> = self
            .active
            .values()
            .filter(|t| t.touches_site(site))
            .map(Transaction::id)
            .collect();

        let reason = AbortReason::SiteFailure { site };
        for txn in &victims {
            self.discard(*txn, reason, sites);
        }
        if !victims.is_empty() {
            self.replay(sites);
        }
        victims
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    /// Current logical time.
    pub fn now(&self) -> Timestamp {
        self.clock
    }

    pub fn is_active(&self, txn: TxnId) -> bool {
        self.active.contains_key(&txn)
    }

    pub fn transaction(&self, txn: TxnId) -> Option<&Transaction> {
        self.active.get(&txn)
    }

    /// Live transactions in id order.
    pub fn active_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    pub fn graph(&self) -> &WaitForGraph {
        &self.graph
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn stats(&self) -> &ManagerStats {
        &self.stats
    }

    /// Drain the traces emitted since the last call.
    pub fn take_traces(&mut self) -> Vec<Trace> {
        std::mem::take(&mut self.traces)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internal: attempts (shared by callers and replay)
    // ═══════════════════════════════════════════════════════════════════════

    fn try_read(&mut self, txn: TxnId, item: ItemId, sites: &mut SiteRegistry) -> Outcome {
        let Some(transaction) = self.active.get(&txn) else {
            debug!(%txn, "Read by unknown transaction ignored");
            return Outcome::Ignored;
        };

        if transaction.is_read_only() {
            let entry = transaction.read_set().get(&item).copied();
            return match entry {
                Some(ReadEntry { value, site }) => {
                    self.emit(Trace::ReadValue {
                        txn,
                        item,
                        site,
                        value,
                    });
                    Outcome::Completed
                }
                None => {
                    self.emit(Trace::ReadUnavailable { txn, item });
                    Outcome::Unreadable
                }
            };
        }

        let blockers = self.history.read_conflicts(txn, item);
        if let Some(victim) = self.wait_for(txn, &blockers, sites) {
            return Outcome::Deadlock { victim };
        }
        self.history.record(PendingCommand::Read { txn, item });

        // Read-your-writes: no lock lookup, no read-set entry.
        let own_write = self.active.get(&txn).and_then(|t| t.pending_write(item));
        if let Some((value, site)) = own_write {
            self.emit(Trace::ReadValue {
                txn,
                item,
                site,
                value,
            });
            return Outcome::Completed;
        }

        let hosts = sites.running_hosts(item);
        if hosts.is_empty() {
            self.abort_with(txn, AbortReason::AllCopiesDown, sites);
            return Outcome::Aborted(AbortReason::AllCopiesDown);
        }

        let now = self.clock;
        for id in hosts {
            let Some(site) = sites.get_mut(id) else {
                continue;
            };
            if !site.is_available(item) {
                continue;
            }
            let Some(value) = site.value(item) else {
                continue;
            };
            if site.grant_read(item, txn, now) {
                if let Some(t) = self.active.get_mut(&txn) {
                    t.record_read(item, value, id);
                }
                self.emit(Trace::ReadValue {
                    txn,
                    item,
                    site: id,
                    value,
                });
                return Outcome::Completed;
            }
        }

        self.enqueue(PendingCommand::Read { txn, item });
        Outcome::Waiting
    }

    fn try_write(
        &mut self,
        txn: TxnId,
        item: ItemId,
        value: Value,
        sites: &mut SiteRegistry,
    ) -> Outcome {
        let Some(transaction) = self.active.get(&txn) else {
            debug!(%txn, "Write by unknown transaction ignored");
            return Outcome::Ignored;
        };
        if transaction.is_read_only() {
            warn!(%txn, %item, "Write by read-only transaction ignored");
            return Outcome::Ignored;
        }

        // An identical recorded write is a retry that was already vetted.
        let command = PendingCommand::Write { txn, item, value };
        if !self.history.contains(&command) {
            let blockers = self.history.write_conflicts(txn, item);
            if let Some(victim) = self.wait_for(txn, &blockers, sites) {
                return Outcome::Deadlock { victim };
            }
            self.history.record(command);
        }

        self.emit(Trace::WriteAttempt { txn, item, value });

        let hosts = sites.running_hosts(item);
        if hosts.is_empty() {
            self.abort_with(txn, AbortReason::NoWriteTarget, sites);
            return Outcome::Aborted(AbortReason::NoWriteTarget);
        }

        // All or nothing across the running hosts.
        let grantable = hosts
            .iter()
            .all(|id| sites.get(*id).is_some_and(|s| s.can_grant_write(item, txn)));
        if !grantable {
            self.enqueue(command);
            return Outcome::Waiting;
        }

        let now = self.clock;
        for id in &hosts {
            if let Some(site) = sites.get_mut(*id) {
                site.grant_write(item, txn, value, now);
            }
        }
        if let Some(t) = self.active.get_mut(&txn) {
            t.record_write(item, value, hosts.clone());
        }
        self.emit(Trace::WriteLocked {
            txn,
            item,
            value,
            sites: hosts,
        });
        Outcome::Completed
    }

    fn try_end(&mut self, txn: TxnId, sites: &mut SiteRegistry) -> Outcome {
        if self.queue.has_pending(txn) {
            self.enqueue(PendingCommand::End { txn });
            return Outcome::Waiting;
        }

        let Some(transaction) = self.active.remove(&txn) else {
            debug!(%txn, "End of unknown transaction ignored");
            return Outcome::Ignored;
        };

        if transaction.is_read_only() {
            self.stats.read_only_ended += 1;
            info!(%txn, "Read-only transaction ended");
            self.emit(Trace::ReadOnlyEnded { txn });
            return Outcome::Completed;
        }

        self.commit(transaction, sites);
        Outcome::Completed
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internal: commit, abort, replay
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply the write-set, release every lock, forget the transaction's
    /// edges and history, then replay the queue.
    fn commit(&mut self, transaction: Transaction, sites: &mut SiteRegistry) {
        let txn = transaction.id();
        let now = self.clock;

        for (item, entry) in transaction.write_set() {
            for site in &entry.sites {
                let applied = sites
                    .site_mut(*site)
                    .and_then(|s| s.apply_commit(*item, txn, entry.value, now));
                match applied {
                    Ok(()) => self.emit(Trace::CommitApplied {
                        txn,
                        item: *item,
                        site: *site,
                        value: entry.value,
                    }),
                    Err(error) => warn!(%txn, %item, %error, "Buffered write not applied"),
                }
            }
        }

        sites.release_all(txn);
        self.graph.remove_transaction(txn);
        self.history.purge(txn);

        self.stats.committed += 1;
        info!(%txn, writes = transaction.write_set().len(), "Transaction committed");
        self.emit(Trace::Committed { txn });

        self.replay(sites);
    }

    fn abort_with(&mut self, txn: TxnId, reason: AbortReason, sites: &mut SiteRegistry) -> bool {
        if !self.discard(txn, reason, sites) {
            return false;
        }
        self.replay(sites);
        true
    }

    /// Remove `txn` and everything it left behind. Does not replay.
    fn discard(&mut self, txn: TxnId, reason: AbortReason, sites: &mut SiteRegistry) -> bool {
        if self.active.remove(&txn).is_none() {
            return false;
        }
        let edges = self.graph.remove_transaction(txn);
        let records = self.history.purge(txn);
        let queued = self.queue.purge(txn);
        sites.release_all(txn);

        self.stats.record_abort(reason);
        info!(%txn, %reason, edges, records, queued, "Transaction aborted");
        self.emit(Trace::Aborted { txn, reason });
        true
    }

    /// Retry every queued command once, in arrival order.
    ///
    /// Entries removed after the snapshot was taken (by an abort, or by a
    /// nested replay) are skipped. A retry that still cannot proceed is
    /// queued again at the back.
    fn replay(&mut self, sites: &mut SiteRegistry) {
        if self.queue.is_empty() {
            return;
        }
        self.stats.replays += 1;

        let snapshot = self.queue.snapshot();
        trace!(queued = snapshot.len(), "Replaying wait queue");

        for entry in snapshot {
            let Some(command) = self.queue.remove(entry.seq) else {
                continue;
            };
            let outcome = match command {
                PendingCommand::Read { txn, item } => self.try_read(txn, item, sites),
                PendingCommand::Write { txn, item, value } => {
                    self.try_write(txn, item, value, sites)
                }
                PendingCommand::End { txn } => self.try_end(txn, sites),
            };
            trace!(seq = entry.seq, %command, ?outcome, "Retried");
            self.sync_status(command.txn());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internal: helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn tick(&mut self) -> Timestamp {
        self.clock = self.clock.next();
        self.clock
    }

    fn emit(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// Add `waiter → blocker` edges and look for a cycle after each new one.
    ///
    /// Returns the victim if a cycle was found; it has already been aborted.
    fn wait_for(
        &mut self,
        waiter: TxnId,
        blockers: &[TxnId],
        sites: &mut SiteRegistry,
    ) -> Option<TxnId> {
        for &blocker in blockers {
            if !self.active.contains_key(&waiter) || !self.active.contains_key(&blocker) {
                continue;
            }
            if !self.graph.add_edge(waiter, blocker) {
                continue;
            }
            debug!(%waiter, %blocker, "Wait-for edge added");

            let active = &self.active;
            let Some(deadlock) = self
                .graph
                .detect(|t| active.get(&t).map(Transaction::start))
            else {
                continue;
            };

            info!(
                victim = %deadlock.victim,
                participants = ?deadlock.participants,
                "Deadlock detected"
            );
            self.stats.deadlocks += 1;
            self.emit(Trace::DeadlockDetected {
                victim: deadlock.victim,
                participants: deadlock.participants.clone(),
                edges: deadlock
                    .edges
                    .iter()
                    .map(|e| (e.waiter, e.blocker))
                    .collect(),
            });
            self.abort_with(deadlock.victim, AbortReason::Deadlock, sites);
            return Some(deadlock.victim);
        }
        None
    }

    fn enqueue(&mut self, command: PendingCommand) {
        let seq = self.queue.push(command);
        self.stats.queued += 1;

        let txn = command.txn();
        if let Some(t) = self.active.get_mut(&txn) {
            t.set_status(TransactionStatus::Waiting);
        }

        match command {
            PendingCommand::End { .. } => {
                debug!(%txn, seq, "End deferred");
                self.emit(Trace::EndDeferred { txn });
            }
            _ => {
                debug!(%txn, seq, %command, "Command queued");
                self.emit(Trace::Queued {
                    txn,
                    kind: command.kind(),
                    item: command.item(),
                });
            }
        }
    }

    fn sync_status(&mut self, txn: TxnId) {
        let status = if self.queue.has_pending(txn) {
            TransactionStatus::Waiting
        } else {
            TransactionStatus::Running
        };
        if let Some(t) = self.active.get_mut(&txn) {
            t.set_status(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repldb_types::{test_utils::fully_replicated, ModuloPlacement};
    use std::sync::Arc;
    use tracing_test::traced_test;

    const T1: TxnId = TxnId(1);
    const T2: TxnId = TxnId(2);
    const T3: TxnId = TxnId(3);

    fn setup() -> (TransactionManager, SiteRegistry) {
        let sites = SiteRegistry::new(Arc::new(ModuloPlacement::default()));
        (TransactionManager::new(), sites)
    }

    #[test]
    fn test_queued_read_completes_after_commit() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        assert_eq!(tm.write(T1, ItemId(1), 5, &mut sites), Outcome::Completed);
        tm.begin(T2);

        assert_eq!(tm.read(T2, ItemId(1), &mut sites), Outcome::Waiting);
        assert_eq!(
            tm.transaction(T2).unwrap().status(),
            TransactionStatus::Waiting
        );
        tm.take_traces();

        assert_eq!(tm.end(T1, &mut sites), Outcome::Completed);

        assert_eq!(
            tm.take_traces(),
            vec![
                Trace::CommitApplied {
                    txn: T1,
                    item: ItemId(1),
                    site: SiteId(2),
                    value: 5
                },
                Trace::Committed { txn: T1 },
                Trace::ReadValue {
                    txn: T2,
                    item: ItemId(1),
                    site: SiteId(2),
                    value: 5
                },
            ]
        );
        assert!(tm.queue().is_empty());
        assert_eq!(
            tm.transaction(T2).unwrap().status(),
            TransactionStatus::Running
        );
        assert!(tm.graph().is_empty());
    }

    #[test]
    fn test_write_is_all_or_nothing() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.read(T1, ItemId(2), &mut sites);
        tm.begin(T2);

        assert_eq!(tm.write(T2, ItemId(2), 9, &mut sites), Outcome::Waiting);

        assert!(sites.iter().all(|s| !s.locks().holds(ItemId(2), T2)));
        assert!(tm.transaction(T2).unwrap().write_set().is_empty());
        assert!(tm.graph().contains_edge(T2, T1));
    }

    #[test]
    fn test_write_locks_every_running_copy() {
        let (mut tm, mut sites) = setup();
        tm.fail_site(SiteId(3), &mut sites).unwrap();
        tm.begin(T1);

        assert_eq!(tm.write(T1, ItemId(2), 9, &mut sites), Outcome::Completed);

        let entry = &tm.transaction(T1).unwrap().write_set()[&ItemId(2)];
        assert_eq!(entry.sites.len(), 9);
        assert!(!entry.sites.contains(&SiteId(3)));
        assert!(sites
            .iter()
            .filter(|s| s.is_running())
            .all(|s| s.locks().holds_write(ItemId(2), T1)));
    }

    #[traced_test]
    #[test]
    fn test_deadlock_aborts_younger_and_unblocks_older() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.begin(T2);
        tm.write(T1, ItemId(1), 1, &mut sites);
        tm.write(T2, ItemId(2), 2, &mut sites);
        assert_eq!(tm.write(T1, ItemId(2), 3, &mut sites), Outcome::Waiting);

        let outcome = tm.write(T2, ItemId(1), 4, &mut sites);

        assert_eq!(outcome, Outcome::Deadlock { victim: T2 });
        assert!(!tm.is_active(T2));
        // The replay let T1's queued write through.
        assert!(tm.queue().is_empty());
        assert_eq!(
            tm.transaction(T1).unwrap().pending_write(ItemId(2)),
            Some((3, SiteId(1)))
        );
        assert_eq!(tm.stats().deadlocks, 1);
        assert_eq!(tm.stats().aborts_for(AbortReason::Deadlock), 1);
        assert!(logs_contain("Deadlock detected"));
    }

    #[test]
    fn test_three_way_deadlock_picks_latest_start() {
        let sites_placement = fully_replicated(2, &[1, 2, 3]);
        let mut sites = SiteRegistry::new(Arc::new(sites_placement));
        let mut tm = TransactionManager::new();
        for txn in [T1, T2, T3] {
            tm.begin(txn);
        }
        tm.write(T1, ItemId(1), 1, &mut sites);
        tm.write(T2, ItemId(2), 2, &mut sites);
        tm.write(T3, ItemId(3), 3, &mut sites);
        assert_eq!(tm.read(T1, ItemId(2), &mut sites), Outcome::Waiting);
        assert_eq!(tm.read(T2, ItemId(3), &mut sites), Outcome::Waiting);
        tm.take_traces();

        let outcome = tm.read(T3, ItemId(1), &mut sites);

        assert_eq!(outcome, Outcome::Deadlock { victim: T3 });
        let traces = tm.take_traces();
        assert!(matches!(
            &traces[0],
            Trace::DeadlockDetected { victim, participants, .. }
                if *victim == T3 && participants.len() == 3
        ));
        // T2's read of x3 went through once T3 released its lock.
        assert!(traces.contains(&Trace::ReadValue {
            txn: T2,
            item: ItemId(3),
            site: SiteId(1),
            value: 30
        }));
        assert!(tm.is_active(T1));
        assert!(tm.is_active(T2));
    }

    #[test]
    fn test_read_your_writes() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.write(T1, ItemId(4), 44, &mut sites);
        tm.take_traces();

        assert_eq!(tm.read(T1, ItemId(4), &mut sites), Outcome::Completed);

        assert_eq!(
            tm.take_traces(),
            vec![Trace::ReadValue {
                txn: T1,
                item: ItemId(4),
                site: SiteId(1),
                value: 44
            }]
        );
        assert!(tm.transaction(T1).unwrap().read_set().is_empty());
    }

    #[test]
    fn test_read_only_snapshot_is_fixed() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.write(T1, ItemId(2), 99, &mut sites);
        tm.begin_read_only(T2, &sites);
        tm.end(T1, &mut sites);
        tm.take_traces();

        assert_eq!(tm.read(T2, ItemId(2), &mut sites), Outcome::Completed);
        assert_eq!(
            tm.take_traces(),
            vec![Trace::ReadValue {
                txn: T2,
                item: ItemId(2),
                site: SiteId(1),
                value: 20
            }]
        );
        assert!(sites.iter().all(|s| s.locks().is_empty()));
        assert_eq!(tm.end(T2, &mut sites), Outcome::Completed);
        assert_eq!(tm.stats().read_only_ended, 1);
    }

    #[test]
    fn test_read_only_misses_items_on_failed_sites() {
        let (mut tm, mut sites) = setup();
        tm.fail_site(SiteId(2), &mut sites).unwrap();
        tm.begin_read_only(T1, &sites);

        assert_eq!(tm.read(T1, ItemId(1), &mut sites), Outcome::Unreadable);
        assert_eq!(tm.read(T1, ItemId(2), &mut sites), Outcome::Completed);
    }

    #[test]
    fn test_site_failure_aborts_past_readers() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.read(T1, ItemId(1), &mut sites);
        tm.begin(T2);
        tm.read(T2, ItemId(3), &mut sites);

        assert!(tm.fail_site(SiteId(2), &mut sites).unwrap());

        assert!(!tm.is_active(T1));
        assert!(tm.is_active(T2));
        assert_eq!(tm.end(T1, &mut sites), Outcome::Ignored);
        assert_eq!(
            tm.stats()
                .aborts_for(AbortReason::SiteFailure { site: SiteId(2) }),
            1
        );
        assert!(!tm.fail_site(SiteId(2), &mut sites).unwrap());
    }

    #[test]
    fn test_no_running_host() {
        let (mut tm, mut sites) = setup();
        tm.fail_site(SiteId(2), &mut sites).unwrap();
        tm.begin(T1);
        tm.begin(T2);

        assert_eq!(
            tm.read(T1, ItemId(1), &mut sites),
            Outcome::Aborted(AbortReason::AllCopiesDown)
        );
        assert_eq!(
            tm.write(T2, ItemId(1), 5, &mut sites),
            Outcome::Aborted(AbortReason::NoWriteTarget)
        );
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn test_end_deferred_behind_queued_read() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.write(T1, ItemId(2), 7, &mut sites);
        tm.begin(T2);
        tm.read(T2, ItemId(2), &mut sites);

        assert_eq!(tm.end(T2, &mut sites), Outcome::Waiting);
        assert_eq!(tm.queue().len(), 2);

        tm.end(T1, &mut sites);

        assert_eq!(tm.active_count(), 0);
        assert_eq!(tm.stats().committed, 2);
        assert!(tm.queue().is_empty());
    }

    #[test]
    fn test_unavailable_replica_is_skipped_for_reads() {
        let (mut tm, mut sites) = setup();
        tm.fail_site(SiteId(1), &mut sites).unwrap();
        tm.recover_site(SiteId(1), &mut sites).unwrap();
        tm.begin(T1);
        tm.take_traces();

        tm.read(T1, ItemId(2), &mut sites);

        assert_eq!(
            tm.take_traces(),
            vec![Trace::ReadValue {
                txn: T1,
                item: ItemId(2),
                site: SiteId(2),
                value: 20
            }]
        );
    }

    #[test]
    fn test_stale_and_misdirected_calls_are_ignored() {
        let (mut tm, mut sites) = setup();

        assert_eq!(tm.read(T1, ItemId(2), &mut sites), Outcome::Ignored);
        assert!(tm.begin(T1));
        assert!(!tm.begin(T1));
        tm.begin_read_only(T2, &sites);
        assert_eq!(tm.write(T2, ItemId(2), 1, &mut sites), Outcome::Ignored);
        assert_eq!(tm.stats().begun, 1);
    }

    #[test]
    fn test_clock_ticks_per_operation() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.read(T1, ItemId(2), &mut sites);
        tm.begin(T2);

        assert_eq!(tm.transaction(T1).unwrap().start(), Timestamp(1));
        assert_eq!(tm.transaction(T2).unwrap().start(), Timestamp(3));
        assert_eq!(tm.now(), Timestamp(3));
    }

    #[test]
    fn test_replayed_write_requeues_behind_granted_reader() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.begin(T2);
        tm.begin(T3);

        assert_eq!(tm.read(T1, ItemId(2), &mut sites), Outcome::Completed);
        assert_eq!(tm.write(T2, ItemId(2), 5, &mut sites), Outcome::Waiting);
        // Shares site 1's read lock, but records an edge to the queued writer.
        assert_eq!(tm.read(T3, ItemId(2), &mut sites), Outcome::Completed);

        assert_eq!(tm.end(T1, &mut sites), Outcome::Completed);

        assert!(tm.is_active(T3));
        assert_eq!(tm.stats().deadlocks, 0);
        assert_eq!(tm.queue().len(), 1);
        assert!(!tm.graph().contains_edge(T2, T3));
        assert_eq!(
            tm.transaction(T2).unwrap().status(),
            TransactionStatus::Waiting
        );

        assert_eq!(tm.end(T3, &mut sites), Outcome::Completed);

        assert!(tm.queue().is_empty());
        assert_eq!(tm.stats().committed, 2);
        assert!(sites
            .iter()
            .all(|s| s.locks().holds_write(ItemId(2), T2)));
    }

    #[test]
    fn test_identical_write_skips_conflict_scan() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.begin(T2);
        assert_eq!(tm.write(T1, ItemId(2), 5, &mut sites), Outcome::Completed);
        assert_eq!(tm.write(T2, ItemId(2), 7, &mut sites), Outcome::Waiting);
        assert!(tm.graph().contains_edge(T2, T1));
        tm.take_traces();

        // T2's recorded write is not scanned; T1 already holds the locks.
        assert_eq!(tm.write(T1, ItemId(2), 5, &mut sites), Outcome::Completed);

        assert!(!tm.graph().contains_edge(T1, T2));
        assert_eq!(tm.graph().len(), 1);
        assert_eq!(tm.stats().deadlocks, 0);
        assert!(tm.is_active(T2));
        assert!(matches!(
            tm.take_traces().as_slice(),
            [Trace::WriteAttempt { .. }, Trace::WriteLocked { .. }]
        ));
    }

    #[test]
    fn test_changed_value_write_runs_conflict_scan() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.begin(T2);
        tm.write(T1, ItemId(2), 5, &mut sites);
        assert_eq!(tm.write(T2, ItemId(2), 7, &mut sites), Outcome::Waiting);

        // The scan finds T2's queued write and closes T1 -> T2 -> T1.
        let outcome = tm.write(T1, ItemId(2), 6, &mut sites);

        assert_eq!(outcome, Outcome::Deadlock { victim: T2 });
        assert_eq!(tm.stats().deadlocks, 1);
        assert!(!tm.is_active(T2));
        assert!(tm.queue().is_empty());
        // The triggering write had no effect.
        assert_eq!(
            tm.transaction(T1).unwrap().pending_write(ItemId(2)),
            Some((5, SiteId(1)))
        );
    }

    #[traced_test]
    #[test]
    fn test_external_abort_releases_and_replays() {
        let (mut tm, mut sites) = setup();
        tm.begin(T1);
        tm.begin(T2);
        tm.write(T1, ItemId(4), 44, &mut sites);
        assert_eq!(tm.read(T2, ItemId(4), &mut sites), Outcome::Waiting);

        assert!(tm.abort(T1, AbortReason::Deadlock, &mut sites));
        assert!(!tm.abort(T1, AbortReason::Deadlock, &mut sites));

        assert!(!tm.is_active(T1));
        assert!(tm.queue().is_empty());
        assert!(tm.graph().is_empty());
        assert_eq!(
            tm.transaction(T2).unwrap().read_set()[&ItemId(4)].value,
            40
        );
        assert!(sites.iter().all(|s| !s.locks().holds(ItemId(4), T1)));
        assert_eq!(tm.stats().aborts_for(AbortReason::Deadlock), 1);
        assert!(logs_contain("Transaction aborted"));
    }
}
