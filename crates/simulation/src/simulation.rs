//! The simulation context.

use crate::{parse_line, ScriptError, SimulationConfig, SimulationError};
use repldb_core::{Command, CopyDump, Outcome, Trace};
use repldb_manager::{ManagerStats, TransactionManager};
use repldb_site::{Site, SiteRegistry};
use repldb_types::{ItemId, Placement, SiteId, Timestamp, TxnId, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// All sites plus the transaction manager, driven one command at a time.
///
/// There is no global state: everything the engine touches lives here.
#[derive(Debug)]
pub struct Simulation {
    sites: SiteRegistry,
    manager: TransactionManager,
    commands_executed: u64,
}

impl Simulation {
    /// A simulation laid out by [`SimulationConfig::placement`].
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_placement(Arc::new(config.placement()))
    }

    /// A simulation laid out by any placement policy.
    pub fn with_placement(placement: Arc<dyn Placement>) -> Self {
        info!(
            sites = placement.num_sites(),
            items = placement.items().len(),
            "Creating simulation"
        );
        Self {
            sites: SiteRegistry::new(placement),
            manager: TransactionManager::new(),
            commands_executed: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Command dispatch
    // ═══════════════════════════════════════════════════════════════════════

    /// Run one command to completion and return the traces it caused.
    ///
    /// Only an unknown site id is an error.
    pub fn execute(&mut self, command: Command) -> Result<Vec<Trace>, SimulationError> {
        debug!(%command, "Executing command");
        self.commands_executed += 1;

        let mut dumps = Vec::new();
        match command {
            Command::Begin { txn } => {
                self.begin(txn);
            }
            Command::BeginReadOnly { txn } => {
                self.begin_read_only(txn);
            }
            Command::Read { txn, item } => {
                self.read(txn, item);
            }
            Command::Write { txn, item, value } => {
                self.write(txn, item, value);
            }
            Command::End { txn } => {
                self.end(txn);
            }
            Command::Fail { site } => {
                self.fail(site)?;
            }
            Command::Recover { site } => {
                self.recover(site)?;
            }
            Command::DumpAll => dumps = self.dump_all(),
            Command::DumpSite { site } => dumps.push(self.dump_site(site)?),
            Command::DumpItem { item } => dumps.push(self.dump_item(item)),
        }

        let mut traces = self.manager.take_traces();
        traces.extend(dumps);
        Ok(traces)
    }

    /// Parse and run `source` line by line.
    ///
    /// Every command before the first bad line is executed; the bad line
    /// halts the run. `on_command` sees each command with its traces.
    /// Returns the number of commands executed.
    pub fn run_script(
        &mut self,
        source: &str,
        mut on_command: impl FnMut(&Command, &[Trace]),
    ) -> Result<usize, SimulationError> {
        let mut executed = 0;
        for (index, text) in source.lines().enumerate() {
            let line = index + 1;
            let Some(command) = parse_line(line, text)? else {
                continue;
            };
            if let Some(site) = command.site() {
                if self.sites.get(site).is_none() {
                    return Err(ScriptError::UnknownSite { line, site }.into());
                }
            }
            let traces = self.execute(command)?;
            on_command(&command, &traces);
            executed += 1;
        }
        Ok(executed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entry points
    //
    // Each leaves its traces in the manager's outbox; drain them with
    // `take_traces`.
    // ═══════════════════════════════════════════════════════════════════════

    pub fn begin(&mut self, txn: TxnId) -> bool {
        self.manager.begin(txn)
    }

    pub fn begin_read_only(&mut self, txn: TxnId) -> bool {
        self.manager.begin_read_only(txn, &self.sites)
    }

    pub fn read(&mut self, txn: TxnId, item: ItemId) -> Outcome {
        self.manager.read(txn, item, &mut self.sites)
    }

    pub fn write(&mut self, txn: TxnId, item: ItemId, value: Value) -> Outcome {
        self.manager.write(txn, item, value, &mut self.sites)
    }

    pub fn end(&mut self, txn: TxnId) -> Outcome {
        self.manager.end(txn, &mut self.sites)
    }

    /// Fail `site`, aborting every transaction that touched it.
    pub fn fail(&mut self, site: SiteId) -> Result<bool, SimulationError> {
        Ok(self.manager.fail_site(site, &mut self.sites)?)
    }

    pub fn recover(&mut self, site: SiteId) -> Result<bool, SimulationError> {
        Ok(self.manager.recover_site(site, &mut self.sites)?)
    }

    /// Drain traces left by the direct entry points.
    pub fn take_traces(&mut self) -> Vec<Trace> {
        self.manager.take_traces()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Dumps
    // ═══════════════════════════════════════════════════════════════════════

    /// One trace per site, in id order.
    pub fn dump_all(&self) -> Vec<Trace> {
        self.sites.iter().map(site_trace).collect()
    }

    pub fn dump_site(&self, site: SiteId) -> Result<Trace, SimulationError> {
        Ok(site_trace(self.sites.site(site)?))
    }

    /// Every copy of `item` at a running site, available or not.
    pub fn dump_item(&self, item: ItemId) -> Trace {
        let copies: Vec<CopyDump> = self
            .sites
            .running_hosts(item)
            .into_iter()
            .filter_map(|id| self.sites.get(id).and_then(|s| s.copy_dump(item)))
            .collect();
        if copies.is_empty() {
            Trace::ItemUnavailable { item }
        } else {
            Trace::ItemDump { item, copies }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════════════════

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    pub fn stats(&self) -> &ManagerStats {
        self.manager.stats()
    }

    pub fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    pub fn now(&self) -> Timestamp {
        self.manager.now()
    }

    /// Number of commands parked in the wait queue.
    pub fn queue_len(&self) -> usize {
        self.manager.queue().len()
    }

    /// Replicated items whose readable copies disagree.
    ///
    /// Only items with no staged write anywhere are checked, and only
    /// running sites with an available copy take part. An empty result means
    /// the copies are consistent.
    pub fn divergent_items(&self) -> Vec<ItemId> {
        let placement = self.sites.placement();
        placement
            .items()
            .into_iter()
            .filter(|item| placement.is_replicated(*item))
            .filter(|item| {
                let copies: Vec<_> = placement
                    .hosts(*item)
                    .iter()
                    .filter_map(|id| self.sites.get(*id))
                    .filter_map(|site| site.data(*item).map(|data| (site, data)))
                    .collect();
                if copies.iter().any(|(_, data)| data.has_uncommitted()) {
                    return false;
                }
                let mut readable = copies
                    .iter()
                    .filter(|(site, _)| site.can_serve_read(*item))
                    .map(|(_, data)| data.value());
                match readable.next() {
                    Some(first) => readable.any(|v| v != first),
                    None => false,
                }
            })
            .collect()
    }
}

fn site_trace(site: &Site) -> Trace {
    if site.is_running() {
        Trace::SiteDump(site.dump())
    } else {
        Trace::SiteDown { site: site.id() }
    }
}
