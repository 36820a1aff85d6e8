//! End-of-run reporting.

use repldb_manager::ManagerStats;
use repldb_simulation::Simulation;
use repldb_types::{ItemId, Timestamp};
use std::fmt;

/// Final simulation report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Commands executed, dumps included.
    pub commands: u64,
    /// Manager counters.
    pub stats: ManagerStats,
    /// Logical clock at the end of the run.
    pub clock: Timestamp,
    /// Commands still parked in the wait queue.
    pub queue_len: usize,
    /// Transactions begun and neither committed nor aborted.
    pub active: usize,
    /// Replicated items whose readable copies disagree.
    pub divergent_items: Vec<ItemId>,
}

impl RunReport {
    /// Collect a report from the current state of `simulation`.
    pub fn collect(simulation: &Simulation) -> Self {
        Self {
            commands: simulation.commands_executed(),
            stats: simulation.stats().clone(),
            clock: simulation.now(),
            queue_len: simulation.queue_len(),
            active: simulation.manager().active_count(),
            divergent_items: simulation.divergent_items(),
        }
    }

    /// Whether every readable copy of every replicated item agrees.
    pub fn is_consistent(&self) -> bool {
        self.divergent_items.is_empty()
    }

    /// Whether the run left nothing behind: no open transaction, no queue.
    pub fn is_drained(&self) -> bool {
        self.queue_len == 0 && self.active == 0
    }

    /// Aborted / (committed + aborted).
    pub fn abort_rate(&self) -> f64 {
        let aborted = self.stats.total_aborts();
        let decided = self.stats.committed + aborted;
        if decided > 0 {
            aborted as f64 / decided as f64
        } else {
            0.0
        }
    }

    /// Print a summary of the report.
    pub fn print_summary(&self) {
        println!("{self}");
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "═══════════════════════════════════════════")?;
        writeln!(f, "           SIMULATION REPORT")?;
        writeln!(f, "═══════════════════════════════════════════")?;
        writeln!(f, "Commands:     {} (clock {})", self.commands, self.clock)?;
        writeln!(f)?;
        writeln!(f, "Transactions:")?;
        writeln!(f, "  Begun:      {}", stats.begun)?;
        writeln!(f, "  Read-only:  {}", stats.read_only_begun)?;
        writeln!(f, "  Committed:  {}", stats.committed)?;
        writeln!(f, "  RO ended:   {}", stats.read_only_ended)?;
        writeln!(
            f,
            "  Aborted:    {} ({:.2}%)",
            stats.total_aborts(),
            self.abort_rate() * 100.0
        )?;
        for (reason, count) in &stats.aborts {
            writeln!(f, "    {reason}: {count}")?;
        }
        writeln!(f, "  Still open: {}", self.active)?;
        writeln!(f)?;
        writeln!(f, "Contention:")?;
        writeln!(f, "  Deadlocks:  {}", stats.deadlocks)?;
        writeln!(f, "  Queued:     {}", stats.queued)?;
        writeln!(f, "  Replays:    {}", stats.replays)?;
        writeln!(f, "  Waiting:    {}", self.queue_len)?;
        writeln!(f)?;
        writeln!(f, "Sites:")?;
        writeln!(f, "  Failures:   {}", stats.site_failures)?;
        writeln!(f, "  Recoveries: {}", stats.site_recoveries)?;
        writeln!(f)?;
        if self.is_consistent() {
            writeln!(f, "Replicas:     consistent")?;
        } else {
            let items: Vec<String> = self.divergent_items.iter().map(|i| i.to_string()).collect();
            writeln!(f, "Replicas:     DIVERGENT ({})", items.join(", "))?;
        }
        write!(f, "═══════════════════════════════════════════")
    }
}
