//! Main simulator runner.
//!
//! Feeds scripts or generated workloads into a [`Simulation`] and collects
//! a [`RunReport`] at the end.

use crate::report::RunReport;
use crate::workload::{WorkloadConfig, WorkloadGenerator};
use repldb_core::{Command, Trace};
use repldb_simulation::{Simulation, SimulationConfig, SimulationError};
use tracing::{info, instrument};

/// Drives one [`Simulation`] from start to finish.
pub struct Simulator {
    /// Underlying deterministic simulation.
    simulation: Simulation,

    /// Configuration the simulation was built from.
    config: SimulationConfig,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    pub fn new(config: SimulationConfig) -> Self {
        info!(
            sites = config.num_sites,
            items = config.num_items,
            "Simulator created"
        );
        Self {
            simulation: Simulation::new(config),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Run a script; `on_command` sees each command with its traces.
    ///
    /// A syntax error or unknown site halts the run after every earlier
    /// command has taken effect.
    #[instrument(skip_all, fields(bytes = source.len()))]
    pub fn run_script(
        &mut self,
        source: &str,
        on_command: impl FnMut(&Command, &[Trace]),
    ) -> Result<RunReport, SimulationError> {
        let executed = self.simulation.run_script(source, on_command)?;
        info!(executed, "Script complete");
        Ok(self.report())
    }

    /// Generate a workload from `workload` and run every command of it.
    #[instrument(skip_all, fields(seed = workload.seed, transactions = workload.transactions))]
    pub fn run_workload(
        &mut self,
        workload: WorkloadConfig,
        on_command: impl FnMut(&Command, &[Trace]),
    ) -> Result<RunReport, SimulationError> {
        let commands = WorkloadGenerator::new(workload, &self.config).generate();
        self.run_commands(commands, on_command)
    }

    /// Run already-built commands in order.
    pub fn run_commands(
        &mut self,
        commands: impl IntoIterator<Item = Command>,
        mut on_command: impl FnMut(&Command, &[Trace]),
    ) -> Result<RunReport, SimulationError> {
        for command in commands {
            let traces = self.simulation.execute(command)?;
            on_command(&command, &traces);
        }

        let report = self.report();
        info!(
            commands = report.commands,
            committed = report.stats.committed,
            aborted = report.stats.total_aborts(),
            deadlocks = report.stats.deadlocks,
            "Simulation complete"
        );
        Ok(report)
    }

    /// Snapshot of the simulation as it stands.
    pub fn report(&self) -> RunReport {
        RunReport::collect(&self.simulation)
    }
}
