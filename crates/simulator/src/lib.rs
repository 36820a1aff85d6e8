//! Workload driver for the replicated database simulator.
//!
//! Two ways to feed a [`Simulation`](repldb_simulation::Simulation):
//!
//! - **Scripts**: the line-oriented command language, see
//!   [`Simulator::run_script`].
//! - **Workloads**: a seeded [`WorkloadGenerator`] that emits a
//!   deterministic stream of commands, see [`Simulator::run_workload`].
//!
//! Either run ends with a [`RunReport`].
//!
//! # Determinism
//!
//! Given the same [`WorkloadConfig`] (including its seed) and the same
//! [`SimulationConfig`](repldb_simulation::SimulationConfig), a run produces
//! exactly the same traces and the same report.

mod report;
mod runner;
mod workload;

pub use report::RunReport;
pub use runner::Simulator;
pub use workload::{WorkloadConfig, WorkloadGenerator};
