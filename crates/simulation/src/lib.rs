//! Deterministic simulation of a replicated database.
//!
//! [`Simulation`] is the single context object that owns every site and the
//! transaction manager. Commands are executed one at a time, to completion,
//! and each returns the traces it caused.
//!
//! # Example
//!
//! ```
//! use repldb_simulation::{Simulation, SimulationConfig};
//!
//! let mut sim = Simulation::new(SimulationConfig::default());
//! let traces = sim
//!     .run_script("begin(T1)\nW(T1,x2,5)\nend(T1)\n", |_, _| {})
//!     .unwrap();
//! assert_eq!(traces, 3);
//! ```

mod config;
mod error;
mod script;
mod simulation;

pub use config::SimulationConfig;
pub use error::SimulationError;
pub use script::{parse_line, parse_script, ScriptError};
pub use simulation::Simulation;
