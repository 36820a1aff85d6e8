//! Core vocabulary for the replicated database simulator.
//!
//! This crate provides the values that cross the boundary between the
//! concurrency-control engine and whoever drives it:
//!
//! - [`Command`]: every external entry point, as data
//! - [`Outcome`]: what a single read, write or end call achieved
//! - [`Trace`]: observable events, emitted in causal order
//! - [`SiteDump`] / [`CopyDump`]: snapshots of committed values
//!
//! # Architecture
//!
//! ```text
//! Command → Simulation → TransactionManager / SiteRegistry → Vec<Trace>
//! ```
//!
//! The engine is:
//! - **Synchronous**: one command runs to completion before the next
//! - **Deterministic**: same state + command = same traces
//! - **Pure-ish**: mutates itself, performs no I/O
//!
//! Printing traces, reading scripts and timing are left to the caller.

mod command;
mod dump;
mod outcome;
mod trace;

pub use command::{Command, CommandKind};
pub use dump::{CopyDump, SiteDump};
pub use outcome::Outcome;
pub use trace::Trace;
