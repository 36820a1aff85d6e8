//! Deadlock detection for lock-waiting transactions.
//!
//! This crate keeps the wait-for graph between transactions and finds cycles
//! in it.
//!
//! # Problem
//!
//! Under strict two-phase locking a transaction waits while another holds a
//! conflicting lock. Waits can close a loop:
//!
//! ```text
//! T1 waits for T2 (T2 wrote x1)
//! T2 waits for T3 (T3 wrote x2)
//! T3 waits for T1 (T1 wrote x3)
//!
//! Result: nobody can proceed → Deadlock
//! ```
//!
//! # Solution
//!
//! Every conflict adds a `(waiter, blocker)` edge. After each new edge the
//! graph is searched depth-first with three-state marking. A back edge to a
//! node still on the current path is a cycle. The youngest transaction on
//! that path (latest start time) is the victim, since it has done the least
//! work. The caller aborts it, which removes its edges.
//!
//! # Components
//!
//! - [`WaitForGraph`] - deduplicated edges in insertion order, with incident-edge pruning
//! - [`Deadlock`] - a detected cycle: victim, participants and their edges

mod detect;
mod graph;

pub use detect::{select_victim, Deadlock};
pub use graph::{WaitEdge, WaitForGraph};
