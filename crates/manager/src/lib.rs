//! Transaction manager for the replicated database simulator.
//!
//! The manager owns every live [`Transaction`], the wait-for graph, the
//! record of submitted commands and the FIFO [`WaitQueue`]. Sites are passed
//! in by the caller on every operation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use repldb_core::Outcome;
//! use repldb_manager::TransactionManager;
//! use repldb_site::SiteRegistry;
//! use repldb_types::{ItemId, ModuloPlacement, TxnId};
//!
//! let mut sites = SiteRegistry::new(Arc::new(ModuloPlacement::default()));
//! let mut tm = TransactionManager::new();
//!
//! tm.begin(TxnId(1));
//! assert_eq!(tm.write(TxnId(1), ItemId(2), 7, &mut sites), Outcome::Completed);
//! assert_eq!(tm.end(TxnId(1), &mut sites), Outcome::Completed);
//! assert_eq!(sites.get(repldb_types::SiteId(5)).unwrap().value(ItemId(2)), Some(7));
//! ```

mod history;
mod manager;
mod pending;
mod queue;
mod stats;
mod transaction;

pub use history::CommandHistory;
pub use manager::TransactionManager;
pub use pending::PendingCommand;
pub use queue::{QueuedCommand, WaitQueue};
pub use stats::ManagerStats;
pub use transaction::{ReadEntry, Transaction, WriteEntry};
