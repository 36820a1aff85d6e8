//! Sites of the replicated database.
//!
//! A site owns one [`Data`] record per item it hosts and a [`LockTable`]
//! over those items. It is the sole mutator of both: the transaction
//! manager only ever asks a site to grant, release or commit, and the site
//! decides.
//!
//! # Components
//!
//! - [`Data`] - one copy of one item: committed value plus per-writer tentative values
//! - [`LockTable`] - per-item lock entries in grant order
//! - [`Site`] - running/failed status, availability markers, commit application
//! - [`SiteRegistry`] - every site of a simulation, built from a [`Placement`](repldb_types::Placement)

mod data;
mod error;
mod lock_table;
mod registry;
mod site;

pub use data::Data;
pub use error::SiteError;
pub use lock_table::{LockEntry, LockTable};
pub use registry::SiteRegistry;
pub use site::{Site, SiteStatus};
