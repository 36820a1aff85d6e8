//! Core types for the replicated database simulator.
//!
//! This crate provides the foundational types used throughout the
//! concurrency-control implementation:
//!
//! - **Identifiers**: [`TxnId`], [`SiteId`], [`ItemId`], [`Timestamp`]
//! - **Locking**: [`LockMode`]
//! - **Transactions**: [`TransactionKind`], [`TransactionStatus`], [`AbortReason`]
//! - **Placement**: the [`Placement`] policy that maps items to hosting sites
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod placement;
mod transaction;

pub use identifiers::{ItemId, LockMode, SiteId, Timestamp, TxnId, Value};
pub use placement::{ModuloPlacement, Placement, PlacementError, StaticPlacement};
pub use transaction::{AbortReason, TransactionKind, TransactionStatus};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// A placement with `num_sites` sites where every listed item is replicated
    /// everywhere and starts at `10 * item`.
    pub fn fully_replicated(num_sites: u32, items: &[u32]) -> StaticPlacement {
        let sites: Vec<SiteId> = (1..=num_sites).map(SiteId).collect();
        items.iter().fold(StaticPlacement::new(num_sites), |p, &i| {
            p.with_item(ItemId(i), sites.clone(), 10 * i64::from(i))
                .expect("test placement is well formed")
        })
    }
}
