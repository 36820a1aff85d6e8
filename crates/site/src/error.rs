//! Error type for site operations.

use repldb_types::{ItemId, SiteId, TxnId};

/// Errors raised by a [`Site`](crate::Site) or the [`SiteRegistry`](crate::SiteRegistry).
///
/// Lock conflicts are not errors; grants report them as `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiteError {
    /// No site has this id.
    #[error("unknown site {0}")]
    UnknownSite(SiteId),

    /// The site does not host a copy of the item.
    #[error("site {site} does not host {item}")]
    ItemNotHosted { site: SiteId, item: ItemId },

    /// A commit was attempted without the writer holding the write lock.
    #[error("{txn} holds no write lock on {item} at site {site}")]
    LockNotHeld {
        site: SiteId,
        item: ItemId,
        txn: TxnId,
    },
}
