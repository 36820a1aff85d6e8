//! Result of a single transaction-manager call.

use repldb_types::{AbortReason, TxnId};

/// What a `read`, `write` or `end` call achieved.
///
/// None of these is an error: lock conflicts, deadlocks and unavailable
/// sites are all resolved inside the engine by queueing or aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation took effect.
    Completed,

    /// The command was queued (or the end deferred) until a later replay.
    Waiting,

    /// A wait-for cycle was found and `victim` aborted. The triggering call
    /// had no effect and was not queued.
    Deadlock { victim: TxnId },

    /// The calling transaction was aborted.
    Aborted(AbortReason),

    /// A read-only transaction asked for an item outside its snapshot.
    Unreadable,

    /// The transaction is unknown or already terminated, or the request
    /// does not apply to it.
    Ignored,
}

impl Outcome {
    /// Whether the caller should consider the request accepted.
    ///
    /// Queued work counts as accepted; it completes on a later replay.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Completed | Outcome::Waiting)
    }
}
