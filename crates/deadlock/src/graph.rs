//! The wait-for graph.

use repldb_types::TxnId;
use std::collections::HashSet;
use std::fmt;

/// `waiter` cannot proceed until `blocker` finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitEdge {
    pub waiter: TxnId,
    pub blocker: TxnId,
}

impl WaitEdge {
    pub fn new(waiter: TxnId, blocker: TxnId) -> Self {
        Self { waiter, blocker }
    }

    /// Whether `txn` is either endpoint.
    pub fn touches(&self, txn: TxnId) -> bool {
        self.waiter == txn || self.blocker == txn
    }
}

impl fmt::Display for WaitEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {}", self.waiter, self.blocker)
    }
}

/// Accumulated wait-for edges.
///
/// Edges are kept in insertion order, which fixes the order nodes are
/// visited during detection. A hash index makes duplicate checks O(1).
/// Edges are only removed by pruning every edge incident to a transaction.
#[derive(Debug, Clone, Default)]
pub struct WaitForGraph {
    edges: Vec<WaitEdge>,
    index: HashSet<WaitEdge>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `waiter → blocker`. Returns `false` if the edge already existed.
    ///
    /// Self edges are never recorded.
    pub fn add_edge(&mut self, waiter: TxnId, blocker: TxnId) -> bool {
        if waiter == blocker {
            return false;
        }
        let edge = WaitEdge::new(waiter, blocker);
        if !self.index.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn contains_edge(&self, waiter: TxnId, blocker: TxnId) -> bool {
        self.index.contains(&WaitEdge::new(waiter, blocker))
    }

    /// Remove every edge with `txn` at either end. Returns how many went.
    pub fn remove_transaction(&mut self, txn: TxnId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(txn));
        self.index.retain(|e| !e.touches(txn));
        before - self.edges.len()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[WaitEdge] {
        &self.edges
    }

    /// Nodes in order of first appearance across the edge list.
    pub fn nodes(&self) -> Vec<TxnId> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for edge in &self.edges {
            for txn in [edge.waiter, edge.blocker] {
                if seen.insert(txn) {
                    nodes.push(txn);
                }
            }
        }
        nodes
    }

    /// Transactions `txn` waits for, in insertion order.
    pub fn blockers_of(&self, txn: TxnId) -> impl Iterator<Item = TxnId> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.waiter == txn)
            .map(|e| e.blocker)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
