//! Cycle detection and victim selection.

use crate::{WaitEdge, WaitForGraph};
use repldb_types::{Timestamp, TxnId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// A wait-for cycle found by [`WaitForGraph::detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadlock {
    /// The youngest transaction on the search path. The caller aborts it.
    pub victim: TxnId,

    /// Every transaction on the search path when the cycle closed, victim first.
    pub participants: Vec<TxnId>,

    /// Edges between participants, in insertion order.
    pub edges: Vec<WaitEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Pick the transaction with the latest start time.
///
/// A transaction without a known start time counts as [`Timestamp::ZERO`].
/// On a tie the earlier entry in `candidates` wins.
pub fn select_victim(
    candidates: &[TxnId],
    start_time: impl Fn(TxnId) -> Option<Timestamp>,
) -> Option<TxnId> {
    let mut best: Option<(TxnId, Timestamp)> = None;
    for &txn in candidates {
        let start = start_time(txn).unwrap_or(Timestamp::ZERO);
        match best {
            Some((_, latest)) if start <= latest => {}
            _ => best = Some((txn, start)),
        }
    }
    best.map(|(txn, _)| txn)
}

impl WaitForGraph {
    /// Search the graph for a cycle.
    ///
    /// Depth-first with three-state marking, driven by an explicit stack so
    /// long wait chains cannot overflow the call stack. Roots are tried in
    /// order of first appearance and children in edge insertion order, so
    /// the result is deterministic. Returns the first cycle found.
    pub fn detect(&self, start_time: impl Fn(TxnId) -> Option<Timestamp>) -> Option<Deadlock> {
        let nodes = self.nodes();
        let slot: HashMap<TxnId, usize> = nodes.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for edge in self.edges() {
            if let (Some(&from), Some(&to)) = (slot.get(&edge.waiter), slot.get(&edge.blocker)) {
                adjacency[from].push(to);
            }
        }

        let mut marks = vec![Mark::Unvisited; nodes.len()];
        // (node, index of the next child to explore)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                let Some(&child) = adjacency[node].get(next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                match marks[child] {
                    Mark::Unvisited => {
                        trace!(from = %nodes[node], to = %nodes[child], "Descending");
                        marks[child] = Mark::InProgress;
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        let path: Vec<TxnId> = stack.iter().map(|(n, _)| nodes[*n]).collect();
                        return self.report(path, &start_time);
                    }
                    Mark::Done => {}
                }
            }
        }

        None
    }

    fn report(
        &self,
        path: Vec<TxnId>,
        start_time: &impl Fn(TxnId) -> Option<Timestamp>,
    ) -> Option<Deadlock> {
        let victim = select_victim(&path, start_time)?;

        let mut participants = Vec::with_capacity(path.len());
        participants.push(victim);
        participants.extend(path.iter().copied().filter(|t| *t != victim));

        let edges = self
            .edges()
            .iter()
            .filter(|e| path.contains(&e.waiter) && path.contains(&e.blocker))
            .copied()
            .collect();

        debug!(
            victim = %victim,
            participants = participants.len(),
            "Wait-for cycle detected"
        );

        Some(Deadlock {
            victim,
            participants,
            edges,
        })
    }
}
