//! Deadlock detection through the full engine.
//!
//! Each test builds a wait-for cycle out of real lock conflicts and checks
//! that exactly the youngest transaction on the cycle is aborted and that
//! the survivors make progress.

use repldb_core::{Outcome, Trace};
use repldb_simulation::{Simulation, SimulationConfig};
use repldb_types::test_utils::fully_replicated;
use repldb_types::{AbortReason, ItemId, SiteId, TxnId};
use std::sync::Arc;
use tracing_test::traced_test;

fn deadlocks(traces: &[Trace]) -> Vec<&Trace> {
    traces
        .iter()
        .filter(|t| matches!(t, Trace::DeadlockDetected { .. }))
        .collect()
}

#[traced_test]
#[test]
fn test_two_transaction_deadlock() {
    let mut sim = Simulation::new(SimulationConfig::default());
    sim.begin(TxnId(1));
    sim.begin(TxnId(2));
    assert_eq!(sim.write(TxnId(1), ItemId(1), 10), Outcome::Completed);
    assert_eq!(sim.write(TxnId(2), ItemId(2), 20), Outcome::Completed);
    assert_eq!(sim.write(TxnId(1), ItemId(2), 10), Outcome::Waiting);
    sim.take_traces();

    let outcome = sim.write(TxnId(2), ItemId(1), 20);

    assert_eq!(outcome, Outcome::Deadlock { victim: TxnId(2) });
    let traces = sim.take_traces();
    assert_eq!(
        traces[0],
        Trace::DeadlockDetected {
            victim: TxnId(2),
            participants: vec![TxnId(2), TxnId(1)],
            edges: vec![(TxnId(1), TxnId(2)), (TxnId(2), TxnId(1))],
        }
    );
    assert_eq!(
        traces[1],
        Trace::Aborted {
            txn: TxnId(2),
            reason: AbortReason::Deadlock
        }
    );

    assert_eq!(sim.end(TxnId(1)), Outcome::Completed);
    assert_eq!(sim.sites().get(SiteId(2)).unwrap().value(ItemId(1)), Some(10));
    assert_eq!(sim.sites().get(SiteId(5)).unwrap().value(ItemId(2)), Some(10));
    assert_eq!(sim.stats().deadlocks, 1);
}

#[test]
fn test_three_cycle_aborts_latest_start() {
    let mut sim = Simulation::with_placement(Arc::new(fully_replicated(3, &[1, 2, 3])));
    let mut traces = Vec::new();
    sim.run_script(
        "begin(T1)
         begin(T2)
         begin(T3)
         W(T1,x1,1)
         W(T2,x2,2)
         W(T3,x3,3)
         R(T1,x2)
         R(T2,x3)
         R(T3,x1)",
        |_, t| traces.extend_from_slice(t),
    )
    .unwrap();

    let found = deadlocks(&traces);
    assert_eq!(found.len(), 1);
    let Trace::DeadlockDetected {
        victim,
        participants,
        edges,
    } = found[0]
    else {
        unreachable!()
    };
    assert_eq!(*victim, TxnId(3));
    assert_eq!(participants, &vec![TxnId(3), TxnId(1), TxnId(2)]);
    assert_eq!(edges.len(), 3);

    assert!(!sim.manager().is_active(TxnId(3)));
    assert!(sim.manager().is_active(TxnId(1)));
    assert!(sim.manager().is_active(TxnId(2)));
    // T2's read of x3 was unblocked by the abort.
    assert!(traces.contains(&Trace::ReadValue {
        txn: TxnId(2),
        item: ItemId(3),
        site: SiteId(1),
        value: 30,
    }));
}

#[test]
fn test_triggering_call_has_no_effect_when_peer_is_victim() {
    let mut sim = Simulation::new(SimulationConfig::default());
    sim.begin(TxnId(1));
    sim.begin(TxnId(2));
    sim.write(TxnId(1), ItemId(1), 1);
    sim.write(TxnId(2), ItemId(3), 2);
    assert_eq!(sim.write(TxnId(2), ItemId(1), 2), Outcome::Waiting);

    // T1 closes the cycle but T2 is younger.
    let outcome = sim.write(TxnId(1), ItemId(3), 1);

    assert_eq!(outcome, Outcome::Deadlock { victim: TxnId(2) });
    let t1 = sim.manager().transaction(TxnId(1)).unwrap();
    assert!(t1.write_set().get(&ItemId(3)).is_none());
    assert_eq!(sim.queue_len(), 0);

    // Re-issuing the write now succeeds.
    assert_eq!(sim.write(TxnId(1), ItemId(3), 1), Outcome::Completed);
}

#[test]
fn test_caller_can_be_the_victim() {
    let mut sim = Simulation::new(SimulationConfig::default());
    sim.begin(TxnId(1));
    sim.begin(TxnId(2));
    sim.write(TxnId(1), ItemId(1), 1);
    sim.write(TxnId(2), ItemId(3), 2);
    assert_eq!(sim.write(TxnId(1), ItemId(3), 1), Outcome::Waiting);

    let outcome = sim.read(TxnId(2), ItemId(1));

    assert_eq!(outcome, Outcome::Deadlock { victim: TxnId(2) });
    assert!(!sim.manager().is_active(TxnId(2)));
    // The abort's replay granted T1's queued write.
    assert_eq!(
        sim.manager()
            .transaction(TxnId(1))
            .unwrap()
            .pending_write(ItemId(3)),
        Some((1, SiteId(4)))
    );
    assert_eq!(sim.end(TxnId(2)), Outcome::Ignored);
}

#[test]
fn test_long_ring_breaks_at_youngest() {
    const N: u32 = 50;
    let items: Vec<u32> = (1..=N).collect();
    let mut sim = Simulation::with_placement(Arc::new(fully_replicated(1, &items)));

    for i in 1..=N {
        let txn = TxnId(u64::from(i));
        sim.begin(txn);
        assert_eq!(sim.write(txn, ItemId(i), 0), Outcome::Completed);
    }
    for i in 1..N {
        let outcome = sim.write(TxnId(u64::from(i)), ItemId(i + 1), 1);
        assert_eq!(outcome, Outcome::Waiting, "T{i}");
    }

    let outcome = sim.write(TxnId(u64::from(N)), ItemId(1), 1);

    assert_eq!(
        outcome,
        Outcome::Deadlock {
            victim: TxnId(u64::from(N))
        }
    );
    assert_eq!(sim.stats().deadlocks, 1);
    assert_eq!(sim.manager().active_count(), (N - 1) as usize);
    // Only T49 was waiting on the victim.
    assert_eq!(sim.queue_len(), (N - 2) as usize);
}

#[test]
fn test_read_only_transactions_never_wait() {
    let mut sim = Simulation::new(SimulationConfig::default());
    sim.begin(TxnId(1));
    sim.write(TxnId(1), ItemId(2), 5);
    sim.begin_read_only(TxnId(2));

    assert_eq!(sim.read(TxnId(2), ItemId(2)), Outcome::Completed);
    assert!(sim.manager().graph().is_empty());
}
