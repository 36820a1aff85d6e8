//! Basic simulation tests.
//!
//! Runs the demo scripts and seeded workloads end to end and checks the
//! final report.

use repldb_core::Trace;
use repldb_simulation::SimulationConfig;
use repldb_simulator::{RunReport, Simulator, WorkloadConfig};
use repldb_types::{AbortReason, ItemId, SiteId, TxnId};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

fn run_script(source: &str) -> (Simulator, RunReport, Vec<Trace>) {
    let mut simulator = Simulator::new(SimulationConfig::default());
    let mut traces = Vec::new();
    let report = simulator
        .run_script(source, |_, t| traces.extend_from_slice(t))
        .expect("demo script runs");
    (simulator, report, traces)
}

fn run_workload(workload: WorkloadConfig) -> (RunReport, Vec<String>) {
    let mut simulator = Simulator::new(SimulationConfig::default());
    let mut lines = Vec::new();
    let report = simulator
        .run_workload(workload, |command, traces| {
            lines.push(command.to_string());
            lines.extend(traces.iter().map(Trace::to_string));
        })
        .expect("generated commands only name known sites");
    (report, lines)
}

// ═══════════════════════════════════════════════════════════════════════════
// Demo scripts
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_queued_read_demo() {
    let (_, report, traces) = run_script(include_str!("../../../demos/queued_read.txt"));

    assert_eq!(report.commands, 7);
    assert_eq!(report.stats.committed, 2);
    assert!(report.is_drained());
    assert!(traces.contains(&Trace::ReadValue {
        txn: TxnId(2),
        item: ItemId(1),
        site: SiteId(2),
        value: 5,
    }));
}

#[test]
fn test_deadlock_demo() {
    init_tracing();

    let (simulator, report, traces) = run_script(include_str!("../../../demos/deadlock.txt"));

    assert_eq!(report.stats.deadlocks, 1);
    assert_eq!(report.stats.committed, 1);
    assert_eq!(report.stats.aborts_for(AbortReason::Deadlock), 1);
    assert!(traces.contains(&Trace::Aborted {
        txn: TxnId(2),
        reason: AbortReason::Deadlock,
    }));
    assert!(report.is_drained());
    assert!(report.is_consistent());

    let sites = simulator.simulation().sites();
    assert_eq!(sites.get(SiteId(2)).unwrap().value(ItemId(1)), Some(101));
    for site in sites.iter() {
        assert_eq!(site.value(ItemId(2)), Some(102));
    }
}

#[test]
fn test_site_failure_demo() {
    let (_, report, traces) = run_script(include_str!("../../../demos/site_failure.txt"));

    assert_eq!(report.stats.site_failures, 1);
    assert_eq!(report.stats.site_recoveries, 1);
    assert_eq!(report.stats.committed, 0);
    assert!(traces.contains(&Trace::Aborted {
        txn: TxnId(1),
        reason: AbortReason::SiteFailure { site: SiteId(2) },
    }));
    assert!(matches!(traces.last(), Some(Trace::SiteDump(dump)) if dump.site == SiteId(2)));
}

#[test]
fn test_read_only_demo() {
    let (_, report, traces) = run_script(include_str!("../../../demos/read_only.txt"));

    let snapshot_reads = traces
        .iter()
        .filter(|t| {
            **t == Trace::ReadValue {
                txn: TxnId(2),
                item: ItemId(4),
                site: SiteId(1),
                value: 40,
            }
        })
        .count();
    assert_eq!(snapshot_reads, 2);
    assert_eq!(report.stats.read_only_ended, 1);
    assert!(report.is_drained());
}

#[test]
fn test_bad_script_halts_after_earlier_commands() {
    let mut simulator = Simulator::new(SimulationConfig::default());

    let result = simulator.run_script("begin(T1)\nW(T1,x2,9)\nexplode()\nend(T1)\n", |_, _| {});

    assert!(result.is_err());
    let manager = simulator.simulation().manager();
    assert!(manager.is_active(TxnId(1)));
    assert_eq!(simulator.report().commands, 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// Generated workloads
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_failure_free_workload_accounts_for_every_transaction() {
    init_tracing();

    let (report, _) = run_workload(
        WorkloadConfig::default()
            .with_transactions(100)
            .with_concurrency(5)
            .without_failures(),
    );

    println!("{report}");
    assert!(report.is_consistent());

    // A queued retry skips conflict scanning, so a stalled pair can stay open.
    let stats = &report.stats;
    assert_eq!(
        stats.committed + stats.read_only_ended + stats.total_aborts() + report.active as u64,
        stats.begun + stats.read_only_begun
    );
    assert_eq!(stats.begun + stats.read_only_begun, 100);
    assert_eq!(report.stats.site_failures, 0);
}

#[test]
fn test_workload_with_failures_stays_consistent() {
    let (report, _) = run_workload(
        WorkloadConfig::default()
            .with_transactions(150)
            .with_concurrency(6)
            .with_failure_ratio(0.1)
            .with_seed(2024),
    );

    assert!(report.stats.site_failures > 0);
    assert!(report.is_consistent());
}

#[test]
fn test_same_seed_same_run() {
    let workload = WorkloadConfig::default()
        .with_transactions(80)
        .with_failure_ratio(0.05)
        .with_seed(99);

    let (report1, lines1) = run_workload(workload.clone());
    let (report2, lines2) = run_workload(workload);

    assert_eq!(report1, report2);
    assert_eq!(lines1, lines2);
}
