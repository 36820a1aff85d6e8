//! Seeded workload generation.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use repldb_core::Command;
use repldb_simulation::SimulationConfig;
use repldb_types::{ItemId, SiteId, TxnId, Value};
use tracing::debug;

/// Shape of a generated workload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Total transactions to begin.
    pub transactions: usize,

    /// Upper bound on reads and writes per transaction.
    pub max_ops_per_txn: u32,

    /// Transactions open at the same time.
    pub concurrency: usize,

    /// Probability that an operation of a regular transaction is a read.
    pub read_ratio: f64,

    /// Probability that a new transaction is read-only.
    pub read_only_ratio: f64,

    /// Probability, per generated command, of a site failure or recovery.
    pub failure_ratio: f64,

    /// Seed for the generator's RNG.
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            transactions: 50,
            max_ops_per_txn: 4,
            concurrency: 4,
            read_ratio: 0.5,
            read_only_ratio: 0.1,
            failure_ratio: 0.02,
            seed: 42,
        }
    }
}

impl WorkloadConfig {
    pub fn with_transactions(mut self, transactions: usize) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_max_ops_per_txn(mut self, max_ops: u32) -> Self {
        self.max_ops_per_txn = max_ops.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the read ratio (0.0 to 1.0).
    pub fn with_read_ratio(mut self, ratio: f64) -> Self {
        self.read_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the read-only transaction ratio (0.0 to 1.0).
    pub fn with_read_only_ratio(mut self, ratio: f64) -> Self {
        self.read_only_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the failure ratio (0.0 to 0.9). Zero disables failures.
    pub fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio.clamp(0.0, 0.9);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Disable site failures.
    pub fn without_failures(self) -> Self {
        self.with_failure_ratio(0.0)
    }
}

/// A transaction the generator has begun and not yet ended.
#[derive(Debug, Clone, Copy)]
struct OpenTxn {
    id: TxnId,
    read_only: bool,
    remaining: u32,
}

/// Emits a deterministic command stream from a [`WorkloadConfig`].
///
/// The generator keeps up to `concurrency` transactions open, interleaves
/// their operations at random, and ends each one after a random number of
/// operations. Failed sites are recovered before the stream ends, and every
/// transaction it began is ended.
pub struct WorkloadGenerator {
    config: WorkloadConfig,
    num_sites: u32,
    num_items: u32,
    rng: ChaCha8Rng,
    open: Vec<OpenTxn>,
    next_txn: u64,
    begun: usize,
    failed: Vec<SiteId>,
}

impl WorkloadGenerator {
    /// A generator for a database laid out by `simulation`.
    pub fn new(config: WorkloadConfig, simulation: &SimulationConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            num_sites: simulation.num_sites.max(1),
            num_items: simulation.num_items.max(1),
            rng,
            open: Vec::new(),
            next_txn: 1,
            begun: 0,
            failed: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Generate the whole stream.
    pub fn generate(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Some(command) = self.next_command() {
            commands.push(command);
        }
        debug!(
            commands = commands.len(),
            transactions = self.begun,
            seed = self.config.seed,
            "Workload generated"
        );
        commands
    }

    /// The next command, or `None` once every transaction has ended and
    /// every failed site is back.
    pub fn next_command(&mut self) -> Option<Command> {
        let exhausted = self.begun >= self.config.transactions;
        if exhausted && self.open.is_empty() {
            return self.failed.pop().map(|site| Command::Recover { site });
        }

        if self.config.failure_ratio > 0.0 && self.rng.gen_bool(self.config.failure_ratio) {
            return Some(self.site_event());
        }

        let room = self.open.len() < self.config.concurrency.max(1);
        if !exhausted && room && (self.open.is_empty() || self.rng.gen_bool(0.5)) {
            return Some(self.begin());
        }
        self.step()
    }

    fn begin(&mut self) -> Command {
        let id = TxnId(self.next_txn);
        self.next_txn += 1;
        self.begun += 1;

        let read_only =
            self.config.read_only_ratio > 0.0 && self.rng.gen_bool(self.config.read_only_ratio);
        let remaining = self.rng.gen_range(1..=self.config.max_ops_per_txn.max(1));
        self.open.push(OpenTxn {
            id,
            read_only,
            remaining,
        });

        if read_only {
            Command::BeginReadOnly { txn: id }
        } else {
            Command::Begin { txn: id }
        }
    }

    /// One operation, or the end, of a random open transaction.
    fn step(&mut self) -> Option<Command> {
        if self.open.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.open.len());
        let txn = self.open[index];

        if txn.remaining == 0 {
            self.open.swap_remove(index);
            return Some(Command::End { txn: txn.id });
        }
        self.open[index].remaining -= 1;

        let item = self.random_item();
        if txn.read_only || self.rng.gen_bool(self.config.read_ratio) {
            Some(Command::Read { txn: txn.id, item })
        } else {
            let value: Value = self.rng.gen_range(0..1000);
            Some(Command::Write {
                txn: txn.id,
                item,
                value,
            })
        }
    }

    /// Recover a failed site or fail a running one, at random.
    fn site_event(&mut self) -> Command {
        let all_down = self.failed.len() as u32 >= self.num_sites;
        if !self.failed.is_empty() && (all_down || self.rng.gen_bool(0.5)) {
            let index = self.rng.gen_range(0..self.failed.len());
            let site = self.failed.swap_remove(index);
            return Command::Recover { site };
        }

        let running: Vec<SiteId> = (1..=self.num_sites)
            .map(SiteId)
            .filter(|s| !self.failed.contains(s))
            .collect();
        let site = running[self.rng.gen_range(0..running.len())];
        self.failed.push(site);
        Command::Fail { site }
    }

    fn random_item(&mut self) -> ItemId {
        ItemId(self.rng.gen_range(1..=self.num_items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tracing_test::traced_test;

    fn generate(config: WorkloadConfig) -> Vec<Command> {
        WorkloadGenerator::new(config, &SimulationConfig::default()).generate()
    }

    #[traced_test]
    #[test]
    fn test_same_seed_same_stream() {
        let config = WorkloadConfig::default().with_seed(7);

        assert_eq!(generate(config.clone()), generate(config));
        assert!(logs_contain("Workload generated"));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate(WorkloadConfig::default().with_seed(1));
        let b = generate(WorkloadConfig::default().with_seed(2));

        assert_ne!(a, b);
    }

    #[test]
    fn test_every_transaction_is_begun_and_ended() {
        let commands = generate(WorkloadConfig::default().with_transactions(30));

        let begun: Vec<TxnId> = commands
            .iter()
            .filter(|c| matches!(c, Command::Begin { .. } | Command::BeginReadOnly { .. }))
            .filter_map(Command::txn)
            .collect();
        let ended: BTreeSet<TxnId> = commands
            .iter()
            .filter(|c| matches!(c, Command::End { .. }))
            .filter_map(Command::txn)
            .collect();

        assert_eq!(begun.len(), 30);
        assert_eq!(ended.len(), 30);
        assert_eq!(begun.into_iter().collect::<BTreeSet<_>>(), ended);
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let commands = generate(
            WorkloadConfig::default()
                .with_transactions(40)
                .with_concurrency(3),
        );

        let mut open = 0usize;
        for command in &commands {
            match command {
                Command::Begin { .. } | Command::BeginReadOnly { .. } => open += 1,
                Command::End { .. } => open -= 1,
                _ => {}
            }
            assert!(open <= 3);
        }
        assert_eq!(open, 0);
    }

    #[test]
    fn test_operations_stay_in_range() {
        let sim = SimulationConfig::default().with_sites(4).with_items(6);
        let commands = WorkloadGenerator::new(
            WorkloadConfig::default().with_failure_ratio(0.2),
            &sim,
        )
        .generate();

        for command in &commands {
            match command {
                Command::Read { item, .. } | Command::Write { item, .. } => {
                    assert!((1..=6).contains(&item.0));
                }
                Command::Fail { site } | Command::Recover { site } => {
                    assert!((1..=4).contains(&site.0));
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_failed_sites_are_recovered_by_the_end() {
        let commands = generate(WorkloadConfig::default().with_failure_ratio(0.3));

        let mut down = BTreeSet::new();
        for command in &commands {
            match command {
                Command::Fail { site } => assert!(down.insert(*site)),
                Command::Recover { site } => assert!(down.remove(site)),
                _ => {}
            }
        }
        assert!(down.is_empty());
        assert!(commands.iter().any(|c| matches!(c, Command::Fail { .. })));
    }

    #[test]
    fn test_read_only_transactions_never_write() {
        let commands = generate(
            WorkloadConfig::default()
                .with_read_only_ratio(1.0)
                .without_failures(),
        );

        assert!(!commands
            .iter()
            .any(|c| matches!(c, Command::Write { .. } | Command::Begin { .. })));
    }

    #[test]
    fn test_empty_workload() {
        let commands = generate(WorkloadConfig::default().with_transactions(0));

        assert!(commands.is_empty());
    }
}
