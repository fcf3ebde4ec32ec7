//! Shared test utilities and arbitrary generators for property-based testing.

use crate::queue::{BatchQueue, DependencyQueue, TestOutcome};
use crate::types::{Change, ChangeId, ChangeRecord, TestKey};
use proptest::prelude::*;

/// Upper bound on test cycles before a simulation is declared stuck.
const MAX_CYCLES: usize = 10_000;

/// What happened while draining a queue against an oracle.
#[derive(Debug, Clone)]
pub struct Simulation<C> {
    pub passed: Vec<C>,
    pub failed: Vec<C>,
    pub successes: usize,
    pub failures: usize,
}

impl<C> Simulation<C> {
    fn new() -> Self {
        Simulation {
            passed: Vec::new(),
            failed: Vec::new(),
            successes: 0,
            failures: 0,
        }
    }

    fn record(&mut self, outcome: TestOutcome<C>) {
        self.passed.extend(outcome.passed);
        self.failed.extend(outcome.failed);
    }
}

/// Tests batches until nothing is left to test. A batch fails if any of its
/// changes is bad.
pub fn drain_batch_queue<T, F>(queue: &mut BatchQueue<T>, is_bad: F) -> Simulation<T>
where
    T: Clone + PartialEq,
    F: Fn(&T) -> bool,
{
    let mut sim = Simulation::new();
    while let Some(batch) = queue.next_test() {
        assert!(sim.successes + sim.failures < MAX_CYCLES, "simulation did not converge");
        if batch.changes.iter().any(&is_bad) {
            sim.failures += 1;
            sim.record(queue.on_test_failure(batch.key));
        } else {
            sim.successes += 1;
            sim.record(queue.on_test_success(batch.key));
        }
    }
    sim
}

/// Dependency-aware counterpart of [`drain_batch_queue`].
pub fn drain_dependency_queue<C, F>(queue: &mut DependencyQueue<C>, is_bad: F) -> Simulation<C>
where
    C: Change,
    F: Fn(&C) -> bool,
{
    let mut sim = Simulation::new();
    while let Some(batch) = queue.next_test() {
        assert!(sim.successes + sim.failures < MAX_CYCLES, "simulation did not converge");
        if batch.changes.iter().any(&is_bad) {
            sim.failures += 1;
            sim.record(queue.on_test_failure(batch.key));
        } else {
            sim.successes += 1;
            sim.record(queue.on_test_success(batch.key));
        }
    }
    sim
}

/// `ceil(log2(n))` for `n >= 1`.
pub fn ceil_log2(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

pub fn arb_test_key() -> impl Strategy<Value = TestKey> {
    any::<u64>().prop_map(TestKey)
}

pub fn arb_change_id() -> impl Strategy<Value = ChangeId> {
    "[a-z][a-z0-9-]{0,12}".prop_map(ChangeId::new)
}

/// A pool of `c0..cN` changes, each requiring a random subset of the pool
/// (which may include itself, so cycles do occur) plus, sometimes, an
/// identity that is never supplied.
pub fn arb_change_pool(max: usize) -> impl Strategy<Value = Vec<ChangeRecord>> {
    (1..=max).prop_flat_map(|n| {
        prop::collection::vec(
            (
                prop::collection::vec(0..n, 0..3),
                prop::bool::weighted(0.1),
            ),
            n,
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (requires, dangling))| {
                    let mut change = ChangeRecord::new(format!("c{}", i));
                    for r in requires {
                        change = change.requiring(format!("c{}", r));
                    }
                    if dangling {
                        change = change.requiring("never-supplied");
                    }
                    change
                })
                .collect()
        })
    })
}

/// Like [`arb_change_pool`] but each change only requires earlier ones, so
/// the requirement graph is acyclic and fully satisfiable.
pub fn arb_acyclic_pool(max: usize) -> impl Strategy<Value = Vec<ChangeRecord>> {
    (1..=max).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..3), n)
            .prop_map(|specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let mut change = ChangeRecord::new(format!("c{}", i));
                        if i > 0 {
                            for pick in picks {
                                change = change.requiring(format!("c{}", pick.index(i)));
                            }
                        }
                        change
                    })
                    .collect()
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_log2_matches_definition() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(100), 7);
        assert_eq!(ceil_log2(128), 7);
        assert_eq!(ceil_log2(129), 8);
    }
}
