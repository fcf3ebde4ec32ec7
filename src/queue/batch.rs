//! Batching and bisection over an ordered sequence of batches.
//!
//! The head batch is the one in flight. Batches behind it are bisection
//! halves still waiting for their turn, and the last batch collects changes
//! that arrive while a test is running.
//!
//! # Invariants
//!
//! - There is always at least one batch.
//! - At most one test key is outstanding, and only while the head batch is
//!   non-empty and unchanged since the key was minted.
//! - While a key is outstanding there is a separate tail batch, so new
//!   arrivals never join the batch under test.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, info};

use super::error::RestoreError;
use super::outcome::{TestBatch, TestOutcome};
use crate::types::TestKey;

/// Queue that tests changes in batches and bisects failing batches.
#[derive(Debug, Clone)]
pub struct BatchQueue<T> {
    batches: VecDeque<Vec<T>>,
    test_key: Option<TestKey>,
    next_key: u64,
}

impl<T> Default for BatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BatchQueue<T> {
    /// Creates an empty queue holding a single empty batch.
    pub fn new() -> Self {
        BatchQueue {
            batches: VecDeque::from([Vec::new()]),
            test_key: None,
            next_key: 0,
        }
    }

    /// Returns the outstanding test key, if any.
    pub fn test_key(&self) -> Option<TestKey> {
        self.test_key
    }

    /// Returns the counter value the next minted key will use.
    pub fn next_key(&self) -> u64 {
        self.next_key
    }

    /// Returns the head batch (the one tested next, or in flight).
    pub fn head(&self) -> &[T] {
        self.batches.front().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over batches from head to tail.
    pub fn batches(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.batches.iter().map(Vec::as_slice)
    }

    /// Returns the number of batches, including an empty tail.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Iterates over every queued change in test order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.batches.iter().flatten()
    }

    /// Returns the number of queued changes.
    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Returns true if no changes are queued.
    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(Vec::is_empty)
    }

    /// Returns true if `key` is the outstanding test key.
    fn is_outstanding(&self, key: TestKey) -> bool {
        self.test_key == Some(key)
    }
}

impl<T: Clone + PartialEq> BatchQueue<T> {
    /// Rebuilds a queue from saved parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the parts break a queue invariant: no batches,
    /// a key with nothing in flight, a key the counter never produced, or a
    /// change present twice.
    pub fn from_parts(
        batches: Vec<Vec<T>>,
        test_key: Option<TestKey>,
        next_key: u64,
    ) -> Result<Self, RestoreError>
    where
        T: fmt::Debug,
    {
        if batches.is_empty() {
            return Err(RestoreError::NoBatches);
        }

        if let Some(key) = test_key {
            if batches[0].is_empty() {
                return Err(RestoreError::KeyWithoutBatch { key });
            }
            if key.0 >= next_key {
                return Err(RestoreError::KeyNotMinted { key, next_key });
            }
        }

        let flat: Vec<&T> = batches.iter().flatten().collect();
        for (i, change) in flat.iter().enumerate() {
            if flat[..i].contains(change) {
                return Err(RestoreError::DuplicateChange {
                    change: format!("{:?}", change),
                });
            }
        }

        // Only the tail may be empty.
        let last = batches.len() - 1;
        let mut batches: VecDeque<Vec<T>> = batches
            .into_iter()
            .enumerate()
            .filter(|(i, batch)| !batch.is_empty() || *i == last)
            .map(|(_, batch)| batch)
            .collect();
        if test_key.is_some() && batches.len() == 1 {
            batches.push_back(Vec::new());
        }

        Ok(BatchQueue {
            batches,
            test_key,
            next_key,
        })
    }

    /// Returns true if `change` is queued in any batch.
    pub fn contains(&self, change: &T) -> bool {
        self.batches.iter().any(|batch| batch.contains(change))
    }

    /// Appends a change to the tail batch.
    ///
    /// Returns `true` if the change was enqueued, `false` if an equal change
    /// is already queued.
    pub fn add(&mut self, change: T) -> bool {
        if self.contains(&change) {
            return false;
        }

        match self.batches.back_mut() {
            Some(tail) => tail.push(change),
            None => self.batches.push_back(vec![change]),
        }
        true
    }

    /// Returns the batch to test next, minting a key if none is outstanding.
    ///
    /// Returns `None` when the head batch is empty. Calling this again before
    /// the outstanding test is reported returns the same key and changes.
    pub fn next_test(&mut self) -> Option<TestBatch<T>> {
        if self.head().is_empty() {
            return None;
        }

        // Reserve a tail so arrivals during the test stay out of the head.
        if self.batches.len() == 1 {
            self.batches.push_back(Vec::new());
        }

        let key = match self.test_key {
            Some(key) => key,
            None => {
                let key = TestKey(self.next_key);
                self.next_key += 1;
                self.test_key = Some(key);
                debug!(key = %key, size = self.head().len(), "Dispatching batch");
                key
            }
        };

        Some(TestBatch {
            key,
            changes: self.head().to_vec(),
        })
    }

    /// Records a passing test for `key`.
    ///
    /// The whole head batch is classified as passed and removed; the next
    /// batch becomes the new head. Stale or unknown keys are ignored.
    pub fn on_test_success(&mut self, key: TestKey) -> TestOutcome<T> {
        if !self.is_outstanding(key) {
            debug!(key = %key, outstanding = ?self.test_key, "Ignoring stale success report");
            return TestOutcome::default();
        }

        self.test_key = None;
        let passed = self.batches.pop_front().unwrap_or_default();
        if self.batches.is_empty() {
            self.batches.push_back(Vec::new());
        }

        info!(key = %key, passed = passed.len(), "Batch passed");
        TestOutcome::passed(passed)
    }

    /// Records a failing test for `key`.
    ///
    /// A failing singleton is classified as failed and every remaining batch
    /// collapses into one pending batch. A larger batch is split in half and
    /// the first half is tested next; nothing is classified yet. Stale or
    /// unknown keys are ignored.
    pub fn on_test_failure(&mut self, key: TestKey) -> TestOutcome<T> {
        if !self.is_outstanding(key) {
            debug!(key = %key, outstanding = ?self.test_key, "Ignoring stale failure report");
            return TestOutcome::default();
        }

        self.test_key = None;
        let Some(mut batch) = self.batches.pop_front() else {
            self.batches.push_back(Vec::new());
            return TestOutcome::default();
        };

        match batch.len() {
            0 => {
                self.batches.push_front(batch);
                TestOutcome::default()
            }
            1 => {
                let remaining: Vec<T> = self.batches.drain(..).flatten().collect();
                self.batches.push_back(remaining);
                info!(key = %key, "Isolated failing change");
                TestOutcome::failed(batch)
            }
            n => {
                let second = batch.split_off(n / 2);
                debug!(
                    key = %key,
                    first = batch.len(),
                    second = second.len(),
                    "Bisecting failed batch"
                );
                self.batches.push_front(second);
                self.batches.push_front(batch);
                TestOutcome::default()
            }
        }
    }

    /// Removes every change matching `pred`, preserving the order and
    /// grouping of the rest, and returns the removed changes in queue order.
    ///
    /// Batches emptied by the removal are dropped, except the tail. Removing
    /// anything from the head invalidates the outstanding key.
    pub(crate) fn remove_where<F>(&mut self, mut pred: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        let mut head_changed = false;

        for (i, batch) in self.batches.iter_mut().enumerate() {
            let (out, keep): (Vec<T>, Vec<T>) =
                std::mem::take(batch).into_iter().partition(|c| pred(c));
            if i == 0 && !out.is_empty() {
                head_changed = true;
            }
            *batch = keep;
            removed.extend(out);
        }

        if removed.is_empty() {
            return removed;
        }

        let last = self.batches.len() - 1;
        let mut idx = 0;
        self.batches.retain(|batch| {
            let keep = !batch.is_empty() || idx == last;
            idx += 1;
            keep
        });

        if head_changed && self.test_key.take().is_some() {
            debug!("Outstanding test invalidated by removal from head batch");
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batches_of(queue: &BatchQueue<u32>) -> Vec<Vec<u32>> {
        queue.batches().map(<[u32]>::to_vec).collect()
    }

    fn queue_with(batches: Vec<Vec<u32>>, key: Option<u64>) -> BatchQueue<u32> {
        let next_key = key.map_or(0, |k| k + 1);
        BatchQueue::from_parts(batches, key.map(TestKey), next_key).unwrap()
    }

    mod add_tests {
        use super::*;

        #[test]
        fn add_appends_to_single_batch() {
            let mut queue = BatchQueue::new();
            assert!(queue.add(1));
            assert!(queue.add(2));

            assert_eq!(batches_of(&queue), vec![vec![1, 2]]);
        }

        #[test]
        fn add_goes_to_tail_during_test() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            queue.next_test().unwrap();
            queue.add(2);

            assert_eq!(batches_of(&queue), vec![vec![1], vec![2]]);
        }

        #[test]
        fn duplicate_add_is_noop() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            queue.next_test().unwrap();

            assert!(!queue.add(1));
            assert_eq!(batches_of(&queue), vec![vec![1], vec![]]);
        }
    }

    mod next_test_tests {
        use super::*;

        #[test]
        fn empty_queue_has_nothing_to_test() {
            let mut queue: BatchQueue<u32> = BatchQueue::new();
            assert!(queue.next_test().is_none());
            assert!(queue.test_key().is_none());
            assert_eq!(queue.batch_count(), 1);
        }

        #[test]
        fn dispatch_reserves_pending_batch() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            queue.add(2);

            let batch = queue.next_test().unwrap();

            assert_eq!(batch.changes, vec![1, 2]);
            assert_eq!(queue.test_key(), Some(batch.key));
            assert_eq!(batches_of(&queue), vec![vec![1, 2], vec![]]);
        }

        #[test]
        fn repeated_calls_are_idempotent() {
            let mut queue = BatchQueue::new();
            queue.add(1);

            let first = queue.next_test().unwrap();
            queue.add(2);
            let second = queue.next_test().unwrap();

            assert_eq!(first, second);
            assert_eq!(queue.next_key(), 1);
        }

        #[test]
        fn keys_are_unique_across_tests() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            let k1 = queue.next_test().unwrap().key;
            queue.on_test_success(k1);
            queue.add(2);
            let k2 = queue.next_test().unwrap().key;

            assert_ne!(k1, k2);
        }
    }

    mod on_test_success_tests {
        use super::*;

        #[test]
        fn success_drains_head_and_promotes_pending() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            queue.add(2);
            let key = queue.next_test().unwrap().key;
            queue.add(3);

            let outcome = queue.on_test_success(key);

            assert_eq!(outcome.passed, vec![1, 2]);
            assert!(outcome.failed.is_empty());
            assert!(queue.test_key().is_none());
            assert_eq!(batches_of(&queue), vec![vec![3]]);
        }

        #[test]
        fn success_on_last_batch_leaves_empty_queue() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            let key = queue.next_test().unwrap().key;

            queue.on_test_success(key);

            assert!(queue.is_empty());
            assert_eq!(queue.batch_count(), 1);
            assert!(queue.next_test().is_none());
        }

        #[test]
        fn success_with_several_pending_batches_promotes_next() {
            let mut queue = queue_with(vec![vec![1], vec![2, 3], vec![4]], Some(0));

            let outcome = queue.on_test_success(TestKey(0));

            assert_eq!(outcome.passed, vec![1]);
            assert_eq!(batches_of(&queue), vec![vec![2, 3], vec![4]]);
            assert_eq!(queue.next_test().unwrap().changes, vec![2, 3]);
        }

        #[test]
        fn stale_key_is_ignored() {
            let mut queue = BatchQueue::new();
            queue.add(1);
            let old = queue.next_test().unwrap().key;
            queue.on_test_success(old);
            queue.add(2);
            let current = queue.next_test().unwrap().key;

            let before = batches_of(&queue);
            let outcome = queue.on_test_success(old);

            assert!(outcome.is_empty());
            assert_eq!(batches_of(&queue), before);
            assert_eq!(queue.test_key(), Some(current));
        }

        #[test]
        fn report_without_dispatch_is_ignored() {
            let mut queue = BatchQueue::new();
            queue.add(1);

            assert!(queue.on_test_success(TestKey(0)).is_empty());
            assert_eq!(batches_of(&queue), vec![vec![1]]);
        }
    }

    mod on_test_failure_tests {
        use super::*;

        #[test]
        fn failure_bisects_odd_batch_with_smaller_first_half() {
            let mut queue = queue_with(vec![vec![1, 2, 3], vec![4]], Some(0));

            let outcome = queue.on_test_failure(TestKey(0));

            assert!(outcome.is_empty());
            assert!(queue.test_key().is_none());
            assert_eq!(batches_of(&queue), vec![vec![1], vec![2, 3], vec![4]]);
        }

        #[test]
        fn failing_singleton_collapses_remaining_batches() {
            let mut queue = queue_with(vec![vec![1, 2, 3], vec![4]], Some(0));
            queue.on_test_failure(TestKey(0));

            let batch = queue.next_test().unwrap();
            assert_eq!(batch.changes, vec![1]);
            let outcome = queue.on_test_failure(batch.key);

            assert_eq!(outcome.failed, vec![1]);
            assert!(outcome.passed.is_empty());
            assert_eq!(batches_of(&queue), vec![vec![2, 3, 4]]);
        }

        #[test]
        fn first_half_is_tested_next() {
            let mut queue = BatchQueue::new();
            for n in 0..8 {
                queue.add(n);
            }
            let key = queue.next_test().unwrap().key;
            queue.on_test_failure(key);

            assert_eq!(queue.next_test().unwrap().changes, vec![0, 1, 2, 3]);
        }

        #[test]
        fn stale_failure_is_ignored() {
            let mut queue = queue_with(vec![vec![1, 2], vec![]], Some(3));

            let outcome = queue.on_test_failure(TestKey(2));

            assert!(outcome.is_empty());
            assert_eq!(queue.test_key(), Some(TestKey(3)));
            assert_eq!(batches_of(&queue), vec![vec![1, 2], vec![]]);
        }

        #[test]
        fn double_report_is_ignored() {
            let mut queue = queue_with(vec![vec![1], vec![2]], Some(0));

            assert_eq!(queue.on_test_failure(TestKey(0)).failed, vec![1]);
            assert!(queue.on_test_failure(TestKey(0)).is_empty());
            assert_eq!(batches_of(&queue), vec![vec![2]]);
        }
    }

    mod remove_where_tests {
        use super::*;

        #[test]
        fn removes_across_batches_in_order() {
            let mut queue = queue_with(vec![vec![1, 2], vec![3, 4], vec![5]], None);

            let removed = queue.remove_where(|n| n % 2 == 0);

            assert_eq!(removed, vec![2, 4]);
            assert_eq!(batches_of(&queue), vec![vec![1], vec![3], vec![5]]);
        }

        #[test]
        fn emptied_batches_are_dropped_but_tail_kept() {
            let mut queue = queue_with(vec![vec![1], vec![2], vec![3]], None);

            queue.remove_where(|n| *n == 2 || *n == 3);

            assert_eq!(batches_of(&queue), vec![vec![1], vec![]]);
        }

        #[test]
        fn removal_from_head_invalidates_key() {
            let mut queue = queue_with(vec![vec![1, 2], vec![]], Some(0));

            queue.remove_where(|n| *n == 2);

            assert!(queue.test_key().is_none());
            assert!(queue.on_test_success(TestKey(0)).is_empty());
        }

        #[test]
        fn removal_elsewhere_keeps_key() {
            let mut queue = queue_with(vec![vec![1, 2], vec![3]], Some(0));

            queue.remove_where(|n| *n == 3);

            assert_eq!(queue.test_key(), Some(TestKey(0)));
        }
    }

    mod from_parts_tests {
        use super::*;

        #[test]
        fn rejects_no_batches() {
            let result = BatchQueue::<u32>::from_parts(vec![], None, 0);
            assert_eq!(result.unwrap_err(), RestoreError::NoBatches);
        }

        #[test]
        fn rejects_key_without_batch() {
            let result = BatchQueue::<u32>::from_parts(vec![vec![], vec![1]], Some(TestKey(0)), 1);
            assert!(matches!(result, Err(RestoreError::KeyWithoutBatch { .. })));
        }

        #[test]
        fn rejects_unminted_key() {
            let result = BatchQueue::from_parts(vec![vec![1]], Some(TestKey(5)), 5);
            assert!(matches!(result, Err(RestoreError::KeyNotMinted { .. })));
        }

        #[test]
        fn rejects_duplicate_change() {
            let result = BatchQueue::from_parts(vec![vec![1, 2], vec![2]], None, 0);
            assert!(matches!(result, Err(RestoreError::DuplicateChange { .. })));
        }

        #[test]
        fn empty_batches_before_tail_are_dropped() {
            let queue = BatchQueue::from_parts(vec![vec![], vec![1], vec![], vec![]], None, 0).unwrap();
            assert_eq!(batches_of(&queue), vec![vec![1], vec![]]);
        }

        #[test]
        fn single_batch_with_key_gains_pending_tail() {
            let queue = BatchQueue::from_parts(vec![vec![1]], Some(TestKey(0)), 1).unwrap();
            assert_eq!(batches_of(&queue), vec![vec![1], vec![]]);
        }
    }
}
