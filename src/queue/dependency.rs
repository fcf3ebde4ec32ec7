//! Dependency-aware queue built on [`BatchQueue`].
//!
//! Changes whose requirements are not yet queued wait in an owned side
//! buffer and are admitted as soon as everything they require is queued.
//! A change that fails takes every change transitively requiring it down
//! with it, and a change that (transitively) requires itself is rejected.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::batch::BatchQueue;
use super::error::RestoreError;
use super::outcome::{Admission, TestBatch, TestOutcome};
use crate::state::{build_dependants_index, collect_dependants};
use crate::types::{Change, TestKey};

/// A change waiting for requirements that are not queued yet.
#[derive(Debug, Clone)]
pub struct AwaitingEntry<C: Change> {
    change: C,
    missing: HashSet<C::Id>,
}

impl<C: Change> AwaitingEntry<C> {
    /// The waiting change.
    pub fn change(&self) -> &C {
        &self.change
    }

    /// Required identities not yet visible in the batch queue.
    pub fn missing(&self) -> &HashSet<C::Id> {
        &self.missing
    }
}

/// Bisecting queue that honours declared requirements between changes.
#[derive(Debug, Clone)]
pub struct DependencyQueue<C: Change> {
    queue: BatchQueue<C>,
    awaiting: Vec<AwaitingEntry<C>>,
}

impl<C: Change> Default for DependencyQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Change> DependencyQueue<C> {
    pub fn new() -> Self {
        DependencyQueue {
            queue: BatchQueue::new(),
            awaiting: Vec::new(),
        }
    }

    /// Rebuilds a queue from a restored batch queue and the changes that
    /// were waiting.
    ///
    /// Missing requirements are recomputed; any waiting change whose
    /// requirements are all queued is admitted immediately.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::DuplicateChange`] if an identity appears more
    /// than once across the batches and the waiting changes.
    pub fn from_parts(queue: BatchQueue<C>, awaiting: Vec<C>) -> Result<Self, RestoreError> {
        let mut seen = HashSet::new();
        for change in queue.iter().chain(awaiting.iter()) {
            let id = change.id();
            if !seen.insert(id.clone()) {
                return Err(RestoreError::DuplicateChange {
                    change: format!("{:?}", id),
                });
            }
        }

        let mut restored = DependencyQueue {
            queue,
            awaiting: Vec::new(),
        };
        let added = restored.settle(awaiting);
        if !added.is_empty() {
            debug!(count = added.len(), "Admitted waiting changes on restore");
        }
        Ok(restored)
    }

    /// The underlying batch queue.
    pub fn batches(&self) -> &BatchQueue<C> {
        &self.queue
    }

    /// Changes waiting for requirements, in arrival order.
    pub fn awaiting(&self) -> &[AwaitingEntry<C>] {
        &self.awaiting
    }

    /// Returns the outstanding test key, if any.
    pub fn test_key(&self) -> Option<TestKey> {
        self.queue.test_key()
    }

    /// Returns true if a change with this identity is queued or waiting.
    pub fn contains_id(&self, id: &C::Id) -> bool {
        self.pool().any(|c| &c.id() == id)
    }

    /// Every live change: queued changes in test order, then waiting ones.
    fn pool(&self) -> impl Iterator<Item = &C> + '_ {
        self.queue
            .iter()
            .chain(self.awaiting.iter().map(|entry| &entry.change))
    }

    /// Adds a change, admitting it (and anything it unblocks) when its
    /// requirements are queued, or parking it until they are.
    ///
    /// A change whose identity is already live is ignored. A change on a
    /// requirement cycle is rejected together with every queued or waiting
    /// change in its dependant closure.
    pub fn add(&mut self, change: C) -> Admission<C> {
        let id = change.id();
        if self.contains_id(&id) {
            debug!(change = ?id, "Ignoring change already in queue");
            return Admission::default();
        }

        let index = build_dependants_index(self.pool().chain(std::iter::once(&change)));
        let dependants = collect_dependants(&id, &index);
        let displaced = self.take_awaiting(|c| dependants.contains(&c.id()));

        if dependants.contains(&id) {
            // Queued changes can require an identity that already passed and
            // is now being resubmitted, so the cycle may reach into batches.
            let queued = self.queue.remove_where(|c| dependants.contains(&c.id()));
            warn!(
                change = ?id,
                queued = queued.len(),
                waiting = displaced.len(),
                "Rejecting change that requires itself"
            );
            let mut rejected = Vec::with_capacity(queued.len() + displaced.len() + 1);
            rejected.push(change);
            rejected.extend(queued);
            rejected.extend(displaced);
            return Admission {
                added: Vec::new(),
                rejected,
            };
        }

        let mut candidates = Vec::with_capacity(displaced.len() + 1);
        candidates.push(change);
        candidates.extend(displaced);

        let added = self.settle(candidates);
        Admission {
            added,
            rejected: Vec::new(),
        }
    }

    /// Returns the batch to test next. See [`BatchQueue::next_test`].
    pub fn next_test(&mut self) -> Option<TestBatch<C>> {
        self.queue.next_test()
    }

    /// Records a passing test. Requirements play no part in success.
    pub fn on_test_success(&mut self, key: TestKey) -> TestOutcome<C> {
        self.queue.on_test_success(key)
    }

    /// Records a failing test, cascading any isolated failure to every
    /// change that transitively requires it.
    ///
    /// Cascaded changes follow the isolated ones in `failed`: queued changes
    /// in test order, then waiting changes in arrival order.
    pub fn on_test_failure(&mut self, key: TestKey) -> TestOutcome<C> {
        let mut outcome = self.queue.on_test_failure(key);
        if outcome.failed.is_empty() {
            return outcome;
        }

        let index = build_dependants_index(self.pool());
        let mut doomed = HashSet::new();
        for failed in &outcome.failed {
            doomed.extend(collect_dependants(&failed.id(), &index));
        }
        if doomed.is_empty() {
            return outcome;
        }

        let queued = self.queue.remove_where(|c| doomed.contains(&c.id()));
        let waiting = self.take_awaiting(|c| doomed.contains(&c.id()));
        info!(
            key = %key,
            queued = queued.len(),
            waiting = waiting.len(),
            "Failing dependants of isolated change"
        );
        outcome.failed.extend(queued);
        outcome.failed.extend(waiting);
        outcome
    }

    /// Removes and returns waiting changes matching `pred`, in arrival order.
    fn take_awaiting<F>(&mut self, mut pred: F) -> Vec<C>
    where
        F: FnMut(&C) -> bool,
    {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.awaiting)
            .into_iter()
            .partition(|entry| pred(&entry.change));
        self.awaiting = kept;
        taken.into_iter().map(|entry| entry.change).collect()
    }

    /// Admits every candidate whose requirements are queued, repeating until
    /// no more can be admitted so candidates can satisfy one another. The
    /// rest are parked with their missing requirements.
    ///
    /// Returns the admitted changes in admission order, which places every
    /// change after the changes it requires.
    fn settle(&mut self, mut candidates: Vec<C>) -> Vec<C> {
        let mut visible: HashSet<C::Id> = self.queue.iter().map(Change::id).collect();
        let mut added = Vec::new();

        loop {
            let before = candidates.len();
            let mut blocked = Vec::new();

            for change in candidates {
                if change.requirements().iter().all(|r| visible.contains(r)) {
                    visible.insert(change.id());
                    self.queue.add(change.clone());
                    added.push(change);
                } else {
                    blocked.push(change);
                }
            }

            candidates = blocked;
            if candidates.is_empty() || candidates.len() == before {
                break;
            }
        }

        for change in candidates {
            let missing: HashSet<C::Id> = change
                .requirements()
                .into_iter()
                .filter(|r| !visible.contains(r))
                .collect();
            debug!(change = ?change.id(), missing = missing.len(), "Change waiting for requirements");
            self.awaiting.push(AwaitingEntry { change, missing });
        }

        if !added.is_empty() {
            debug!(count = added.len(), "Admitted changes");
        }
        added
    }
}
