//! Result shapes returned by queue operations.

use serde::{Deserialize, Serialize};

use crate::types::TestKey;

/// A batch dispatched for testing, correlated by its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestBatch<C> {
    pub key: TestKey,
    pub changes: Vec<C>,
}

/// Changes conclusively classified by a test report.
///
/// Both lists are empty when the report was ignored (stale key) or when a
/// failed batch was bisected without isolating anything yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome<C> {
    pub passed: Vec<C>,
    pub failed: Vec<C>,
}

impl<C> TestOutcome<C> {
    pub fn passed(passed: Vec<C>) -> Self {
        TestOutcome {
            passed,
            failed: Vec::new(),
        }
    }

    pub fn failed(failed: Vec<C>) -> Self {
        TestOutcome {
            passed: Vec::new(),
            failed,
        }
    }

    /// Returns true if nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.passed.is_empty() && self.failed.is_empty()
    }
}

impl<C> Default for TestOutcome<C> {
    fn default() -> Self {
        TestOutcome {
            passed: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Result of adding a change to a [`DependencyQueue`](super::DependencyQueue).
///
/// `added` lists every change that entered the batch queue during the call,
/// which can include previously waiting changes unblocked by the new one.
/// `rejected` lists changes dropped for sitting on a requirement cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission<C> {
    pub added: Vec<C>,
    pub rejected: Vec<C>,
}

impl<C> Admission<C> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.rejected.is_empty()
    }
}

impl<C> Default for Admission<C> {
    fn default() -> Self {
        Admission {
            added: Vec::new(),
            rejected: Vec::new(),
        }
    }
}
