//! Newtype wrappers for queue identifiers.
//!
//! These types keep change identities and test keys from being mixed up with
//! each other or with arbitrary strings and integers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of a change submitted to the queue.
///
/// Identities are opaque to the queue: they are only hashed and compared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(pub String);

impl ChangeId {
    pub fn new(s: impl Into<String>) -> Self {
        ChangeId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChangeId {
    fn from(s: String) -> Self {
        ChangeId(s)
    }
}

impl From<&str> for ChangeId {
    fn from(s: &str) -> Self {
        ChangeId(s.to_string())
    }
}

/// Token correlating a dispatched batch with its eventual pass/fail report.
///
/// Keys are minted from a per-queue counter, so a key is never reused by the
/// queue that issued it (including across snapshot/restore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestKey(pub u64);

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<u64> for TestKey {
    fn from(n: u64) -> Self {
        TestKey(n)
    }
}
