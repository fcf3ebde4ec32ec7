//! The capability interface the queue needs from a change.
//!
//! The queue never looks inside a change. It only asks for an identity and
//! for the identities the change requires to be admitted ahead of it.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::ids::ChangeId;

/// A unit of work submitted to the queue.
///
/// Implementors must keep `id()` stable for the lifetime of the change and
/// unique among changes that are live in the same queue.
pub trait Change: Clone + PartialEq {
    /// Identity token for this change.
    type Id: Clone + Eq + Hash + fmt::Debug;

    /// Returns the identity of this change.
    fn id(&self) -> Self::Id;

    /// Returns the identities of changes this one depends on.
    ///
    /// The default is no requirements.
    fn requirements(&self) -> HashSet<Self::Id> {
        HashSet::new()
    }
}

/// Adapter for bare values: the value is its own identity and has no
/// requirements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plain<T>(pub T);

impl<T> Change for Plain<T>
where
    T: Clone + Eq + Hash + fmt::Debug,
{
    type Id = T;

    fn id(&self) -> T {
        self.0.clone()
    }
}

impl<T: fmt::Display> fmt::Display for Plain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A change submitted to the service: an identity plus the identities it
/// requires.
///
/// `requires` is a sorted set so snapshots and API responses are stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: ChangeId,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub requires: BTreeSet<ChangeId>,
}

impl ChangeRecord {
    /// Creates a change with no requirements.
    pub fn new(id: impl Into<ChangeId>) -> Self {
        ChangeRecord {
            id: id.into(),
            requires: BTreeSet::new(),
        }
    }

    /// Adds a requirement on another change.
    pub fn requiring(mut self, id: impl Into<ChangeId>) -> Self {
        self.requires.insert(id.into());
        self
    }
}

impl Change for ChangeRecord {
    type Id = ChangeId;

    fn id(&self) -> ChangeId {
        self.id.clone()
    }

    fn requirements(&self) -> HashSet<ChangeId> {
        self.requires.iter().cloned().collect()
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
