//! Dependant indexing and closure.
//!
//! Pure functions for building the reverse requirement index
//! (required identity -> requiring identities) and walking it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::types::Change;

/// Reverse requirement index: required identity -> identities requiring it.
pub type DependantsIndex<Id> = HashMap<Id, HashSet<Id>>;

/// Builds a reverse index from required identity to requiring identities.
///
/// This is the inverse of the requirement relationship:
/// - If change `b` requires `a`
/// - Then the index will have: `a -> {b}`
///
/// Requirements naming identities absent from the pool are still indexed;
/// the pool only determines which requirement edges exist.
pub fn build_dependants_index<'a, C, I>(pool: I) -> DependantsIndex<C::Id>
where
    C: Change + 'a,
    I: IntoIterator<Item = &'a C>,
{
    let mut index: DependantsIndex<C::Id> = HashMap::new();

    for change in pool {
        let id = change.id();
        for required in change.requirements() {
            index.entry(required).or_default().insert(id.clone());
        }
    }

    index
}

/// Collects every identity that transitively requires `root`.
///
/// Breadth-first over the reverse index. `root` itself is only part of the
/// result when it is reachable from itself, i.e. when it sits on a
/// requirement cycle.
pub fn collect_dependants<Id>(root: &Id, index: &DependantsIndex<Id>) -> HashSet<Id>
where
    Id: Clone + Eq + Hash,
{
    let mut result = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(root.clone());

    while let Some(current) = queue.pop_front() {
        if let Some(children) = index.get(&current) {
            for child in children {
                if result.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
        }
    }

    result
}
