//! Pure dependency-graph logic for the queue.
//!
//! Functions here compute over a pool of changes and never touch queue
//! state directly.

pub mod dependants;

pub use dependants::{DependantsIndex, build_dependants_index, collect_dependants};
