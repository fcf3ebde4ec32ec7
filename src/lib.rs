//! Bisect Queue - a gated merge queue that tests changes in batches and
//! bisects failing batches to isolate the bad changes.
//!
//! [`queue::BatchQueue`] batches and bisects opaque values.
//! [`queue::DependencyQueue`] adds change identities and requirements on top,
//! holding changes back until what they require is queued and failing them
//! when what they require fails. The [`server`] module exposes one queue over
//! HTTP with snapshot persistence.

pub mod config;
pub mod persistence;
pub mod queue;
pub mod server;
pub mod state;
pub mod types;

#[cfg(test)]
pub mod test_utils;
