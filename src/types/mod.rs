//! Core domain types for the bisecting queue.
//!
//! Identifiers are newtypes so that change identities and test keys cannot be
//! confused, and changes are reached only through the [`Change`] trait.

pub mod change;
pub mod ids;

pub use change::{Change, ChangeRecord, Plain};
pub use ids::{ChangeId, TestKey};
