//! The bisecting merge queue.
//!
//! Callers add changes one at a time, ask for the next batch to test, run
//! the test out-of-band, and report the result against the batch's key. The
//! queue answers each report with the changes it has conclusively classified.
//!
//! # Module Structure
//!
//! - [`batch`]: batching and bisection over plain values
//! - [`dependency`]: requirement-aware admission and failure cascading
//! - [`outcome`]: result shapes returned to callers
//! - [`error`]: reconstruction errors
//!
//! # Concurrency
//!
//! Both queues are plain single-owner state machines. Every operation is
//! synchronous and in-memory; callers serialize access (one lock per queue)
//! and run tests outside the lock. At most one key is outstanding, so at
//! most one batch is in flight.

pub mod batch;
pub mod dependency;
pub mod error;
pub mod outcome;


pub use batch::BatchQueue;
pub use dependency::{AwaitingEntry, DependencyQueue};
pub use error::RestoreError;
pub use outcome::{Admission, TestBatch, TestOutcome};
