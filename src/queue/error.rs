//! Errors raised when reconstructing a queue from saved parts.
//!
//! Live queue operations never fail; only restoring from a snapshot that
//! breaks a queue invariant does.

use thiserror::Error;

use crate::types::TestKey;

/// The saved parts do not describe a state the queue could have reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    /// No batches at all; a queue always holds at least the pending batch.
    #[error("queue state has no batches")]
    NoBatches,

    /// A test key is outstanding but there is nothing in flight.
    #[error("test key {key} is outstanding but the head batch is empty")]
    KeyWithoutBatch { key: TestKey },

    /// The outstanding key was never minted by this queue's counter.
    #[error("test key {key} was not minted before counter value {next_key}")]
    KeyNotMinted { key: TestKey, next_key: u64 },

    /// The same change appears more than once across batches or the
    /// awaiting set.
    #[error("change {change} appears more than once")]
    DuplicateChange { change: String },
}
