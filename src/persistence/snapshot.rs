//! Snapshot persistence for the queue.
//!
//! A snapshot captures everything the queue knows: batches in order, the
//! outstanding test key, the key counter, and the waiting changes. Missing
//! requirement sets are derived data and are recomputed on restore.
//!
//! # Atomic Writes
//!
//! Snapshots are written with write-to-temp-then-rename:
//! 1. Write to `<path>.tmp`
//! 2. fsync the file
//! 3. Rename to `<path>`
//! 4. fsync the directory
//!
//! Readers always see either the previous or the new snapshot, never a
//! partial write.

use std::fmt;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::durable::{replace_synced, write_synced};
use crate::queue::{BatchQueue, DependencyQueue, RestoreError};
use crate::types::{Change, TestKey};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// File name of the snapshot inside the state directory.
pub const SNAPSHOT_FILE: &str = "queue.json";

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    /// The snapshot parsed but describes an impossible queue.
    #[error("inconsistent snapshot: {0}")]
    Restore(#[from] RestoreError),
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Persisted queue state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot<C> {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// When this snapshot was taken.
    pub snapshot_at: DateTime<Utc>,

    /// Batches from head to tail.
    pub batches: Vec<Vec<C>>,

    /// Key of the test in flight, if any.
    pub test_key: Option<TestKey>,

    /// Counter value for the next minted key.
    pub next_key: u64,

    /// Changes waiting for requirements, in arrival order.
    #[serde(default = "Vec::new")]
    pub awaiting: Vec<C>,
}

impl<C: Change> QueueSnapshot<C> {
    /// Captures the current state of a queue.
    pub fn capture(queue: &DependencyQueue<C>) -> Self {
        let batches = queue.batches();
        QueueSnapshot {
            schema_version: SCHEMA_VERSION,
            snapshot_at: Utc::now(),
            batches: batches.batches().map(<[C]>::to_vec).collect(),
            test_key: batches.test_key(),
            next_key: batches.next_key(),
            awaiting: queue
                .awaiting()
                .iter()
                .map(|entry| entry.change().clone())
                .collect(),
        }
    }

    /// Rebuilds the queue this snapshot was captured from.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot breaks a queue invariant.
    pub fn restore(self) -> std::result::Result<DependencyQueue<C>, RestoreError>
    where
        C: fmt::Debug,
    {
        let batches = BatchQueue::from_parts(self.batches, self.test_key, self.next_key)?;
        DependencyQueue::from_parts(batches, self.awaiting)
    }
}

/// Saves a snapshot atomically to disk.
///
/// # Errors
///
/// Returns an error if any IO operation fails.
pub fn save_snapshot_atomic<C: Serialize>(path: &Path, snapshot: &QueueSnapshot<C>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    write_synced(&tmp_path, &bytes)?;
    replace_synced(&tmp_path, path)?;

    Ok(())
}

/// Loads a snapshot from disk.
///
/// # Errors
///
/// Returns an error if:
/// - The file doesn't exist or can't be read
/// - The JSON is malformed
/// - The schema version is incompatible
pub fn load_snapshot<C: DeserializeOwned>(path: &Path) -> Result<QueueSnapshot<C>> {
    let bytes = std::fs::read(path)?;
    let snapshot: QueueSnapshot<C> = serde_json::from_slice(&bytes)?;

    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: snapshot.schema_version,
        });
    }

    Ok(snapshot)
}

/// Attempts to load a snapshot, returning None if the file doesn't exist.
///
/// Other errors (malformed JSON, schema mismatch) are propagated.
pub fn try_load_snapshot<C: DeserializeOwned>(path: &Path) -> Result<Option<QueueSnapshot<C>>> {
    match load_snapshot(path) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(SnapshotError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
