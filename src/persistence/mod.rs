//! Crash-safe persistence for queue state.
//!
//! The whole queue is small, so it is saved as a single JSON snapshot after
//! every mutation rather than as an event log.
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   queue.json        # latest snapshot
//!   queue.json.tmp    # in-progress write, renamed over queue.json
//! ```
//!
//! # Recovery
//!
//! On startup the snapshot is loaded if present and the queue rebuilt from
//! it. An outstanding test key survives the restart, so a report for a test
//! started before the crash is still accepted.

pub mod durable;
pub mod snapshot;

pub use durable::{replace_synced, write_synced};
pub use snapshot::{
    QueueSnapshot, SCHEMA_VERSION, SNAPSHOT_FILE, SnapshotError, load_snapshot,
    save_snapshot_atomic, try_load_snapshot,
};
