//! HTTP service exposing one dependency-aware queue.
//!
//! Test runners poll for the next batch, run it out-of-band, and report the
//! verdict against the batch's key. Submitters post changes with their
//! requirements.
//!
//! # Endpoints
//!
//! - `POST /api/v1/changes` - Submits a change (returns the admission)
//! - `POST /api/v1/tests/next` - Returns the batch to test, minting a key
//! - `POST /api/v1/tests/{key}/success` - Reports a passing test
//! - `POST /api/v1/tests/{key}/failure` - Reports a failing test
//! - `GET /api/v1/queue` - Returns the queue contents as JSON
//! - `GET /health` - Returns 200 if server is running
//!
//! Every mutating request persists a snapshot before responding when a
//! snapshot path is configured.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::error;

use crate::persistence::{QueueSnapshot, SnapshotError, save_snapshot_atomic};
use crate::queue::DependencyQueue;
use crate::types::ChangeRecord;

pub mod health;
pub mod queue;

pub use health::health_handler;
pub use queue::{
    ApiError, NextTest, QueueStatus, next_test_handler, queue_status_handler,
    report_failure_handler, report_success_handler, submit_change_handler,
};

/// The queue type served over HTTP.
pub type ServedQueue = DependencyQueue<ChangeRecord>;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. The queue
/// sits behind a single async mutex, so requests are applied one at a time
/// in arrival order.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    queue: Mutex<ServedQueue>,

    /// Where the snapshot is written after each mutation, if anywhere.
    snapshot_path: Option<PathBuf>,
}

impl AppState {
    /// Creates a new `AppState` serving `queue`.
    pub fn new(queue: ServedQueue, snapshot_path: Option<PathBuf>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                queue: Mutex::new(queue),
                snapshot_path,
            }),
        }
    }

    /// Returns the snapshot path, if persistence is enabled.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.inner.snapshot_path.as_deref()
    }

    /// Locks the queue for the duration of one request.
    pub async fn lock(&self) -> MutexGuard<'_, ServedQueue> {
        self.inner.queue.lock().await
    }

    /// Writes the current queue state to disk. Call with the lock held so
    /// snapshots land in mutation order.
    pub fn persist(&self, queue: &ServedQueue) -> Result<(), SnapshotError> {
        let Some(path) = self.snapshot_path() else {
            return Ok(());
        };
        save_snapshot_atomic(path, &QueueSnapshot::capture(queue)).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to persist queue snapshot");
        })
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/api/v1/changes", post(submit_change_handler))
        .route("/api/v1/tests/next", post(next_test_handler))
        .route("/api/v1/tests/{key}/success", post(report_success_handler))
        .route("/api/v1/tests/{key}/failure", post(report_failure_handler))
        .route("/api/v1/queue", get(queue_status_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
