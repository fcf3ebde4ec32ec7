//! Queue endpoints: submission, test dispatch, verdict reports, inspection.

use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::AppState;
use crate::persistence::SnapshotError;
use crate::queue::{Admission, TestOutcome};
use crate::types::{ChangeId, ChangeRecord, TestKey};

/// Errors returned by the queue endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The submitted change has an empty identity.
    #[error("change id must not be blank")]
    BlankChangeId,

    /// The mutation was applied but the snapshot could not be written.
    #[error("failed to persist queue: {0}")]
    Persist(#[from] SnapshotError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BlankChangeId => StatusCode::BAD_REQUEST,
            ApiError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Response of `POST /api/v1/tests/next`.
///
/// Both fields are empty when there is nothing to test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextTest {
    pub test_key: Option<TestKey>,
    pub changes: Vec<ChangeRecord>,
}

/// A waiting change and the identities it still lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingView {
    pub change: ChangeRecord,
    pub missing: BTreeSet<ChangeId>,
}

/// Response of `GET /api/v1/queue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub test_key: Option<TestKey>,
    pub batches: Vec<Vec<ChangeRecord>>,
    pub awaiting: Vec<AwaitingView>,
}

/// Submits a change.
///
/// # Response
///
/// - 200 OK with the [`Admission`]: every change that entered the batch
///   queue and every change rejected for a requirement cycle. Both lists
///   are empty when the change only started waiting or was already known.
/// - 400 Bad Request for a blank id
/// - 500 Internal Server Error if the snapshot could not be written
///
/// # Example
///
/// ```ignore
/// POST /api/v1/changes HTTP/1.1
/// Content-Type: application/json
///
/// { "id": "feature-b", "requires": ["feature-a"] }
/// ```
pub async fn submit_change_handler(
    State(app_state): State<AppState>,
    Json(change): Json<ChangeRecord>,
) -> Result<Json<Admission<ChangeRecord>>, ApiError> {
    if change.id.as_str().trim().is_empty() {
        return Err(ApiError::BlankChangeId);
    }

    let mut queue = app_state.lock().await;
    let id = change.id.clone();
    let admission = queue.add(change);
    app_state.persist(&queue)?;

    info!(
        change = %id,
        added = admission.added.len(),
        rejected = admission.rejected.len(),
        "Change submitted"
    );
    Ok(Json(admission))
}

/// Returns the batch to test next, minting a key if none is outstanding.
///
/// Repeating the call before reporting returns the same key and batch.
pub async fn next_test_handler(
    State(app_state): State<AppState>,
) -> Result<Json<NextTest>, ApiError> {
    let mut queue = app_state.lock().await;
    let before = queue.test_key();
    let next = queue.next_test();
    if queue.test_key() != before {
        app_state.persist(&queue)?;
    }

    Ok(Json(match next {
        Some(batch) => NextTest {
            test_key: Some(batch.key),
            changes: batch.changes,
        },
        None => NextTest {
            test_key: None,
            changes: Vec::new(),
        },
    }))
}

/// Reports a passing test for `key`.
pub async fn report_success_handler(
    State(app_state): State<AppState>,
    Path(key): Path<u64>,
) -> Result<Json<TestOutcome<ChangeRecord>>, ApiError> {
    let mut queue = app_state.lock().await;
    let before = queue.test_key();
    let outcome = queue.on_test_success(TestKey(key));
    if report_changed_queue(before, queue.test_key(), &outcome) {
        app_state.persist(&queue)?;
    }
    Ok(Json(outcome))
}

/// Reports a failing test for `key`.
pub async fn report_failure_handler(
    State(app_state): State<AppState>,
    Path(key): Path<u64>,
) -> Result<Json<TestOutcome<ChangeRecord>>, ApiError> {
    let mut queue = app_state.lock().await;
    let before = queue.test_key();
    let outcome = queue.on_test_failure(TestKey(key));
    if report_changed_queue(before, queue.test_key(), &outcome) {
        app_state.persist(&queue)?;
    }
    Ok(Json(outcome))
}

/// A stale report leaves the key in place and classifies nothing; an
/// accepted one always clears the key.
fn report_changed_queue(
    before: Option<TestKey>,
    after: Option<TestKey>,
    outcome: &TestOutcome<ChangeRecord>,
) -> bool {
    before != after || !outcome.is_empty()
}

/// Returns a read-only view of the queue.
pub async fn queue_status_handler(State(app_state): State<AppState>) -> Json<QueueStatus> {
    let queue = app_state.lock().await;

    Json(QueueStatus {
        test_key: queue.test_key(),
        batches: queue.batches().batches().map(<[ChangeRecord]>::to_vec).collect(),
        awaiting: queue
            .awaiting()
            .iter()
            .map(|entry| AwaitingView {
                change: entry.change().clone(),
                missing: entry.missing().iter().cloned().collect(),
            })
            .collect(),
    })
}
