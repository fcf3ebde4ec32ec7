//! Liveness endpoint.

use axum::http::StatusCode;

/// Returns 200 OK with the text "OK" while the server accepts connections.
///
/// Does not touch the queue, so it stays responsive while a long request
/// holds the queue lock.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
