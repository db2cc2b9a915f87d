//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;

use super::AppState;

/// Returns 200 "OK" while the replicator task is alive, 503 once it has exited.
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
///
/// OK
/// ```
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.service().is_running() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "replicator stopped")
    }
}
