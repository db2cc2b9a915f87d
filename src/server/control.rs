//! Status and control endpoints.
//!
//! Both forward to the service task through its [`ServiceHandle`](crate::service::ServiceHandle);
//! neither touches reconciler state directly.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::info;

use super::AppState;
use crate::service::{ServiceStopped, StatusSnapshot};

/// Errors from the control endpoints.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    Stopped(#[from] ServiceStopped),
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControlError::Stopped(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// `GET /api/v1/status`: the service's current [`StatusSnapshot`].
///
/// The reply arrives between cycles, so this waits for a running cycle to finish.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, ControlError> {
    let snapshot = state.service().status().await?;
    Ok(Json(snapshot))
}

/// `POST /api/v1/cooldown/reset`: lets the next drifted unit update at once.
///
/// Returns 202 Accepted; the reset is applied when the service next reads its
/// control channel.
pub async fn reset_cooldown_handler(
    State(state): State<AppState>,
) -> Result<StatusCode, ControlError> {
    state.service().reset_cooldown().await?;
    info!("Cooldown reset requested over HTTP");
    Ok(StatusCode::ACCEPTED)
}
