//! HTTP control surface for the replicator.
//!
//! Optional: only started when `--listen` is given. The service runs the same
//! with or without it.
//!
//! # Endpoints
//!
//! - `GET /health` - 200 while the replicator task is alive
//! - `GET /api/v1/status` - JSON [`StatusSnapshot`](crate::service::StatusSnapshot)
//! - `POST /api/v1/cooldown/reset` - clears the update cooldown (202 Accepted)

use std::sync::Arc;

use crate::service::ServiceHandle;

pub mod control;
pub mod health;

pub use control::{ControlError, reset_cooldown_handler, status_handler};
pub use health::health_handler;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: ServiceHandle,
}

impl AppState {
    pub fn new(service: ServiceHandle) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { service }),
        }
    }

    /// Returns the control handle of the service task.
    pub fn service(&self) -> &ServiceHandle {
        &self.inner.service
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/cooldown/reset", post(reset_cooldown_handler))
        .with_state(app_state)
}
