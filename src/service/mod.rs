//! The long-running replicator service.
//!
//! This module provides:
//! - [`Service`]: the reconcile cycle and its event loop
//! - [`ServiceHandle`] / [`ServiceMessage`]: the control channel into the task
//! - [`StatusSnapshot`] / [`CycleReport`]: what the service reports about itself

mod message;
mod reconciler;
mod status;


pub use message::{ServiceHandle, ServiceMessage, ServiceStopped};
pub use reconciler::{
    DEFAULT_UPDATE_SETTLE_SECS, ReconcileError, ReplicatorConfig, Result, Service,
};
pub use status::{CycleOutcome, CycleReport, StatusSnapshot};
