//! Fleet API access.
//!
//! Key features:
//! - A capability trait ([`FleetApi`]) so the reconciler never sees HTTP
//! - Transient vs permanent error classification
//! - Bounded, fixed-delay retry for transient failures

mod api;
mod client;
mod error;
mod retry;

pub use api::{FleetApi, FleetUnit, UnitState};
pub use client::FleetHttpClient;
pub use error::{FleetApiError, FleetErrorKind};
pub use retry::{RetryConfig, retry};
