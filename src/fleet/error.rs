//! Fleet API error types.
//!
//! Errors are split by what the caller should do about them:
//!
//! - **Transient** errors are retriable (5xx, 429, connection failures, timeouts)
//! - **Permanent** errors are returned immediately (other 4xx, undecodable bodies)
//! - **NotFound** is a permanent error that callers often treat as an answer
//!   rather than a failure (e.g. destroying a unit that is already gone)

use std::fmt;
use thiserror::Error;

/// The kind of fleet API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetErrorKind {
    /// Safe to retry after a delay.
    Transient,

    /// Retrying will not help.
    Permanent,

    /// The addressed unit does not exist (HTTP 404).
    NotFound,
}

impl FleetErrorKind {
    /// Returns true if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, FleetErrorKind::Transient)
    }
}

/// A fleet API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct FleetApiError {
    /// The kind of error.
    pub kind: FleetErrorKind,

    /// The HTTP status code, if the request got that far.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying transport error, if any.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for FleetApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "fleet API error (HTTP {}): {}", code, self.message),
            None => write!(f, "fleet API error: {}", self.message),
        }
    }
}

impl FleetApiError {
    /// Creates a transient error without a transport source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: FleetErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a permanent error without a transport source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: FleetErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a not-found error for the given resource.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self {
            kind: FleetErrorKind::NotFound,
            status_code: Some(404),
            message: format!("{} not found", what),
            source: None,
        }
    }

    /// Categorizes a non-success HTTP response.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: kind_for_status(status),
            status_code: Some(status),
            message: body.into(),
            source: None,
        }
    }

    /// Categorizes a reqwest error.
    ///
    /// Connection failures and timeouts never reached fleet and are worth
    /// retrying. Decode failures mean fleet answered with something we cannot
    /// read, which a retry will not change.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            FleetErrorKind::Transient
        } else if err.is_decode() || err.is_builder() {
            FleetErrorKind::Permanent
        } else {
            match status_code {
                Some(code) => kind_for_status(code),
                None => FleetErrorKind::Transient,
            }
        };

        Self {
            kind,
            status_code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FleetErrorKind::NotFound
    }
}

/// Maps an HTTP status code to an error kind.
fn kind_for_status(status: u16) -> FleetErrorKind {
    match status {
        404 => FleetErrorKind::NotFound,
        408 | 429 => FleetErrorKind::Transient,
        code if (500..600).contains(&code) => FleetErrorKind::Transient,
        _ => FleetErrorKind::Permanent,
    }
}
