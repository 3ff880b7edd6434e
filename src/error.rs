//! Error taxonomy for the entry pipeline.
//!
//! Every client adapter classifies its failures into an [`ErrorKind`] at the
//! boundary, so downstream code decides retry/queue/degrade behavior from the
//! kind alone rather than inspecting message text.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Classification of a pipeline failure.
///
/// The kind decides handling: `Validation` and `Auth` surface to the caller,
/// everything else degrades (AI chain) or queues (persistence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; never retried or queued
    Validation,

    /// Connectivity, timeout, or transport failure
    Network,

    /// Upstream credential or permission failure; surfaced fatally
    Auth,

    /// Upstream rejected the request shape; degraded like Network
    UpstreamBadRequest,

    /// Anything unclassified; handled like Network to avoid losing data
    Unknown,
}

impl ErrorKind {
    /// Kinds that fall back to the offline queue instead of surfacing
    pub fn queues_offline(self) -> bool {
        matches!(self, Self::Network | Self::UpstreamBadRequest | Self::Unknown)
    }

    /// Kinds that propagate to the caller as fatal
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Validation | Self::Auth)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Auth => "auth",
            Self::UpstreamBadRequest => "upstream_bad_request",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A classified pipeline failure.
///
/// Carries the kind structurally so callers never match on message content.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn upstream_bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamBadRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// The classification driving retry/queue/degrade decisions
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Classify an HTTP response status from an upstream service
pub fn classify_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        401 | 403 => ErrorKind::Auth,
        400 | 404 | 413 | 422 => ErrorKind::UpstreamBadRequest,
        408 | 429 => ErrorKind::Network,
        s if s >= 500 => ErrorKind::Network,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a transport-level reqwest failure
pub fn classify_transport(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ErrorKind::Network
    } else if err.is_builder() {
        ErrorKind::Validation
    } else {
        ErrorKind::Unknown
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(classify_transport(&err), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(ErrorKind::Validation.is_fatal());
        assert!(ErrorKind::Auth.is_fatal());
        assert!(!ErrorKind::Network.is_fatal());
        assert!(!ErrorKind::Unknown.is_fatal());
    }

    #[test]
    fn test_queueable_kinds() {
        assert!(ErrorKind::Network.queues_offline());
        assert!(ErrorKind::UpstreamBadRequest.queues_offline());
        assert!(ErrorKind::Unknown.queues_offline());
        assert!(!ErrorKind::Validation.queues_offline());
        assert!(!ErrorKind::Auth.queues_offline());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), ErrorKind::Auth);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ErrorKind::Auth);
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            ErrorKind::UpstreamBadRequest
        );
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            ErrorKind::UpstreamBadRequest
        );
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), ErrorKind::Network);
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorKind::Network
        );
        assert_eq!(classify_status(StatusCode::IM_A_TEAPOT), ErrorKind::Unknown);
    }

    #[test]
    fn test_error_display_includes_kind() {
        let err = PipelineError::network("socket closed");
        assert_eq!(err.to_string(), "network: socket closed");
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
