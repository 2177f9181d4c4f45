//! Error types for netwatch.
//!
//! Every fallible operation in the crate returns [`NetError`]. Transport-level
//! failures carry a structured [`TransportError`] so callers can tell network
//! trouble apart from cancellation or HTTP status problems without parsing
//! messages.

use crate::network::TransportError;
use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for netwatch.
#[derive(Debug, Error)]
pub enum NetError {
    /// A single transport attempt failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Every allowed attempt failed; `attempts` counts the initial try.
    #[error("request failed after {attempts} attempts: {source}")]
    RequestFailed {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The attached monitor reports the network as offline, no attempt made.
    #[error("network is offline")]
    Offline,

    /// The response arrived but its body could not be read.
    #[error("failed to read response body: {source}")]
    BodyRead {
        #[source]
        source: TransportError,
    },

    /// The caller's cancellation token fired.
    #[error("operation was cancelled")]
    Cancelled,

    /// Non-2xx status reported by `validate_response`.
    #[error("HTTP {status} ({})", retry_label(.retryable))]
    HttpStatus { status: StatusCode, retryable: bool },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

fn retry_label(retryable: &bool) -> &'static str {
    if *retryable {
        "retryable"
    } else {
        "not retryable"
    }
}

/// Result type alias for netwatch operations.
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Check if this error describes a condition worth retrying later.
    ///
    /// `Offline` counts as retryable: the link may come back. Cancellation,
    /// body reads and configuration errors do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Transport(_) | NetError::RequestFailed { .. } | NetError::Offline => true,
            NetError::HttpStatus { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Check if this error came from cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetError::Cancelled)
    }

    /// Check if the underlying transport failure was network-classified.
    pub fn is_network(&self) -> bool {
        match self {
            NetError::Transport(e) | NetError::RequestFailed { source: e, .. } => e.is_network(),
            NetError::Offline => true,
            _ => false,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        NetError::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::TransportErrorKind;

    #[test]
    fn test_error_display() {
        assert_eq!(NetError::Offline.to_string(), "network is offline");
        assert_eq!(NetError::Cancelled.to_string(), "operation was cancelled");

        let err = NetError::RequestFailed {
            attempts: 4,
            source: TransportError::new(TransportErrorKind::ConnectionRefused, "connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "request failed after 4 attempts: connection refused"
        );
    }

    #[test]
    fn test_http_status_display_tags_retryable() {
        let err = NetError::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            retryable: true,
        };
        assert!(err.to_string().contains("retryable"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(NetError::Offline.is_retryable());
        assert!(!NetError::Cancelled.is_retryable());
        assert!(!NetError::HttpStatus {
            status: StatusCode::NOT_FOUND,
            retryable: false
        }
        .is_retryable());
    }

    #[test]
    fn test_network_classification_propagates() {
        let refused = NetError::Transport(TransportError::new(
            TransportErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(refused.is_network());

        let other = NetError::Transport(TransportError::new(TransportErrorKind::Other, "bad tls"));
        assert!(!other.is_network());
        assert!(!NetError::Cancelled.is_network());
    }
}
