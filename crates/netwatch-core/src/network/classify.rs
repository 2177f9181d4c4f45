//! Structured classification of transport failures.
//!
//! A failure is "network-classified" when it points at the link rather than
//! the peer: timeouts, refused or reset connections, unreachable hosts and
//! resolver failures. Classification prefers typed information (reqwest flags,
//! `std::io::ErrorKind` anywhere in the source chain) and only falls back to
//! message inspection for resolver errors that carry no typed kind.

use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Bucket a transport failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    Unreachable,
    DnsFailure,
    /// Not a connectivity problem (TLS, protocol, builder errors, ...).
    Other,
}

impl TransportErrorKind {
    /// Whether this kind should be treated as a connectivity failure.
    pub fn is_network(&self) -> bool {
        !matches!(self, TransportErrorKind::Other)
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionRefused => "connection refused",
            TransportErrorKind::ConnectionReset => "connection reset",
            TransportErrorKind::Unreachable => "unreachable",
            TransportErrorKind::DnsFailure => "dns failure",
            TransportErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A failed HTTP exchange below the application layer.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Build from any error, classifying it by its source chain.
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let kind = classify_chain(&err);
        Self {
            kind,
            message: render_chain(&err),
            source: Some(Box::new(err)),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_network(&self) -> bool {
        self.kind.is_network()
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = classify_reqwest(&err);
        Self {
            kind,
            message: render_chain(&err),
            source: Some(Box::new(err)),
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    // is_connect() also covers TLS and protocol failures; only the chain decides.
    classify_chain(err)
}

/// Classify an error by walking its source chain.
pub fn classify_chain(err: &(dyn StdError + 'static)) -> TransportErrorKind {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            let kind = classify_io(io_err.kind());
            if kind.is_network() {
                return kind;
            }
        }
        current = e.source();
    }
    classify_message(&render_chain(err))
}

fn classify_io(kind: io::ErrorKind) -> TransportErrorKind {
    match kind {
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TransportErrorKind::ConnectionReset,
        io::ErrorKind::NotConnected | io::ErrorKind::AddrNotAvailable => {
            TransportErrorKind::Unreachable
        }
        _ => TransportErrorKind::Other,
    }
}

/// Last-resort classification of a rendered error message.
///
/// Resolver failures surface as untyped `io::Error`s whose only marker is the
/// text, so this still has to exist.
pub fn classify_message(message: &str) -> TransportErrorKind {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["connection refused"]) {
        TransportErrorKind::ConnectionRefused
    } else if has(&["connection reset", "broken pipe"]) {
        TransportErrorKind::ConnectionReset
    } else if has(&[
        "dns error",
        "no such host",
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname",
    ]) {
        TransportErrorKind::DnsFailure
    } else if has(&["timed out", "timeout", "deadline exceeded"]) {
        TransportErrorKind::Timeout
    } else if has(&["unreachable"]) {
        TransportErrorKind::Unreachable
    } else {
        TransportErrorKind::Other
    }
}

fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let part = e.to_string();
        if !message.contains(&part) {
            message.push_str(": ");
            message.push_str(&part);
        }
        current = e.source();
    }
    message
}
