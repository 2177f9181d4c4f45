//! Connectivity monitoring and resilient request execution.
//!
//! This module provides:
//! - Multi-endpoint connectivity probing with tri-state status
//! - Status-change subscribers with panic-isolated dispatch
//! - Structured classification of transport failures
//! - Retry policies with exponential backoff
//! - A request executor that adapts its retries to connectivity

mod classify;
mod executor;
mod monitor;
mod probe;
mod retry;
mod status;
mod subscribers;
mod transport;

pub use classify::{classify_chain, classify_message, TransportError, TransportErrorKind};
pub use executor::{validate_response, ResilientExecutor, ResilientExecutorBuilder};
pub use monitor::{ConnectivityMonitor, MonitorSnapshot};
pub use probe::{HttpProber, Prober};
pub use retry::{RetryPolicies, RetryPolicy};
pub use status::ConnectivityStatus;
pub use subscribers::{StatusCallback, StatusChange, StatusSubscriberRegistry};
pub use transport::{
    BodyStream, HttpResponse, HttpTransport, PreparedRequest, RawResponse, RequestSpec, Transport,
};
