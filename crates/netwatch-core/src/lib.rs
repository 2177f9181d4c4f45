//! netwatch core - connectivity-aware resilient HTTP for provider API clients.
//!
//! The crate has two halves that share one status value:
//!
//! - [`ConnectivityMonitor`] probes a fixed set of endpoints, classifies the
//!   network as online, limited or offline, and notifies subscribers when
//!   that changes.
//! - [`ResilientExecutor`] runs one logical HTTP request, retrying transport
//!   failures with a backoff policy picked from the monitor's current status.
//!
//! Both are constructed explicitly and shared by `Arc`; the embedding
//! application owns their lifecycle.
//!
//! # Example
//!
//! ```rust,ignore
//! use netwatch_core::{CancellationToken, ConnectivityMonitor, MonitorConfig, RequestSpec, ResilientExecutor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> netwatch_core::Result<()> {
//!     let ctx = CancellationToken::new();
//!     let monitor = Arc::new(ConnectivityMonitor::new(MonitorConfig::default())?);
//!     monitor.add_status_callback(|change| println!("{} -> {}", change.previous, change.current));
//!     monitor.start_monitoring(&ctx).await;
//!
//!     let executor = ResilientExecutor::builder("https://api.example.com/v1/")
//!         .monitor(monitor.clone())
//!         .build()?;
//!     let response = executor.execute(&ctx, RequestSpec::get("models")).await?;
//!     println!("HTTP {}", response.status);
//!
//!     monitor.stop_monitoring();
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod network;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use config::{MonitorConfig, NetworkConfig, ProbeMode, RetryDefaults};
pub use error::{NetError, Result};
pub use network::{
    validate_response, ConnectivityMonitor, ConnectivityStatus, HttpResponse, MonitorSnapshot,
    RequestSpec, ResilientExecutor, RetryPolicies, RetryPolicy, StatusChange, TransportError,
    TransportErrorKind,
};
