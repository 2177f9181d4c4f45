//! Centralized configuration for netwatch.
//!
//! Constants live on unit structs the way the rest of the crate reads them
//! (`NetworkConfig::MIN_PROBE_TIMEOUT`). The value structs below are what
//! callers construct; loading them from files or the environment is left to
//! the embedding application.

use crate::error::{NetError, Result};
use std::time::Duration;
use url::Url;

/// Network-related constants.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
    pub const USER_AGENT: &'static str = concat!("netwatch/", env!("CARGO_PKG_VERSION"));

    /// Lightweight endpoints that answer quickly from most networks.
    pub const DEFAULT_PROBE_URLS: &'static [&'static str] = &[
        "https://www.google.com",
        "https://www.cloudflare.com",
        "https://api.github.com",
    ];
}

/// Retry defaults per connectivity status.
pub struct RetryDefaults;

impl RetryDefaults {
    pub const MAX_RETRIES: u32 = 3;
    pub const BASE_DELAY: Duration = Duration::from_millis(500);
    pub const LIMITED_MAX_RETRIES: u32 = 5;
    pub const LIMITED_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const MAX_DELAY: Duration = Duration::from_secs(60);
}

/// How probes within one connectivity check are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// One probe after another; a check takes up to `endpoints × timeout`.
    #[default]
    Sequential,
    /// All probes at once; a check takes up to one `timeout`.
    Parallel,
}

/// Configuration for a [`ConnectivityMonitor`](crate::network::ConnectivityMonitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// URLs to probe, in order.
    pub endpoints: Vec<String>,
    /// Per-probe timeout. Clamped into `[MIN_PROBE_TIMEOUT, max_timeout]`.
    pub timeout: Duration,
    /// Upper bound for `timeout`.
    pub max_timeout: Duration,
    /// Delay between background checks.
    pub check_interval: Duration,
    pub probe_mode: ProbeMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoints: NetworkConfig::DEFAULT_PROBE_URLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: NetworkConfig::DEFAULT_PROBE_TIMEOUT,
            max_timeout: NetworkConfig::DEFAULT_MAX_PROBE_TIMEOUT,
            check_interval: NetworkConfig::DEFAULT_CHECK_INTERVAL,
            probe_mode: ProbeMode::Sequential,
        }
    }
}

impl MonitorConfig {
    /// Create a config probing the given endpoints with default timings.
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_probe_mode(mut self, mode: ProbeMode) -> Self {
        self.probe_mode = mode;
        self
    }

    /// Parse and validate the endpoint set.
    pub(crate) fn parse_endpoints(&self) -> Result<Vec<Url>> {
        if self.endpoints.is_empty() {
            return Err(NetError::config("at least one probe endpoint is required"));
        }
        self.endpoints
            .iter()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| NetError::config(format!("invalid probe endpoint {}: {}", raw, e)))
            })
            .collect()
    }

    /// Validate timing bounds.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_timeout < NetworkConfig::MIN_PROBE_TIMEOUT {
            return Err(NetError::config(format!(
                "max timeout {:?} is below the {:?} minimum",
                self.max_timeout,
                NetworkConfig::MIN_PROBE_TIMEOUT
            )));
        }
        if self.check_interval.is_zero() {
            return Err(NetError::config("check interval must be non-zero"));
        }
        Ok(())
    }
}

/// Clamp a probe timeout into `[MIN_PROBE_TIMEOUT, max]`.
pub fn clamp_timeout(timeout: Duration, max: Duration) -> Duration {
    timeout.clamp(NetworkConfig::MIN_PROBE_TIMEOUT, max.max(NetworkConfig::MIN_PROBE_TIMEOUT))
}
