//! ResilientExecutor - connectivity-aware request execution.
//!
//! One call to [`ResilientExecutor::execute`] drives one logical request to
//! completion:
//! 1. Fails fast when the attached monitor reports the network offline
//! 2. Picks a retry policy from the current connectivity status
//! 3. Retries transport failures with exponential backoff, doubled for
//!    network-classified failures, which also trigger a background re-probe
//! 4. Reads the body once; body failures are never retried
//!
//! HTTP error statuses are responses, not failures. Use [`validate_response`]
//! to classify them.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::error::{NetError, Result};
use crate::network::classify::TransportError;
use crate::network::monitor::ConnectivityMonitor;
use crate::network::retry::{RetryPolicies, RetryPolicy};
use crate::network::status::ConnectivityStatus;
use crate::network::transport::{
    HttpResponse, HttpTransport, PreparedRequest, RawResponse, RequestSpec, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// A failed attempt, kept only long enough to log it.
#[derive(Debug)]
struct RequestAttempt<'a> {
    index: u32,
    delay: Duration,
    error: &'a TransportError,
    is_network: bool,
}

/// Executes requests against one base URL with adaptive retries.
pub struct ResilientExecutor {
    base_url: Url,
    transport: Arc<dyn Transport>,
    monitor: Option<Arc<ConnectivityMonitor>>,
    policies: RetryPolicies,
}

impl ResilientExecutor {
    /// Create a builder for an executor rooted at `base_url`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let executor = ResilientExecutor::builder("https://api.example.com/v1/")
    ///     .monitor(monitor.clone())
    ///     .build()?;
    /// let response = executor.execute(&ctx, RequestSpec::get("models")).await?;
    /// ```
    pub fn builder(base_url: impl Into<String>) -> ResilientExecutorBuilder {
        ResilientExecutorBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn monitor(&self) -> Option<&Arc<ConnectivityMonitor>> {
        self.monitor.as_ref()
    }

    pub fn policies(&self) -> &RetryPolicies {
        &self.policies
    }

    /// Status used for policy selection; `Unknown` without a monitor.
    fn current_status(&self) -> ConnectivityStatus {
        self.monitor
            .as_ref()
            .map(|m| m.status())
            .unwrap_or(ConnectivityStatus::Unknown)
    }

    /// The policy the next call to `execute` would use.
    pub fn current_policy(&self) -> RetryPolicy {
        self.policies.select(self.current_status())
    }

    /// Execute one logical request.
    ///
    /// Returns the response whatever its HTTP status. Errors are
    /// [`NetError::Offline`], [`NetError::RequestFailed`] once every attempt
    /// failed, [`NetError::BodyRead`], [`NetError::Cancelled`] or
    /// [`NetError::InvalidRequest`].
    pub async fn execute(&self, ctx: &CancellationToken, spec: RequestSpec) -> Result<HttpResponse> {
        ctx.check()?;

        let status = self.current_status();
        if self.monitor.as_ref().is_some_and(|m| m.is_offline()) {
            debug!("Skipping {} {}: network is offline", spec.method, spec.path);
            return Err(NetError::Offline);
        }

        let policy = self.policies.select(status);
        let request = PreparedRequest::resolve(&self.base_url, spec)?;
        let raw = self.send_with_retries(ctx, &request, &policy).await?;

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(NetError::Cancelled),
            read = raw.read_body() => read.map_err(|source| NetError::BodyRead { source }),
        }
    }

    async fn send_with_retries(
        &self,
        ctx: &CancellationToken,
        request: &PreparedRequest,
        policy: &RetryPolicy,
    ) -> Result<RawResponse> {
        let max_attempts = policy.max_attempts();

        for attempt in 0..max_attempts {
            let result = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(NetError::Cancelled),
                result = self.transport.send(request) => result,
            };

            let error = match result {
                Ok(raw) => {
                    if attempt > 0 {
                        debug!(
                            "{} {} succeeded after {} attempts",
                            request.method,
                            request.url,
                            attempt + 1
                        );
                    }
                    return Ok(raw);
                }
                Err(e) => e,
            };

            if attempt + 1 >= max_attempts {
                warn!(
                    "All {} attempts for {} {} failed. Last error: {}",
                    max_attempts, request.method, request.url, error
                );
                return Err(NetError::RequestFailed {
                    attempts: max_attempts,
                    source: error,
                });
            }

            let is_network = error.is_network();
            if is_network {
                if let Some(monitor) = &self.monitor {
                    monitor.request_check();
                }
            }

            let record = RequestAttempt {
                index: attempt,
                delay: policy.backoff(attempt, is_network),
                error: &error,
                is_network,
            };
            warn!(
                "Attempt {}/{} for {} {} failed: {} (network: {}). Retrying in {:?}",
                record.index + 1,
                max_attempts,
                request.method,
                request.url,
                record.error,
                record.is_network,
                record.delay
            );

            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(NetError::Cancelled),
                _ = tokio::time::sleep(record.delay) => {}
            }
        }

        // max_attempts is at least one, so the loop always returns.
        Err(NetError::InvalidRequest {
            message: "retry policy allows no attempts".to_string(),
        })
    }
}

impl std::fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("base_url", &self.base_url.as_str())
            .field("has_monitor", &self.monitor.is_some())
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

/// Classify a response by status.
///
/// `Ok` for 2xx. 429/500/502/503/504 yield a `retryable` [`NetError::HttpStatus`];
/// every other status a non-retryable one. Nothing here retries.
pub fn validate_response(response: &HttpResponse) -> Result<()> {
    let status = response.status;
    if status.is_success() {
        return Ok(());
    }
    Err(NetError::HttpStatus {
        status,
        retryable: HttpTransport::is_retryable_status(status),
    })
}

/// Builder for [`ResilientExecutor`].
pub struct ResilientExecutorBuilder {
    base_url: String,
    transport: Option<Arc<dyn Transport>>,
    monitor: Option<Arc<ConnectivityMonitor>>,
    policies: RetryPolicies,
    request_timeout: Duration,
    user_agent: String,
}

impl ResilientExecutorBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            monitor: None,
            policies: RetryPolicies::default(),
            request_timeout: NetworkConfig::REQUEST_TIMEOUT,
            user_agent: NetworkConfig::USER_AGENT.to_string(),
        }
    }

    /// Attach a monitor for fast-fail and status-based policy selection.
    pub fn monitor(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Replace the reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn default_policy(mut self, policy: RetryPolicy) -> Self {
        self.policies.default = policy;
        self
    }

    /// Policy used while the monitor reports `Limited`.
    pub fn limited_policy(mut self, policy: RetryPolicy) -> Self {
        self.policies.limited = policy;
        self
    }

    /// Overall timeout for each attempt of the default transport.
    ///
    /// Ignored when a custom transport is supplied.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Ignored when a custom transport is supplied.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<ResilientExecutor> {
        let base_url = Url::parse(&self.base_url).map_err(|e| NetError::Config {
            message: format!("invalid base URL {}: {}", self.base_url, e),
        })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_options(
                self.request_timeout,
                &self.user_agent,
            )?),
        };

        Ok(ResilientExecutor {
            base_url,
            transport,
            monitor: self.monitor,
            policies: self.policies,
        })
    }
}
