//! Reachability probes.
//!
//! A probe answers one question: did anything at this URL speak HTTP back?
//! Status codes are irrelevant, a 503 proves the socket and TLS layers work.

use crate::config::NetworkConfig;
use crate::error::{NetError, Result};
use crate::network::classify::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// The probe primitive the monitor is built on.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `url`, giving up after `timeout`.
    ///
    /// `Ok` means any HTTP response arrived.
    async fn probe(&self, url: &Url, timeout: Duration) -> std::result::Result<(), TransportError>;
}

/// HEAD-request prober over reqwest.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| NetError::config(format!("Failed to create probe client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &Url, timeout: Duration) -> std::result::Result<(), TransportError> {
        // Per-request timeout; set_timeout applies from the next probe on.
        let response = self
            .client
            .head(url.clone())
            .timeout(timeout)
            .send()
            .await?;
        debug!("Probe {} answered {}", url, response.status());
        Ok(())
    }
}
