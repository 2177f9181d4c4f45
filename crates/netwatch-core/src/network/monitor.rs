//! ConnectivityMonitor - background multi-endpoint reachability tracking.
//!
//! Provides:
//! - On-demand connectivity checks across a fixed endpoint set
//! - Tri-state classification (online / limited / offline)
//! - A background monitoring loop with idempotent start/stop
//! - Status-change notification through a subscriber registry

use crate::cancel::CancellationToken;
use crate::config::{clamp_timeout, MonitorConfig, ProbeMode};
use crate::error::Result;
use crate::network::probe::{HttpProber, Prober};
use crate::network::status::ConnectivityStatus;
use crate::network::subscribers::{StatusChange, StatusSubscriberRegistry};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

/// Mutable monitor state. Every read and write goes through one lock.
struct MonitorState {
    status: ConnectivityStatus,
    last_check: Option<DateTime<Utc>>,
    timeout: Duration,
    max_timeout: Duration,
    check_interval: Duration,
    is_monitoring: bool,
    /// Taken exactly once by `stop_monitoring`.
    stop_tx: Option<oneshot::Sender<()>>,
    /// Bumped on every start so a finished loop only clears its own run.
    generation: u64,
    subscribers: StatusSubscriberRegistry,
}

/// Diagnostic snapshot of a monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub status: ConnectivityStatus,
    pub last_check: Option<DateTime<Utc>>,
    #[serde(rename = "timeout_ms", serialize_with = "as_millis")]
    pub timeout: Duration,
    #[serde(rename = "max_timeout_ms", serialize_with = "as_millis")]
    pub max_timeout: Duration,
    #[serde(rename = "check_interval_ms", serialize_with = "as_millis")]
    pub check_interval: Duration,
    pub is_monitoring: bool,
    pub endpoints: Vec<String>,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Tracks whether the network is reachable by probing a fixed endpoint set.
///
/// Construct one per application and share it as `Arc<ConnectivityMonitor>`.
pub struct ConnectivityMonitor {
    endpoints: Vec<Url>,
    probe_mode: ProbeMode,
    prober: Arc<dyn Prober>,
    state: RwLock<MonitorState>,
    /// Set while a `request_check` re-probe is running.
    recheck_in_flight: AtomicBool,
}

impl ConnectivityMonitor {
    /// Create a monitor that probes with HEAD requests over reqwest.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        Self::with_prober(config, Arc::new(HttpProber::new()?))
    }

    /// Create a monitor with a custom probe primitive.
    pub fn with_prober(config: MonitorConfig, prober: Arc<dyn Prober>) -> Result<Self> {
        config.validate()?;
        let endpoints = config.parse_endpoints()?;

        Ok(Self {
            endpoints,
            probe_mode: config.probe_mode,
            prober,
            state: RwLock::new(MonitorState {
                status: ConnectivityStatus::Unknown,
                last_check: None,
                timeout: clamp_timeout(config.timeout, config.max_timeout),
                max_timeout: config.max_timeout,
                check_interval: config.check_interval,
                is_monitoring: false,
                stop_tx: None,
                generation: 0,
                subscribers: StatusSubscriberRegistry::new(),
            }),
            recheck_in_flight: AtomicBool::new(false),
        })
    }

    // Subscribers never run under the lock; a poisoned guard is still usable.
    fn read(&self) -> RwLockReadGuard<'_, MonitorState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MonitorState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // === Connectivity checks ===

    /// Probe every endpoint and update the published status.
    ///
    /// Probe failures only count as "unreachable". If `ctx` is cancelled
    /// before the check finishes, state is left untouched and the previous
    /// status is returned.
    pub async fn check_connectivity(&self, ctx: &CancellationToken) -> ConnectivityStatus {
        let timeout = self.timeout();

        let reachable = tokio::select! {
            _ = ctx.cancelled() => {
                debug!("Connectivity check cancelled");
                return self.status();
            }
            reachable = self.count_reachable(timeout) => reachable,
        };

        self.record(ConnectivityStatus::from_counts(reachable, self.endpoints.len()))
    }

    async fn count_reachable(&self, timeout: Duration) -> usize {
        match self.probe_mode {
            ProbeMode::Sequential => {
                let mut reachable = 0;
                for url in &self.endpoints {
                    if self.probe_one(url, timeout).await {
                        reachable += 1;
                    }
                }
                reachable
            }
            ProbeMode::Parallel => join_all(self.endpoints.iter().map(|url| self.probe_one(url, timeout)))
                .await
                .into_iter()
                .filter(|ok| *ok)
                .count(),
        }
    }

    async fn probe_one(&self, url: &Url, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.prober.probe(url, timeout)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("Probe failed for {}: {} ({})", url, e, e.kind());
                false
            }
            Err(_) => {
                debug!("Probe timed out for {} after {:?}", url, timeout);
                false
            }
        }
    }

    /// Store a check result and notify subscribers on change.
    fn record(&self, status: ConnectivityStatus) -> ConnectivityStatus {
        let now = Utc::now();
        let (previous, subscribers) = {
            let mut state = self.write();
            let previous = state.status;
            state.status = status;
            state.last_check = Some(now);
            (previous, state.subscribers.clone())
        };

        if previous != status {
            match status {
                ConnectivityStatus::Offline => {
                    warn!("Network connectivity lost - no probe endpoint reachable")
                }
                ConnectivityStatus::Limited => {
                    warn!("Network connectivity limited - some probe endpoints unreachable")
                }
                _ => info!("Network connectivity changed: {} -> {}", previous, status),
            }
            subscribers.dispatch(StatusChange {
                previous,
                current: status,
                at: now,
            });
        }

        status
    }

    /// Run a check in the background without waiting for it.
    ///
    /// Coalesces: while one triggered check is running, further requests are
    /// dropped. Must be called from within a tokio runtime.
    pub fn request_check(self: &Arc<Self>) {
        if self.recheck_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Connectivity re-check already in flight");
            return;
        }

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.check_connectivity(&CancellationToken::new()).await;
            monitor.recheck_in_flight.store(false, Ordering::SeqCst);
        });
    }

    // === Background monitoring ===

    /// Start background connectivity monitoring.
    ///
    /// No-op if already running. Otherwise runs one check immediately, then
    /// spawns a task re-checking every `check_interval` until `ctx` is
    /// cancelled or [`stop_monitoring`](Self::stop_monitoring) is called.
    pub async fn start_monitoring(self: &Arc<Self>, ctx: &CancellationToken) {
        let (stop_rx, generation, interval) = {
            let mut state = self.write();
            if state.is_monitoring {
                debug!("Background monitoring already active");
                return;
            }
            let (stop_tx, stop_rx) = oneshot::channel();
            state.is_monitoring = true;
            state.stop_tx = Some(stop_tx);
            state.generation += 1;
            (stop_rx, state.generation, state.check_interval)
        };

        self.check_connectivity(ctx).await;

        let monitor = Arc::clone(self);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            monitor.monitor_loop(ctx, stop_rx, interval).await;

            let mut state = monitor.write();
            if state.generation == generation {
                state.is_monitoring = false;
                state.stop_tx = None;
            }
            drop(state);
            info!("Background connectivity monitoring stopped");
        });
    }

    async fn monitor_loop(
        &self,
        ctx: CancellationToken,
        mut stop_rx: oneshot::Receiver<()>,
        interval: Duration,
    ) {
        info!(
            "Starting background connectivity monitoring every {:?} across {} endpoints",
            interval,
            self.endpoints.len()
        );

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                // Fires on explicit stop, or if the sender was dropped.
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    debug!("Background connectivity check");
                    self.check_connectivity(&ctx).await;
                }
            }
        }
    }

    /// Stop background monitoring. Safe to call repeatedly and concurrently.
    pub fn stop_monitoring(&self) {
        let stop_tx = {
            let mut state = self.write();
            if !state.is_monitoring {
                return;
            }
            state.is_monitoring = false;
            state.stop_tx.take()
        };

        if let Some(tx) = stop_tx {
            // The loop may already have exited on its own.
            let _ = tx.send(());
        }
    }

    // === Configuration ===

    /// Set the probe timeout, clamped into `[1s, max_timeout]`.
    pub fn set_timeout(&self, timeout: Duration) {
        let mut state = self.write();
        state.timeout = clamp_timeout(timeout, state.max_timeout);
        debug!("Probe timeout set to {:?}", state.timeout);
    }

    /// Register a status-change subscriber.
    pub fn add_status_callback<F>(&self, callback: F)
    where
        F: Fn(StatusChange) + Send + Sync + 'static,
    {
        self.write().subscribers.add(callback);
    }

    // === Accessors ===

    pub fn status(&self) -> ConnectivityStatus {
        self.read().status
    }

    /// Time of the most recent completed check.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.read().last_check
    }

    pub fn is_online(&self) -> bool {
        self.status() == ConnectivityStatus::Online
    }

    /// True for `Offline` and for `Unknown`: unestablished connectivity is
    /// treated as degraded.
    pub fn is_offline(&self) -> bool {
        matches!(
            self.status(),
            ConnectivityStatus::Offline | ConnectivityStatus::Unknown
        )
    }

    pub fn is_monitoring(&self) -> bool {
        self.read().is_monitoring
    }

    pub fn timeout(&self) -> Duration {
        self.read().timeout
    }

    pub fn max_timeout(&self) -> Duration {
        self.read().max_timeout
    }

    pub fn check_interval(&self) -> Duration {
        self.read().check_interval
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }

    /// Get a consistent snapshot of the monitor.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.read();
        MonitorSnapshot {
            status: state.status,
            last_check: state.last_check,
            timeout: state.timeout,
            max_timeout: state.max_timeout,
            check_interval: state.check_interval,
            is_monitoring: state.is_monitoring,
            endpoints: self.endpoints.iter().map(|u| u.to_string()).collect(),
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::classify::{TransportError, TransportErrorKind};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Answers for every URL whose host is in `up`.
    #[derive(Default)]
    struct FakeProber {
        up: Mutex<HashSet<String>>,
        calls: AtomicUsize,
    }

    impl FakeProber {
        fn with_up(hosts: &[&str]) -> Arc<Self> {
            let prober = Self::default();
            prober.set_up(hosts);
            Arc::new(prober)
        }

        fn set_up(&self, hosts: &[&str]) {
            *self.up.lock().unwrap() = hosts.iter().map(|h| h.to_string()).collect();
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn probe(&self, url: &Url, _timeout: Duration) -> std::result::Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let host = url.host_str().unwrap_or_default().to_string();
            if self.up.lock().unwrap().contains(&host) {
                Ok(())
            } else {
                Err(TransportError::new(
                    TransportErrorKind::ConnectionRefused,
                    "connection refused",
                ))
            }
        }
    }

    /// Never answers.
    struct HangingProber;

    #[async_trait]
    impl Prober for HangingProber {
        async fn probe(&self, _url: &Url, _timeout: Duration) -> std::result::Result<(), TransportError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn config() -> MonitorConfig {
        MonitorConfig::new(["http://a.test/", "http://b.test/", "http://c.test/"])
            .with_timeout(Duration::from_secs(2))
            .with_max_timeout(Duration::from_secs(10))
            .with_check_interval(Duration::from_secs(30))
    }

    fn monitor(prober: Arc<dyn Prober>) -> Arc<ConnectivityMonitor> {
        Arc::new(ConnectivityMonitor::with_prober(config(), prober).unwrap())
    }

    #[tokio::test]
    async fn test_initial_state() {
        let monitor = monitor(FakeProber::with_up(&[]));
        assert_eq!(monitor.status(), ConnectivityStatus::Unknown);
        assert!(monitor.last_check().is_none());
        assert!(!monitor.is_online());
        // Unknown counts as offline.
        assert!(monitor.is_offline());
        assert!(!monitor.is_monitoring());
    }

    #[tokio::test]
    async fn test_check_aggregates_reachability() {
        let prober = FakeProber::with_up(&["a.test", "b.test", "c.test"]);
        let monitor = monitor(prober.clone());
        let ctx = CancellationToken::new();

        assert_eq!(monitor.check_connectivity(&ctx).await, ConnectivityStatus::Online);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);

        prober.set_up(&["a.test"]);
        assert_eq!(monitor.check_connectivity(&ctx).await, ConnectivityStatus::Limited);

        prober.set_up(&[]);
        assert_eq!(monitor.check_connectivity(&ctx).await, ConnectivityStatus::Offline);
        assert!(monitor.is_offline());
    }

    #[tokio::test]
    async fn test_parallel_mode_counts_identically() {
        let prober = FakeProber::with_up(&["a.test", "c.test"]);
        let monitor = ConnectivityMonitor::with_prober(
            config().with_probe_mode(ProbeMode::Parallel),
            prober,
        )
        .unwrap();
        assert_eq!(
            monitor.check_connectivity(&CancellationToken::new()).await,
            ConnectivityStatus::Limited
        );
    }

    #[tokio::test]
    async fn test_callbacks_fire_only_on_transition() {
        let prober = FakeProber::with_up(&["a.test", "b.test"]);
        let monitor = monitor(prober.clone());
        let ctx = CancellationToken::new();

        let changes = Arc::new(Mutex::new(Vec::new()));
        {
            let changes = Arc::clone(&changes);
            monitor.add_status_callback(move |c| changes.lock().unwrap().push(c));
        }

        assert_eq!(monitor.check_connectivity(&ctx).await, ConnectivityStatus::Limited);
        let first_check = monitor.last_check().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(monitor.check_connectivity(&ctx).await, ConnectivityStatus::Limited);
        let second_check = monitor.last_check().unwrap();
        assert!(second_check > first_check);

        prober.set_up(&["a.test", "b.test", "c.test"]);
        assert_eq!(monitor.check_connectivity(&ctx).await, ConnectivityStatus::Online);

        // Let the dispatched tasks run.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].previous, ConnectivityStatus::Unknown);
        assert_eq!(changes[0].current, ConnectivityStatus::Limited);
        assert_eq!(changes[1].previous, ConnectivityStatus::Limited);
        assert_eq!(changes[1].current, ConnectivityStatus::Online);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_break_monitor() {
        let monitor = monitor(FakeProber::with_up(&["a.test"]));
        let delivered = Arc::new(AtomicUsize::new(0));
        monitor.add_status_callback(|_| panic!("bad subscriber"));
        {
            let delivered = Arc::clone(&delivered);
            monitor.add_status_callback(move |_| {
                delivered.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(monitor.subscriber_count(), 2);

        let status = monitor.check_connectivity(&CancellationToken::new()).await;
        assert_eq!(status, ConnectivityStatus::Limited);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.status(), ConnectivityStatus::Limited);
    }

    #[test]
    fn test_set_timeout_clamps() {
        let monitor = ConnectivityMonitor::with_prober(config(), FakeProber::with_up(&[])).unwrap();
        monitor.set_timeout(Duration::from_millis(10));
        assert_eq!(monitor.timeout(), Duration::from_secs(1));
        monitor.set_timeout(Duration::from_secs(3600));
        assert_eq!(monitor.timeout(), monitor.max_timeout());
        monitor.set_timeout(Duration::from_secs(7));
        assert_eq!(monitor.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_initial_timeout_is_clamped() {
        let monitor = ConnectivityMonitor::with_prober(
            config().with_timeout(Duration::from_secs(99)),
            FakeProber::with_up(&[]),
        )
        .unwrap();
        assert_eq!(monitor.timeout(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_bounded_by_timeout() {
        let monitor = monitor(Arc::new(HangingProber));
        let started = tokio::time::Instant::now();
        let status = monitor.check_connectivity(&CancellationToken::new()).await;
        assert_eq!(status, ConnectivityStatus::Offline);
        // Sequential: three probes at two seconds each.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_check_leaves_state_untouched() {
        let monitor = monitor(Arc::new(HangingProber));
        let ctx = CancellationToken::new();
        {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                ctx.cancel();
            });
        }

        let status = monitor.check_connectivity(&ctx).await;
        assert_eq!(status, ConnectivityStatus::Unknown);
        assert!(monitor.last_check().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitoring_loop_rechecks_on_interval() {
        let prober = FakeProber::with_up(&["a.test", "b.test", "c.test"]);
        let monitor = monitor(prober.clone());
        let ctx = CancellationToken::new();

        monitor.start_monitoring(&ctx).await;
        assert!(monitor.is_monitoring());
        assert_eq!(monitor.status(), ConnectivityStatus::Online);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);

        // Starting again is a no-op: no extra immediate check.
        monitor.start_monitoring(&ctx).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);

        prober.set_up(&[]);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(monitor.status(), ConnectivityStatus::Offline);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 6);

        monitor.stop_monitoring();
        assert!(!monitor.is_monitoring());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_context_ends_monitoring() {
        let prober = FakeProber::with_up(&["a.test"]);
        let monitor = monitor(prober.clone());
        let ctx = CancellationToken::new();

        monitor.start_monitoring(&ctx).await;
        ctx.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!monitor.is_monitoring());
        let calls = prober.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_stop_monitoring_is_idempotent() {
        let monitor = monitor(FakeProber::with_up(&["a.test"]));
        monitor.stop_monitoring();
        monitor.stop_monitoring();

        monitor.start_monitoring(&CancellationToken::new()).await;
        monitor.stop_monitoring();
        monitor.stop_monitoring();
        assert!(!monitor.is_monitoring());

        // Restart after stop works.
        monitor.start_monitoring(&CancellationToken::new()).await;
        assert!(monitor.is_monitoring());
        monitor.stop_monitoring();
    }

    #[tokio::test]
    async fn test_request_check_runs_in_background() {
        let prober = FakeProber::with_up(&["a.test", "b.test", "c.test"]);
        let monitor = monitor(prober.clone());

        monitor.request_check();
        monitor.request_check();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(monitor.status(), ConnectivityStatus::Online);
        // The second request was coalesced into the first.
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let monitor = monitor(FakeProber::with_up(&["a.test"]));
        monitor.check_connectivity(&CancellationToken::new()).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.status, ConnectivityStatus::Limited);
        assert_eq!(snapshot.endpoints.len(), 3);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "limited");
        assert_eq!(json["timeout_ms"], 2000);
        assert_eq!(json["check_interval_ms"], 30000);
        assert_eq!(json["is_monitoring"], false);
    }

    #[test]
    fn test_rejects_empty_endpoint_set() {
        let result = ConnectivityMonitor::with_prober(
            MonitorConfig::new(Vec::<String>::new()),
            FakeProber::with_up(&[]),
        );
        assert!(result.is_err());
    }
}
