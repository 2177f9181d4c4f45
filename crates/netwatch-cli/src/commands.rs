//! Subcommand implementations.

use crate::{FetchArgs, MonitorArgs};
use anyhow::{bail, Context, Result};
use netwatch_core::network::RequestSpec;
use netwatch_core::{
    validate_response, CancellationToken, ConnectivityMonitor, MonitorConfig, ProbeMode,
    ResilientExecutor,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Map CLI options onto a monitor configuration.
pub fn monitor_config(args: &MonitorArgs) -> MonitorConfig {
    let base = if args.endpoints.is_empty() {
        MonitorConfig::default()
    } else {
        MonitorConfig::new(args.endpoints.iter().cloned())
    };
    base.with_timeout(Duration::from_millis(args.timeout_ms))
        .with_max_timeout(Duration::from_millis(args.max_timeout_ms))
        .with_check_interval(Duration::from_millis(args.interval_ms))
        .with_probe_mode(if args.parallel {
            ProbeMode::Parallel
        } else {
            ProbeMode::Sequential
        })
}

fn build_monitor(args: &MonitorArgs) -> Result<Arc<ConnectivityMonitor>> {
    let monitor = ConnectivityMonitor::new(monitor_config(args))
        .context("Failed to create connectivity monitor")?;
    Ok(Arc::new(monitor))
}

pub async fn check(args: &MonitorArgs) -> Result<()> {
    let monitor = build_monitor(args)?;
    let status = monitor.check_connectivity(&CancellationToken::new()).await;
    info!("Connectivity: {}", status);

    println!("{}", serde_json::to_string_pretty(&monitor.snapshot())?);
    Ok(())
}

pub async fn watch(args: &MonitorArgs) -> Result<()> {
    let monitor = build_monitor(args)?;
    monitor.add_status_callback(|change| {
        info!(
            "Status changed at {}: {} -> {}",
            change.at.to_rfc3339(),
            change.previous,
            change.current
        );
    });

    let ctx = CancellationToken::new();
    monitor.start_monitoring(&ctx).await;
    info!(
        "Watching {} endpoints every {:?} (status: {})",
        monitor.endpoints().len(),
        monitor.check_interval(),
        monitor.status()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping monitor");
    monitor.stop_monitoring();
    ctx.cancel();

    println!("{}", serde_json::to_string_pretty(&monitor.snapshot())?);
    Ok(())
}

pub async fn fetch(args: &FetchArgs) -> Result<()> {
    let ctx = CancellationToken::new();

    let mut builder = ResilientExecutor::builder(args.base_url.as_str())
        .request_timeout(Duration::from_millis(args.request_timeout_ms));
    if !args.no_monitor {
        let monitor = build_monitor(&args.monitor)?;
        let status = monitor.check_connectivity(&ctx).await;
        info!("Connectivity before request: {}", status);
        builder = builder.monitor(monitor);
    }
    let executor = builder.build().context("Failed to create executor")?;

    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;
    let mut spec =
        RequestSpec::new(method, args.path.as_str()).with_headers(parse_headers(&args.headers)?);
    if let Some(data) = &args.data {
        spec = spec.with_body(data.clone());
    }

    // Ctrl-C cancels the request, including any backoff in progress.
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_ctx.cancel();
        }
    });

    let response = executor.execute(&ctx, spec).await?;
    match validate_response(&response) {
        Ok(()) => info!("HTTP {}", response.status),
        Err(e) => warn!("{}", e),
    }
    println!("{}", response.text());
    Ok(())
}

/// Parse `Name: value` pairs.
pub fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for entry in raw {
        let Some((name, value)) = entry.split_once(':') else {
            bail!("Header must look like `Name: value`, got {:?}", entry);
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in {:?}", entry))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value in {:?}", entry))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_args() -> MonitorArgs {
        MonitorArgs {
            endpoints: vec![],
            timeout_ms: 100,
            max_timeout_ms: 4000,
            interval_ms: 10_000,
            parallel: true,
        }
    }

    #[test]
    fn test_monitor_config_defaults_endpoints() {
        let config = monitor_config(&monitor_args());
        assert!(!config.endpoints.is_empty());
        assert_eq!(config.probe_mode, ProbeMode::Parallel);
        assert_eq!(config.check_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_monitor_timeout_is_clamped_on_construction() {
        let mut args = monitor_args();
        args.endpoints = vec!["http://127.0.0.1:9/".to_string()];
        let monitor = build_monitor(&args).unwrap();
        assert_eq!(monitor.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Authorization: Bearer abc".to_string(),
            "x-multi: 1".to_string(),
            "x-multi: 2".to_string(),
        ])
        .unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(headers.get_all("x-multi").iter().count(), 2);
    }

    #[test]
    fn test_parse_headers_rejects_malformed() {
        assert!(parse_headers(&["no-colon".to_string()]).is_err());
        assert!(parse_headers(&["bad name: v".to_string()]).is_err());
    }
}
