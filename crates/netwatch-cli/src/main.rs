//! netwatch - diagnostic command line for the netwatch connectivity layer.
//!
//! This binary owns the lifecycle of one `ConnectivityMonitor` and one
//! `ResilientExecutor` and exposes them as `check`, `watch` and `fetch`.

mod commands;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "netwatch")]
#[command(about = "Probe network connectivity and run resilient HTTP requests")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one connectivity check and print the monitor snapshot as JSON
    Check(MonitorArgs),

    /// Monitor connectivity in the background and log every status change
    Watch(MonitorArgs),

    /// Execute one request through the resilient executor
    Fetch(FetchArgs),
}

/// Options shared by every command that builds a monitor.
#[derive(ClapArgs, Debug, Clone)]
pub struct MonitorArgs {
    /// Probe endpoint (repeatable; defaults to a built-in set)
    #[arg(short, long = "endpoint")]
    pub endpoints: Vec<String>,

    /// Per-probe timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,

    /// Upper bound for the probe timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub max_timeout_ms: u64,

    /// Interval between background checks in milliseconds
    #[arg(long, default_value = "30000")]
    pub interval_ms: u64,

    /// Probe all endpoints concurrently
    #[arg(long)]
    pub parallel: bool,
}

#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// Base URL requests are resolved against
    pub base_url: String,

    /// Path resolved against the base URL
    pub path: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(long)]
    pub data: Option<String>,

    /// Overall per-attempt timeout in milliseconds
    #[arg(long, default_value = "120000")]
    pub request_timeout_ms: u64,

    /// Skip the connectivity monitor entirely
    #[arg(long)]
    pub no_monitor: bool,

    #[command(flatten)]
    pub monitor: MonitorArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides the flag.
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Check(monitor) => commands::check(&monitor).await,
        Command::Watch(monitor) => commands::watch(&monitor).await,
        Command::Fetch(fetch) => commands::fetch(&fetch).await,
    }
}
