//! Pooled HTTP client (v1)
//!
//! Fetches a list of URLs through one shared connection pool and reports
//! what the pool did.
//!
//! # Architecture Overview
//!
//! ```text
//!     URLs ──▶ worker tasks (bounded by --concurrency)
//!                 │
//!                 ▼
//!          ┌──────────────┐   acquire/release   ┌─────────────────────┐
//!          │ ClientHandle │ ──────────────────▶ │   ConnectionPool    │
//!          │ retry policy │                     │ per-route + total   │
//!          │ keep-alive   │ ◀────────────────── │ caps, idle eviction │
//!          └──────────────┘      leases         └──────────┬──────────┘
//!                                                          │ dial
//!                                                          ▼
//!                                                ┌───────────────────┐
//!                                                │   HttpConnector   │ ──▶ origin
//!                                                │ DNS/TCP/TLS/HTTP1 │
//!                                                └───────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use pooled_http::config::{load_config, ClientConfig};
use pooled_http::lifecycle::signals::wait_for_signal;
use pooled_http::observability::{logging, metrics};
use pooled_http::{ClientContext, Shutdown, ShutdownGuard};

#[derive(Parser)]
#[command(name = "pooled-http")]
#[command(about = "Fetch URLs through a shared, bounded connection pool", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Requests in flight at once
    #[arg(short = 'n', long, default_value_t = 8)]
    concurrency: usize,

    /// Fetch every URL this many times
    #[arg(short, long, default_value_t = 1)]
    repeat: usize,

    /// URLs to fetch
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        max_total = config.max_total_connections,
        per_route_max = config.per_route_max_connections,
        max_retries = config.max_retries,
        "pooled-http starting"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => metrics::install_exporter(addr)?,
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let context = Arc::new(ClientContext::from_config(config)?);
    let guard = ShutdownGuard::new(Arc::clone(&context));
    let client = context.client();

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal, "Shutdown signal received");
            shutdown.trigger();
        });
    }

    let permits = Arc::new(Semaphore::new(cli.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let started = Instant::now();

    for _ in 0..cli.repeat {
        for url in &cli.urls {
            let client = client.clone();
            let permits = Arc::clone(&permits);
            let shutdown = shutdown.clone();
            let url = url.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                if shutdown.is_triggered() {
                    return;
                }
                let fetch_started = Instant::now();
                tokio::select! {
                    result = client.get(&url) => match result {
                        Ok(response) => println!(
                            "{} {} {} bytes {:?}",
                            response.status().as_u16(),
                            url,
                            response.body().len(),
                            fetch_started.elapsed()
                        ),
                        Err(e) => println!("ERR {} {} ({:?})", url, e, e.fault_kind()),
                    },
                    _ = shutdown.wait() => {}
                }
            });
        }
    }

    let drained = tokio::select! {
        _ = async { while tasks.join_next().await.is_some() {} } => true,
        _ = shutdown.wait() => false,
    };
    if !drained {
        tracing::info!(remaining = tasks.len(), "Abandoning outstanding requests");
        tasks.abort_all();
    }

    let stats = client.stats();
    println!(
        "pool: created={} reused={} closed={} idle={} leased={} elapsed={:?}",
        stats.created,
        stats.reused,
        stats.closed,
        stats.idle,
        stats.leased,
        started.elapsed()
    );
    for (route, route_stats) in &stats.routes {
        println!("  {route}: idle={} leased={}", route_stats.idle, route_stats.leased);
    }

    shutdown.trigger();
    drop(guard);
    tracing::info!("Shutdown complete");
    Ok(())
}
