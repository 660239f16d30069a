// SPDX-License-Identifier: MIT
//
// ANU QRNG Poller
// Copyright (c) 2025 Valer Bocan, PhD, CSSLP
// Email: valer.bocan@upt.ro
//
// Department of Computer and Information Technology
// Politehnica University of Timisoara
//
// https://github.com/vbocan/qrng-data-diode

//! ANU QRNG Poller
//!
//! Periodically fetches 1024 hex16 tokens from the ANU quantum random number API, appends
//! each valid response to `random_numbers.json` (one JSON object per line) and records each
//! failed attempt in `error.log`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     GET       ┌──────────────┐    append     ┌─────────────────────┐
//! │   ANU QRNG   │ <─────────────│    Poller    │ ─────────────>│ random_numbers.json │
//! │     API      │   (HTTPS)     │  (3 tries,   │               │ error.log           │
//! └──────────────┘               │  every 60s)  │               └─────────────────────┘
//!                                └──────────────┘
//! ```
//!
//! # Behaviour
//!
//! - Up to three attempts per cycle, two seconds apart
//! - One cycle per minute, whether the previous one succeeded or not
//! - SIGINT/SIGTERM (Ctrl+C on Windows) stops the poller with exit status 0

use anu_qrng_core::{
    config::PollerConfig,
    fetcher::DefaultFetcher,
    poller::PollingLoop,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "anu-qrng-poller")]
#[command(about = "ANU QRNG Poller - Periodically collects quantum random hex data", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Cancel `cancel` on the first shutdown signal (SIGINT or SIGTERM)
///
/// Handlers are registered before this returns, so a signal delivered while the first
/// cycle is running is not lost.
fn listen_for_shutdown(cancel: CancellationToken) -> Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use futures::stream::StreamExt;
        use signal_hook::consts::signal::*;
        use signal_hook_tokio::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;

        Ok(tokio::spawn(async move {
            if let Some(signal) = signals.next().await {
                info!("Received signal: {:?}", signal);
            }
            cancel.cancel();
        }))
    }

    #[cfg(windows)]
    {
        Ok(tokio::spawn(cancel_on_ctrl_c(tokio::signal::ctrl_c(), cancel)))
    }
}

/// Cancel `cancel` once `ctrl_c` reports a delivered signal
///
/// A listener that fails leaves the token untouched and the poller running.
#[cfg_attr(not(windows), allow(dead_code))]
async fn cancel_on_ctrl_c<F>(ctrl_c: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = ctrl_c.await {
        error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Received Ctrl+C signal");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    info!("ANU QRNG Poller v{}", env!("CARGO_PKG_VERSION"));

    let config = PollerConfig::default();
    config.validate().context("Invalid poller configuration")?;

    info!("Results are appended to {}", config.results_path.display());
    info!("Failed attempts are logged to {}", config.error_log_path.display());

    let fetcher = DefaultFetcher::from_config(&config).context("Failed to create fetcher")?;
    let mut poller = PollingLoop::new(fetcher, &config);

    let cancel = CancellationToken::new();
    let signal_handle = listen_for_shutdown(cancel.clone())?;

    poller.run(&cancel).await;

    // The loop only stops once the token is cancelled, so the listener has finished.
    signal_handle.await.context("Signal listener panicked")?;

    info!("Poller shut down gracefully");
    Ok(())
}
