//! Proxi Host Daemon - boots the appliance runtime
//!
//! Wires the panel, speech engine, app manager and keyboard together, then
//! waits for a shutdown signal.
//!
//! # Usage
//!
//! ```bash
//! # Terminal emulator display and keyboard
//! proxi-hostd
//!
//! # No screen, evdev keyboard (with the `evdev` feature)
//! proxi-hostd --display headless
//!
//! # Custom config and apps
//! proxi-hostd --config ./host.toml --apps-dir ./apps
//!
//! # Verbose logging
//! RUST_LOG=debug proxi-hostd
//! ```
//!
//! With the terminal display the screen is stdout, so logs go to
//! `proxi-hostd.log` in the data directory.
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT` (or Ctrl-C in the terminal display): graceful shutdown

mod apps;
mod host;
mod terminal;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

use proxi_core::{load_config_from_path, ConfigOverrides, DisplayBackend};

use host::Host;

/// Log file name under the data directory
const LOG_FILE: &str = "proxi-hostd.log";

/// Proxi Host Daemon - runtime host for the Proxi appliance
#[derive(Parser, Debug)]
#[command(name = "proxi-hostd")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PROXI_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Display backend (terminal, headless)
    #[arg(short = 'd', long, value_name = "BACKEND")]
    display: Option<DisplayBackend>,

    /// Directory scanned for apps
    #[arg(short = 'a', long, value_name = "DIR")]
    apps_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PROXI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level, to `log_file` if given
fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("proxi_hostd={level},proxi_core={level}"))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {parent:?}"))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {path:?}"))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }

    Ok(())
}

/// Wait for SIGTERM, SIGINT or a quit request from an input backend
async fn wait_for_shutdown(quit: Arc<Notify>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
        _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
        () = quit.notified() => info!("Quit requested, initiating shutdown"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config_from_path(args.config.clone()).context("Failed to load configuration")?;
    let mut overrides = ConfigOverrides::new();
    if let Some(backend) = args.display {
        overrides = overrides.with_backend(backend);
    }
    if let Some(dir) = args.apps_dir.clone() {
        overrides = overrides.with_apps_dir(dir);
    }
    overrides.apply(&mut config);

    let log_file = (config.display.backend == DisplayBackend::Terminal)
        .then(|| config.paths.data_dir.join(LOG_FILE));
    init_logging(&args.log_level, log_file.as_deref())?;

    info!("Proxi host daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());
    info!(source = %config.source(), backend = ?config.display.backend, "Configuration loaded");
    if let Some(ref path) = config.config_file_path {
        info!(config_path = ?path, "Config file");
    }

    let quit = Arc::new(Notify::new());
    let host = match Host::boot(&config, Arc::clone(&quit)).await {
        Ok(host) => host,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Boot failed");
            return Err(e);
        }
    };

    let result = wait_for_shutdown(quit).await;
    host.shutdown().await;

    match result {
        Ok(()) => {
            info!("Proxi host stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Host stopped with error");
            Err(e)
        }
    }
}
