//! Relay daemon - line-oriented chat relay
//!
//! Accepts TCP clients, lets each log in with `login:<name>`, and relays
//! every later line to all other connected clients. Recent messages are
//! replayed to clients right after they log in.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port (7410)
//! relayd
//!
//! # Custom port and history size
//! relayd --port 9000 --history 50
//!
//! # Use LF instead of CRLF as the line delimiter
//! relayd --delimiter '\n'
//!
//! # Load settings from a TOML file, override the port from the environment
//! RELAY_PORT=7411 relayd --config relay.toml
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relayd::config::{unescape_delimiter, RelayConfig};
use relayd::registry::spawn_registry_with_history;
use relayd::server::RelayServer;

/// Relay daemon - multi-client text relay with login and history
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides RELAY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// TCP port to listen on (overrides RELAY_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of messages replayed to newly logged-in clients
    #[arg(long)]
    history: Option<usize>,

    /// Line delimiter; accepts \r, \n and \t escapes
    #[arg(long)]
    delimiter: Option<String>,

    /// Maximum inbound line length in bytes
    #[arg(long)]
    max_line_length: Option<usize>,

    /// Milliseconds a client may stall a single write before it is dropped
    #[arg(long)]
    write_timeout_ms: Option<u64>,
}

impl Args {
    /// Builds the effective configuration: defaults, file, environment, flags.
    fn into_config(self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)?,
            None => RelayConfig::default(),
        };

        config
            .apply_env()
            .context("Invalid relay environment variable")?;

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(history) = self.history {
            config.history_capacity = history;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = unescape_delimiter(&delimiter);
        }
        if let Some(max_line_length) = self.max_line_length {
            config.max_line_length = max_line_length;
        }
        if let Some(write_timeout_ms) = self.write_timeout_ms {
            config.write_timeout_ms = write_timeout_ms;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    run_daemon(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: RelayConfig) -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_core=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Relay daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Spawn the session registry
    let registry = spawn_registry_with_history(config.history()?);
    info!(
        history_capacity = config.history_capacity,
        "Session registry started"
    );

    // Create and run the server
    let server = RelayServer::new(&config, registry, cancel_token);

    info!(addr = %server.bind_addr(), "Starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Relay daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
