//! Minimal VTY server.
//!
//! Usage:
//!   minivty                          Listen on 0.0.0.0:23, 3 sessions
//!   minivty --port 2323              Listen on another port
//!   minivty --max-sessions 10        Raise the session limit

use std::net::IpAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{self, EnvFilter};

use ::minivty::{GlobalConfig, Server, ShutdownHandle};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "minivty")]
#[command(about = "Minimal telnet-style VTY server")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = minivty::config::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrent sessions
    #[arg(long, default_value_t = minivty::config::DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    /// Bytes consumed per read
    #[arg(long, default_value_t = minivty::config::DEFAULT_READ_BUFFER_SIZE)]
    read_buffer_size: usize,

    /// Listen backlog
    #[arg(long)]
    backlog: Option<u32>,

    /// Milliseconds to let sessions finish after a shutdown signal
    #[arg(long)]
    drain_timeout_ms: Option<u64>,

    /// Name shown to connecting peers
    #[arg(long)]
    name: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Cli {
    fn into_config(self) -> GlobalConfig {
        let defaults = GlobalConfig::default();
        GlobalConfig {
            bind_addr: self.bind,
            port: self.port,
            max_sessions: self.max_sessions,
            read_buffer_size: self.read_buffer_size,
            listen_backlog: self.backlog.unwrap_or(defaults.listen_backlog),
            drain_timeout_ms: self.drain_timeout_ms.unwrap_or(defaults.drain_timeout_ms),
            server_name: self.name.unwrap_or(defaults.server_name),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(?config, "Starting VTY server");

    let server = Server::with_config(config);
    let listener = server.bind().context("failed to start listener")?;

    tokio::spawn(forward_signals(server.shutdown_handle()));

    server.serve(listener).await?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Signals
//--------------------------------------------------------------------------------------------------

/// Trigger shutdown on SIGINT or SIGTERM.
async fn forward_signals(shutdown: ShutdownHandle) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::pin!(terminate);
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                terminate.await;
            }
        }
        _ = &mut terminate => {}
    }

    tracing::info!("Received shutdown signal");
    shutdown.shutdown();
}
