//! VTY server: accept loop, admission and shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::admission::AdmissionController;
use crate::config::GlobalConfig;
use crate::handler::{CommandHandler, EchoHandler};
use crate::listener::Listener;
use crate::session::{capacity_notice, reject, Session};
use crate::types::Result;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// VTY server.
#[derive(Clone)]
pub struct Server {
    config: Arc<GlobalConfig>,
    admission: Arc<AdmissionController>,
    handler: Arc<dyn CommandHandler>,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Server {
    /// Create a new echo server with default configuration.
    pub fn new() -> Self {
        Self::with_config(GlobalConfig::default())
    }

    /// Create a new echo server with custom configuration.
    pub fn with_config(config: GlobalConfig) -> Self {
        Self::with_handler(config, EchoHandler)
    }

    /// Create a new server dispatching commands to `handler`.
    pub fn with_handler(config: GlobalConfig, handler: impl CommandHandler) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            admission: Arc::new(AdmissionController::new(config.max_sessions)),
            config: Arc::new(config),
            handler: Arc::new(handler),
            shutdown: Arc::new(tx),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Get the admission controller.
    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// Count admitted sessions.
    pub fn active_sessions(&self) -> usize {
        self.admission.active()
    }

    /// Handle that stops the accept loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Bind the configured address.
    pub fn bind(&self) -> Result<Listener> {
        Listener::bind(&self.config)
    }

    /// Bind and serve until shut down.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shut down.
    ///
    /// On shutdown, in-flight sessions get the configured drain period and
    /// are then aborted.
    pub async fn serve(self, listener: Listener) -> Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut tasks = JoinSet::new();
        let notice: Arc<str> =
            capacity_notice(&self.config.server_name, self.admission.capacity()).into();

        tracing::info!(
            addr = %listener.local_addr(),
            max_sessions = self.admission.capacity(),
            "Server started, waiting for connections"
        );

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.admit(stream, addr, &notice, &mut tasks),
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                _ = shutdown_rx.changed() => {}
            }
        }

        drop(listener);
        tracing::info!(in_flight = tasks.len(), "Stopped accepting connections");
        self.drain(tasks).await;
        tracing::info!("Server stopped");
        Ok(())
    }

    fn admit(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        notice: &Arc<str>,
        tasks: &mut JoinSet<()>,
    ) {
        match self.admission.try_admit() {
            Ok(slot) => {
                let session = Session::new(stream, slot, self.handler.clone(), self.config.clone());
                tracing::info!(
                    peer = %addr,
                    session_id = %session.id(),
                    active = self.admission.active(),
                    "New connection accepted"
                );
                tasks.spawn(session.run());
            }
            Err(e) => {
                if e.is_expected() {
                    tracing::info!(peer = %addr, code = e.code(), "Connection rejected: {}", e);
                } else {
                    tracing::warn!(peer = %addr, code = e.code(), "Connection refused: {}", e);
                }
                let notice = notice.clone();
                tasks.spawn(async move {
                    if let Err(e) = reject(stream, &notice).await {
                        tracing::debug!(peer = %addr, "Rejection notice not delivered: {}", e);
                    }
                });
            }
        }
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }

        let grace = self.config.drain_timeout();
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                log_join(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(remaining = tasks.len(), "Drain period elapsed, closing sessions");
            tasks.shutdown().await;
        }
    }
}

impl ShutdownHandle {
    /// Stop accepting connections. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.config.socket_addr())
            .field("max_sessions", &self.admission.capacity())
            .field("active", &self.admission.active())
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!("Connection task panicked: {}", e);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_handle_is_shared() {
        let server = Server::new();
        let a = server.shutdown_handle();
        let b = server.clone().shutdown_handle();

        assert!(!b.is_shutdown());
        a.shutdown();
        a.shutdown();
        assert!(b.is_shutdown());
    }

    #[test]
    fn test_capacity_follows_config() {
        let server = Server::with_config(GlobalConfig {
            max_sessions: 7,
            ..Default::default()
        });
        assert_eq!(server.admission().capacity(), 7);
        assert_eq!(server.active_sessions(), 0);
    }
}
