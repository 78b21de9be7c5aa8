//! TCP listener setup.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::GlobalConfig;
use crate::types::{Result, VtyError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Bound listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Listener {
    /// Bind to the configured address and start listening.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &GlobalConfig) -> Result<Self> {
        let addr = config.socket_addr();
        let bind_err = |source| VtyError::Bind { addr, source };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let inner = socket.listen(config.listen_backlog).map_err(bind_err)?;
        let local_addr = inner.local_addr()?;

        tracing::info!(addr = %local_addr, "Listening");
        Ok(Self { inner, local_addr })
    }

    /// Address actually bound, with the ephemeral port resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next inbound connection.
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept().await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
