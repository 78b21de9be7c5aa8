//! Configuration for the VTY server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Conventional telnet port.
pub const DEFAULT_PORT: u16 = 23;

/// Default number of concurrently admitted sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 3;

/// Default size of a single session read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 512;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Global configuration for the VTY server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Address to listen on.
    pub bind_addr: IpAddr,

    /// Port to listen on. Zero picks an ephemeral port.
    pub port: u16,

    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,

    /// Upper bound on bytes consumed by one read.
    pub read_buffer_size: usize,

    /// Pending connection backlog passed to `listen`.
    pub listen_backlog: u32,

    /// How long in-flight sessions may run after shutdown before being aborted.
    pub drain_timeout_ms: u64,

    /// Name shown to peers in the welcome and capacity messages.
    pub server_name: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GlobalConfig {
    /// Socket address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Grace period for in-flight sessions on shutdown.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_sessions: DEFAULT_MAX_SESSIONS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            listen_backlog: 5,
            drain_timeout_ms: 5000,
            server_name: "minivty".into(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
