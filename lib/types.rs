//! Shared types and error definitions for the VTY server.

use std::net::SocketAddr;

//--------------------------------------------------------------------------------------------------
// Types: Error
//--------------------------------------------------------------------------------------------------

/// VTY server error types.
#[derive(Debug, thiserror::Error)]
pub enum VtyError {
    #[error("Failed to resolve peer address: {0}")]
    PeerResolution(#[source] std::io::Error),

    #[error("Failed to wait for socket readiness: {0}")]
    ReadinessRegistration(#[source] std::io::Error),

    #[error("Read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("Write error: {0}")]
    Write(#[source] std::io::Error),

    #[error("Maximum sessions reached ({capacity})")]
    AdmissionRejected { capacity: usize },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Command handler failed: {0}")]
    Handler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VtyError {
    /// Get the error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PeerResolution(_) => "PEER_RESOLUTION",
            Self::ReadinessRegistration(_) => "READINESS_REGISTRATION",
            Self::Read(_) => "READ_ERROR",
            Self::Write(_) => "WRITE_ERROR",
            Self::AdmissionRejected { .. } => "ADMISSION_REJECTED",
            Self::Bind { .. } => "BIND_ERROR",
            Self::Handler(_) => "HANDLER_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether this error is an expected outcome rather than a fault.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::AdmissionRejected { .. })
    }
}

/// Result type for VTY operations.
pub type Result<T> = std::result::Result<T, VtyError>;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
