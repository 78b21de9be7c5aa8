//! Command handler seam.
//!
//! The server owns framing and I/O; what a command means is up to the
//! [`CommandHandler`] it is built with.

use crate::session::SessionContext;
use crate::telnet::CommandFrame;
use crate::types::Result;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Executes one command frame on behalf of a session.
///
/// Called from the session's task, so implementations should return quickly
/// and must not block on I/O. The returned bytes are written to the peer
/// followed by a CRLF.
pub trait CommandHandler: Send + Sync + 'static {
    /// Execute `command` and return the bytes to send back.
    fn execute(&self, session: &SessionContext, command: &CommandFrame) -> Result<Vec<u8>>;
}

/// Handler that writes every command back to the peer.
///
/// The command is echoed verbatim. No space is inserted before the CRLF the
/// session appends, so a peer sees `cmd\r\n` rather than `cmd \r\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl CommandHandler for EchoHandler {
    fn execute(&self, session: &SessionContext, command: &CommandFrame) -> Result<Vec<u8>> {
        tracing::info!(
            session_id = %session.id,
            command = %command.to_string_lossy(),
            "Command received"
        );
        Ok(command.as_bytes().to_vec())
    }
}

impl<F> CommandHandler for F
where
    F: Fn(&SessionContext, &CommandFrame) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    fn execute(&self, session: &SessionContext, command: &CommandFrame) -> Result<Vec<u8>> {
        self(session, command)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
