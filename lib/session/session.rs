//! Per-connection session: greeting, read loop, dispatch and teardown.

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::admission::AdmissionSlot;
use crate::config::GlobalConfig;
use crate::handler::CommandHandler;
use crate::telnet::{extract, greeting_bytes, CommandFrame};
use crate::types::{Result, VtyError};

use super::id::generate_session_id;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Line terminator sent to peers.
pub const VTY_NEWLINE: &str = "\r\n";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Greeting and welcome are being written.
    Negotiating,
    /// Reading and dispatching commands.
    Active,
    /// Releasing the socket and admission slot.
    Closing,
    /// Fully torn down.
    Closed,
}

/// What a command handler knows about the session it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Session identifier.
    pub id: String,

    /// Remote IP address.
    pub peer: String,
}

/// One admitted connection.
///
/// Owned exclusively by the task running it; dropping it closes the socket
/// and releases the admission slot.
pub struct Session {
    id: String,
    state: SessionState,
    stream: TcpStream,
    slot: AdmissionSlot,
    handler: Arc<dyn CommandHandler>,
    config: Arc<GlobalConfig>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SessionState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Negotiating, Active) | (Negotiating, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

impl Session {
    /// Create a session for an admitted connection.
    pub fn new(
        stream: TcpStream,
        slot: AdmissionSlot,
        handler: Arc<dyn CommandHandler>,
        config: Arc<GlobalConfig>,
    ) -> Self {
        Self {
            id: generate_session_id(),
            state: SessionState::Negotiating,
            stream,
            slot,
            handler,
            config,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// Never fails: every error ends the session and is logged here.
    pub async fn run(mut self) {
        let span = tracing::info_span!("session", id = %self.id, peer = tracing::field::Empty);

        async move {
            match self.serve().await {
                Ok(()) => tracing::info!("Connection closed by the client"),
                Err(e) => tracing::warn!(code = e.code(), "Session ended: {}", e),
            }
            self.close().await;
        }
        .instrument(span)
        .await
    }

    async fn serve(&mut self) -> Result<()> {
        let ctx = self.negotiate().await?;
        self.transition(SessionState::Active);

        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];
        loop {
            self.stream
                .readable()
                .await
                .map_err(VtyError::ReadinessRegistration)?;

            let n = match self.stream.try_read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    continue;
                }
                Err(e) => return Err(VtyError::Read(e)),
            };

            match extract(&buf[..n]) {
                Some(frame) => self.dispatch(&ctx, &frame).await?,
                None => tracing::trace!(len = n, "Dropped negotiation reply"),
            }
        }
    }

    async fn negotiate(&mut self) -> Result<SessionContext> {
        let peer = self
            .stream
            .peer_addr()
            .map_err(VtyError::PeerResolution)?
            .ip()
            .to_string();
        tracing::Span::current().record("peer", peer.as_str());

        self.write(greeting_bytes()).await?;

        let welcome = format!(
            "Vty connection from {peer}.{nl}Welcome to {name}! [{count}]{nl}",
            name = self.config.server_name,
            count = self.slot.controller().active(),
            nl = VTY_NEWLINE,
        );
        self.write(welcome.as_bytes()).await?;

        tracing::info!(active = self.slot.controller().active(), "Session started");
        Ok(SessionContext {
            id: self.id.clone(),
            peer,
        })
    }

    async fn dispatch(&mut self, ctx: &SessionContext, frame: &CommandFrame) -> Result<()> {
        tracing::trace!(len = frame.len(), bytes = %frame.hex_dump(), "Frame received");

        match self.handler.execute(ctx, frame) {
            Ok(mut output) => {
                output.extend_from_slice(VTY_NEWLINE.as_bytes());
                self.write(&output).await
            }
            Err(e) => {
                tracing::warn!(code = e.code(), "Command failed: {}", e);
                Ok(())
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await.map_err(VtyError::Write)
    }

    async fn close(mut self) -> SessionState {
        self.transition(SessionState::Closing);

        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!("Socket shutdown failed: {}", e);
        }
        self.transition(SessionState::Closed);

        let Session {
            stream, slot, state, ..
        } = self;
        drop(stream);
        drop(slot);

        debug_assert!(state.is_terminal());
        tracing::debug!(?state, "Session torn down");
        state
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Text sent to a peer turned away at capacity.
pub fn capacity_notice(server_name: &str, capacity: usize) -> String {
    format!(
        "{nl}{server_name} permits only {capacity} concurrent connections!{nl}\
         please wait for another connection to close.{nl}",
        nl = VTY_NEWLINE,
    )
}

/// Turn away a connection that was not admitted.
///
/// The peer sees the greeting, then the capacity notice, then EOF.
pub async fn reject(mut stream: TcpStream, notice: &str) -> Result<()> {
    stream
        .write_all(greeting_bytes())
        .await
        .map_err(VtyError::Write)?;
    stream
        .write_all(notice.as_bytes())
        .await
        .map_err(VtyError::Write)?;
    stream.shutdown().await.map_err(VtyError::Write)?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::admission::AdmissionController;
    use crate::telnet::IAC;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    async fn read_until(stream: &mut TcpStream, needle: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 256];
        tokio::time::timeout(Duration::from_secs(5), async {
            while !buf.windows(needle.len()).any(|w| w == needle) {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "unexpected EOF");
                buf.extend_from_slice(&chunk[..n]);
            }
        })
        .await
        .expect("timed out waiting for output");
        buf
    }

    #[test]
    fn test_state_transitions() {
        use SessionState::*;
        assert!(Negotiating.can_transition_to(Active));
        assert!(Negotiating.can_transition_to(Closing));
        assert!(Active.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));

        assert!(!Active.can_transition_to(Negotiating));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Closing));
        assert!(Closed.is_terminal());
        assert!(!Closing.is_terminal());
    }

    #[test]
    fn test_capacity_notice() {
        let notice = capacity_notice("minivty", 3);
        assert!(notice.starts_with("\r\n"));
        assert!(notice.contains("permits only 3 concurrent connections"));
        assert!(notice.ends_with("close.\r\n"));
    }

    #[tokio::test]
    async fn test_session_round_trip_and_release() {
        let (mut client, server_side) = socket_pair().await;
        let controller = Arc::new(AdmissionController::new(1));
        let seen = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));

        let recorder = seen.clone();
        let handler = move |_: &SessionContext, cmd: &CommandFrame| -> Result<Vec<u8>> {
            recorder.lock().unwrap().push(cmd.as_bytes().to_vec());
            Ok(cmd.as_bytes().to_ascii_uppercase())
        };

        let session = Session::new(
            server_side,
            controller.try_admit().unwrap(),
            Arc::new(handler),
            Arc::new(GlobalConfig::default()),
        );
        assert_eq!(session.state(), SessionState::Negotiating);
        let task = tokio::spawn(session.run());

        let hello = read_until(&mut client, b"[1]\r\n").await;
        assert!(hello.starts_with(greeting_bytes()));
        assert!(String::from_utf8_lossy(&hello).contains("Vty connection from 127.0.0.1."));

        client.write_all(&[IAC, 0xfd, 0x01]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        client.write_all(b"ping\0ignored").await.unwrap();
        read_until(&mut client, b"PING\r\n").await;

        drop(client);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(controller.active(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![b"ping".to_vec()]);
    }

    #[tokio::test]
    async fn test_handler_error_keeps_session_open() {
        let (mut client, server_side) = socket_pair().await;
        let controller = Arc::new(AdmissionController::new(1));

        let handler = |_: &SessionContext, cmd: &CommandFrame| -> Result<Vec<u8>> {
            match cmd.as_bytes() {
                b"fail" => Err(VtyError::Handler("unknown command".into())),
                other => Ok(other.to_vec()),
            }
        };

        let session = Session::new(
            server_side,
            controller.try_admit().unwrap(),
            Arc::new(handler),
            Arc::new(GlobalConfig::default()),
        );
        let task = tokio::spawn(session.run());
        read_until(&mut client, b"[1]\r\n").await;

        client.write_all(b"fail\0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.write_all(b"ok\0").await.unwrap();
        let out = read_until(&mut client, b"ok\r\n").await;
        assert_eq!(out, b"ok\r\n");

        drop(client);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.active(), 0);
    }

    #[tokio::test]
    async fn test_close_reaches_terminal_state() {
        let (mut client, server_side) = socket_pair().await;
        let controller = Arc::new(AdmissionController::new(1));

        let session = Session::new(
            server_side,
            controller.try_admit().unwrap(),
            Arc::new(crate::handler::EchoHandler),
            Arc::new(GlobalConfig::default()),
        );
        assert!(!session.state().is_terminal());

        let state = session.close().await;
        assert_eq!(state, SessionState::Closed);
        assert!(state.is_terminal());
        assert_eq!(controller.active(), 0);

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_reject_writes_greeting_then_notice() {
        let (mut client, server_side) = socket_pair().await;
        let notice = capacity_notice("minivty", 1);

        reject(server_side, &notice).await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let (greeting, text) = out.split_at(greeting_bytes().len());
        assert_eq!(greeting, greeting_bytes());
        assert_eq!(text, notice.as_bytes());
    }
}
