//! Fixed option negotiation sent when a connection opens.
//!
//! The server announces its options once and never parses the peer's
//! answers. Replies come back as ordinary input and are discarded by the
//! IAC rule in [`extract`](super::extract); the first read after connecting
//! may therefore be swallowed whole if the peer's reply arrives with it.

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Interpret as command.
pub const IAC: u8 = 255;

/// You are not to use option.
pub const DONT: u8 = 254;

/// Please use option.
pub const DO: u8 = 253;

/// I won't use option.
pub const WONT: u8 = 252;

/// I will use option.
pub const WILL: u8 = 251;

/// Echo.
pub const TELOPT_ECHO: u8 = 1;

/// Suppress go-ahead.
pub const TELOPT_SGA: u8 = 3;

/// Window size.
pub const TELOPT_NAWS: u8 = 31;

/// Linemode.
pub const TELOPT_LINEMODE: u8 = 34;

#[rustfmt::skip]
const GREETING: [u8; 12] = [
    IAC, WILL, TELOPT_ECHO,
    IAC, WILL, TELOPT_SGA,
    IAC, DONT, TELOPT_LINEMODE,
    IAC, DO, TELOPT_NAWS,
];

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Negotiation bytes written to every connection, admitted or rejected.
///
/// The server takes over echoing and suppresses go-ahead so the client
/// switches to character mode, refuses linemode, and asks for window size.
pub fn greeting_bytes() -> &'static [u8] {
    &GREETING
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
