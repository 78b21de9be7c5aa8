//! Telnet protocol pieces: option greeting and command framing.

mod frame;
mod handshake;

pub use frame::{extract, CommandFrame};
pub use handshake::{
    greeting_bytes, DO, DONT, IAC, TELOPT_ECHO, TELOPT_LINEMODE, TELOPT_NAWS, TELOPT_SGA, WILL,
    WONT,
};
