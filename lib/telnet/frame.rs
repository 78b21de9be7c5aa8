//! Command frame extraction.

use std::fmt::Write as _;

use super::handshake::IAC;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One delimited unit of input handed to the command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame(Vec<u8>);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CommandFrame {
    /// Raw frame bytes, without the terminating NUL.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 rendering for logs.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Hex dump with 16 bytes per row.
    pub fn hex_dump(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 3);
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(if i % 16 == 0 { '\n' } else { ' ' });
            }
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Extract the command frame from one read.
///
/// The frame runs up to the first NUL (exclusive) or to the end of the chunk.
/// Anything after the first NUL is discarded, and nothing is carried over to
/// the next read. A chunk starting with IAC is an unparsed negotiation reply
/// and yields nothing, whatever follows the marker.
pub fn extract(chunk: &[u8]) -> Option<CommandFrame> {
    match chunk.first() {
        None | Some(&IAC) => None,
        Some(_) => {
            let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
            Some(CommandFrame(chunk[..end].to_vec()))
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
