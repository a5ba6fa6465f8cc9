//! Single-byte command codec
//!
//! Outbound commands are exactly one ASCII byte with no terminator:
//! ```text
//! Forward -> 'f'   Backward -> 'b'   Left -> 'l'   Right -> 'r'   Stop -> 's'
//! ```
//!
//! Inbound data carries no framing at all. A message is whatever a single
//! read call returned, so one logical reply may arrive split across two
//! messages or merged with the next one.

use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;

/// Directional intent requested by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Intent {
    /// Every intent, in wire-code order
    pub const ALL: [Intent; 5] = [
        Intent::Forward,
        Intent::Backward,
        Intent::Left,
        Intent::Right,
        Intent::Stop,
    ];

    /// Map a received command byte back to its intent
    pub fn from_wire(byte: u8) -> Option<Intent> {
        match byte {
            b'f' => Some(Intent::Forward),
            b'b' => Some(Intent::Backward),
            b'l' => Some(Intent::Left),
            b'r' => Some(Intent::Right),
            b's' => Some(Intent::Stop),
            _ => None,
        }
    }

    /// Lowercase name of the intent
    pub fn name(self) -> &'static str {
        match self {
            Intent::Forward => "forward",
            Intent::Backward => "backward",
            Intent::Left => "left",
            Intent::Right => "right",
            Intent::Stop => "stop",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Intent {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "forward" => Ok(Intent::Forward),
            "b" | "back" | "backward" => Ok(Intent::Backward),
            "l" | "left" => Ok(Intent::Left),
            "r" | "right" => Ok(Intent::Right),
            "s" | "stop" => Ok(Intent::Stop),
            other => Err(CodecError::UnknownIntent(other.to_string())),
        }
    }
}

/// A single command byte ready for the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireCommand(u8);

impl WireCommand {
    /// The raw byte
    pub fn byte(self) -> u8 {
        self.0
    }

    /// The payload as written to the transport
    pub fn as_bytes(&self) -> &[u8] {
        std::slice::from_ref(&self.0)
    }
}

/// Encode an intent into its wire command
pub fn encode(intent: Intent) -> WireCommand {
    let byte = match intent {
        Intent::Forward => b'f',
        Intent::Backward => b'b',
        Intent::Left => b'l',
        Intent::Right => b'r',
        Intent::Stop => b's',
    };
    WireCommand(byte)
}

/// Interpret raw bytes as displayable text
///
/// Never fails; invalid UTF-8 is replaced with U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// The bytes produced by one read call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    payload: Bytes,
}

impl InboundMessage {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Copy a read buffer slice into a message
    pub fn from_read(buf: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(buf))
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Text view of the payload
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn into_text(self) -> String {
        decode(&self.payload)
    }
}
