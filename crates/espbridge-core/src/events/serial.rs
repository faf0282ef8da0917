//! Events emitted by the serial session.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use uuid::Uuid;

/// Identifier of one open/close cycle of the serial session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a serial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SerialEventKind {
    /// Lifecycle text such as `opened /dev/ttyUSB0 at 115200-8-N-1`.
    Status { text: String },
    /// Transport failure text.
    Error { text: String },
    /// A chunk of bytes read from the port, in arrival order.
    Data {
        /// Lossy UTF-8 rendering of the chunk.
        text: String,
        /// Uppercase hex pairs separated by single spaces.
        hex: String,
        /// Raw bytes.
        bytes: Vec<u8>,
    },
}

/// Serial event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialEvent {
    /// Producing session.
    pub session: SessionId,
    /// Event payload.
    #[serde(flatten)]
    pub kind: SerialEventKind,
}

impl SerialEvent {
    /// Status event.
    pub fn status(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: SerialEventKind::Status { text: text.into() },
        }
    }

    /// Error event.
    pub fn error(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: SerialEventKind::Error { text: text.into() },
        }
    }

    /// Data event carrying both renderings of `bytes`.
    pub fn data(session: SessionId, bytes: Vec<u8>) -> Self {
        Self {
            session,
            kind: SerialEventKind::Data {
                text: String::from_utf8_lossy(&bytes).into_owned(),
                hex: hex_encode(&bytes),
                bytes,
            },
        }
    }
}

/// Render bytes as uppercase two-digit hex separated by single spaces.
///
/// ```rust
/// assert_eq!(espbridge_core::hex_encode(&[0x1B, 0x40]), "1B 40");
/// assert_eq!(espbridge_core::hex_encode(&[]), "");
/// ```
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}
