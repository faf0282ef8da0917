//! Error types for serial session operations.
//!
//! Process failures never surface as `Result` errors: they are delivered as
//! events on the invocation stream. Only the serial session reports errors
//! to its caller.

use thiserror::Error;

/// Errors returned by serial session operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerialError {
    /// The device is missing, busy, or access was denied.
    #[error("serial port '{port}' is unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// The connection options are malformed or rejected by the transport.
    #[error("invalid serial parameters: {0}")]
    InvalidParameters(String),

    /// An operation that needs an open connection was called while closed.
    #[error("serial port is not open")]
    NotOpen,

    /// `open` was called while a connection is already open.
    #[error("serial port '{port}' is already open")]
    AlreadyOpen { port: String },

    /// Reading, writing, or line control failed on an open connection.
    #[error("serial transport error: {0}")]
    Transport(String),
}

impl SerialError {
    /// Shorthand for `PortUnavailable`.
    pub fn unavailable(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortUnavailable {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for `InvalidParameters`.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Shorthand for `Transport`.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
