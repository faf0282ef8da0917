//! Serial transport port.
//!
//! A backend opens a device and hands back two independent halves: a reader
//! owned by the session's reader thread and a writer owned by the session
//! itself. Both halves are blocking; the runtime drives them from the tokio
//! blocking pool.

use std::io;

use crate::error::SerialError;
use crate::serial::SerialOpenOptions;

/// Blocking read half of an open serial connection.
pub trait SerialReader: Send {
    /// Read available bytes into `buf`.
    ///
    /// Returns `ErrorKind::TimedOut` (or `WouldBlock`) when nothing arrived
    /// within the backend's read timeout; the caller treats that as "no data
    /// yet". Any other error ends the connection.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Blocking write half of an open serial connection.
pub trait SerialWriter: Send {
    /// Write some prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered output to the device.
    fn flush(&mut self) -> io::Result<()>;

    /// Drive the RTS and DTR modem control lines.
    fn set_signals(&mut self, rts: bool, dtr: bool) -> io::Result<()>;
}

/// The two halves of a freshly opened connection.
pub struct SerialChannels {
    pub reader: Box<dyn SerialReader>,
    pub writer: Box<dyn SerialWriter>,
}

impl std::fmt::Debug for SerialChannels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannels").finish_non_exhaustive()
    }
}

/// Opens serial devices.
///
/// `options` have already been validated by the session. A backend maps a
/// missing, busy or access-denied device to `SerialError::PortUnavailable`
/// and a framing the device rejects to `SerialError::InvalidParameters`.
pub trait SerialBackend: Send + Sync {
    /// Open the device described by `options`.
    fn open(&self, options: &SerialOpenOptions) -> Result<SerialChannels, SerialError>;
}

/// Whether a read error only means "nothing arrived before the timeout".
pub fn is_read_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_timeout_classification() {
        assert!(is_read_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_read_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_read_timeout(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
