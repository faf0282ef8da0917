//! CLI-specific error types and mappings.
//!
//! Maps library errors to exit codes and user-facing messages.

use espbridge_core::{SerialError, SettingsError};
use thiserror::Error;

/// Exit code when no candidate executable of a tool could be started.
pub const EXIT_NOT_LAUNCHED: i32 = 127;

/// Exit code after Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The serial device could not be opened.
    #[error("{0}")]
    Unavailable(String),

    /// Serial I/O failed or the session was in the wrong state.
    #[error("Serial error: {0}")]
    Serial(String),

    /// IO error on the terminal.
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process execution error.
    #[error("Process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 64,            // EX_USAGE
            Self::Unavailable(_) => 69,          // EX_UNAVAILABLE
            Self::Serial(_) | Self::Io(_) => 74, // EX_IOERR
            Self::Config(_) => 78,               // EX_CONFIG
            Self::Process(_) => 71,              // EX_OSERR
        }
    }
}

impl From<SerialError> for CliError {
    fn from(err: SerialError) -> Self {
        match err {
            SerialError::InvalidParameters(msg) => Self::Arguments(msg),
            SerialError::PortUnavailable { .. } => Self::Unavailable(err.to_string()),
            SerialError::NotOpen | SerialError::AlreadyOpen { .. } | SerialError::Transport(_) => {
                Self::Serial(err.to_string())
            }
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CliError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Process(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_errors_map_to_exit_codes() {
        let cases = [
            (SerialError::invalid("data bits must be 5-8"), 64),
            (SerialError::unavailable("COM9", "no such device"), 69),
            (SerialError::NotOpen, 74),
            (SerialError::transport("broken pipe"), 74),
        ];
        for (err, code) in cases {
            assert_eq!(CliError::from(err).exit_code(), code);
        }
    }

    #[test]
    fn test_unavailable_keeps_port_in_message() {
        let err = CliError::from(SerialError::unavailable("COM9", "no such device"));
        assert!(err.to_string().contains("COM9"));
    }

    #[test]
    fn test_settings_error_is_config() {
        let err = CliError::from(SettingsError::InvalidEventCapacity(0));
        assert_eq!(err.exit_code(), 78);
    }
}
