//! Bridge settings and validation.
//!
//! Pure domain types: defaults, validation, and overrides from
//! `ESPBRIDGE_*` variables through an injectable lookup. Loading a `.env`
//! file is the composition root's job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::serial::DEFAULT_BAUD_RATE;

/// Default capacity of the process-wide event bus.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default time a cancelled child gets to exit after SIGTERM.
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 3_000;

/// Default time to wait for output readers after a child exits.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 2_000;

/// Default serial read timeout.
pub const DEFAULT_SERIAL_READ_TIMEOUT_MS: u64 = 50;

/// Default serial read chunk size.
pub const DEFAULT_SERIAL_READ_CHUNK: usize = 1_024;

/// Default number of lines retained by a buffered sink.
pub const DEFAULT_SINK_BUFFER_LINES: usize = 5_000;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "ESPBRIDGE_";

/// Runtime tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeSettings {
    /// Capacity of the broadcast event bus.
    pub event_capacity: usize,
    /// Grace period between SIGTERM and kill when cancelling.
    pub cancel_grace_ms: u64,
    /// Upper bound for draining output readers after exit.
    pub drain_timeout_ms: u64,
    /// Serial read timeout; bounds how quickly `close` stops the reader.
    pub serial_read_timeout_ms: u64,
    /// Maximum bytes per serial read.
    pub serial_read_chunk: usize,
    /// Lines kept by `BufferedSink`.
    pub sink_buffer_lines: usize,
    /// Baud rate used when none is given.
    pub default_baud: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BridgeSettings {
    /// Settings with every default applied.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            cancel_grace_ms: DEFAULT_CANCEL_GRACE_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            serial_read_timeout_ms: DEFAULT_SERIAL_READ_TIMEOUT_MS,
            serial_read_chunk: DEFAULT_SERIAL_READ_CHUNK,
            sink_buffer_lines: DEFAULT_SINK_BUFFER_LINES,
            default_baud: DEFAULT_BAUD_RATE,
        }
    }

    pub const fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub const fn serial_read_timeout(&self) -> Duration {
        Duration::from_millis(self.serial_read_timeout_ms)
    }

    /// Defaults overridden from the process environment, then validated.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::with_defaults().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `ESPBRIDGE_*` overrides read through `lookup`, then validate.
    ///
    /// Recognized keys: `EVENT_CAPACITY`, `CANCEL_GRACE_MS`,
    /// `DRAIN_TIMEOUT_MS`, `SERIAL_READ_TIMEOUT_MS`, `SERIAL_READ_CHUNK`,
    /// `SINK_BUFFER_LINES`, `DEFAULT_BAUD`. Unset or blank values keep the
    /// current setting.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| -> Option<(String, String)> {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (key, value))
        };

        if let Some((key, value)) = read("EVENT_CAPACITY") {
            self.event_capacity = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("CANCEL_GRACE_MS") {
            self.cancel_grace_ms = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("DRAIN_TIMEOUT_MS") {
            self.drain_timeout_ms = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("SERIAL_READ_TIMEOUT_MS") {
            self.serial_read_timeout_ms = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("SERIAL_READ_CHUNK") {
            self.serial_read_chunk = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("SINK_BUFFER_LINES") {
            self.sink_buffer_lines = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("DEFAULT_BAUD") {
            self.default_baud = parse_value(&key, &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate settings values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.event_capacity == 0 {
            return Err(SettingsError::InvalidEventCapacity(self.event_capacity));
        }
        if !(1..=1_000).contains(&self.serial_read_timeout_ms) {
            return Err(SettingsError::InvalidReadTimeout(
                self.serial_read_timeout_ms,
            ));
        }
        if !(1..=65_536).contains(&self.serial_read_chunk) {
            return Err(SettingsError::InvalidReadChunk(self.serial_read_chunk));
        }
        if self.sink_buffer_lines == 0 {
            return Err(SettingsError::InvalidSinkBuffer(self.sink_buffer_lines));
        }
        if self.default_baud == 0 {
            return Err(SettingsError::InvalidBaudRate(self.default_baud));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Event capacity must be positive, got {0}")]
    InvalidEventCapacity(usize),

    #[error("Serial read timeout must be between 1 and 1000 ms, got {0}")]
    InvalidReadTimeout(u64),

    #[error("Serial read chunk must be between 1 and 65536 bytes, got {0}")]
    InvalidReadChunk(usize),

    #[error("Sink buffer must hold at least one line, got {0}")]
    InvalidSinkBuffer(usize),

    #[error("Default baud rate must be positive, got {0}")]
    InvalidBaudRate(u32),

    #[error("Invalid value '{value}' for {key}")]
    InvalidOverride { key: String, value: String },
}
