//! CLI bootstrap - the composition root.
//!
//! This module is the only place where the CLI wires infrastructure
//! together: settings from the environment, the event bus, the fallback
//! spawner with a terminal sink, and the serial backend.

use std::sync::Arc;

use espbridge_core::{BridgeSettings, EventSink, SerialBackend};
use espbridge_runtime::{EventBus, FallbackSpawner, NativeSerialBackend, SerialSession};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::presentation::TerminalSink;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub settings: BridgeSettings,
}

impl CliConfig {
    /// Load `.env` if present, then read `ESPBRIDGE_*` overrides.
    pub fn from_env() -> Result<Self, CliError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            settings: BridgeSettings::from_env()?,
        })
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub settings: BridgeSettings,
    /// Bus shared by the spawner and serial sessions created here.
    pub bus: Arc<EventBus>,
    pub spawner: FallbackSpawner,
    serial_backend: Arc<dyn SerialBackend>,
}

impl CliContext {
    /// Use `backend` for serial sessions instead of the native one.
    #[must_use]
    pub fn with_serial_backend(mut self, backend: Arc<dyn SerialBackend>) -> Self {
        self.serial_backend = backend;
        self
    }

    /// A fresh, closed serial session publishing to this context's bus.
    pub fn serial_session(&self) -> SerialSession {
        SerialSession::with_read_chunk(
            Arc::clone(&self.serial_backend),
            Arc::clone(&self.bus),
            self.settings.serial_read_chunk,
        )
    }
}

impl std::fmt::Debug for CliContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliContext")
            .field("settings", &self.settings)
            .field("spawner", &self.spawner)
            .finish_non_exhaustive()
    }
}

/// Compose the CLI context from `config`.
pub fn bootstrap(config: CliConfig) -> CliContext {
    let settings = config.settings;
    let bus = Arc::new(EventBus::with_capacity(settings.event_capacity));
    let sink: Arc<dyn EventSink> = Arc::new(TerminalSink::new());
    let spawner = FallbackSpawner::new(sink)
        .with_bus(Arc::clone(&bus))
        .with_settings(&settings);
    let serial_backend = Arc::new(NativeSerialBackend::new(settings.serial_read_timeout()));

    CliContext {
        settings,
        bus,
        spawner,
        serial_backend,
    }
}

/// Install the tracing subscriber.
///
/// Logs go to stderr so stdout carries only tool and device output.
/// `RUST_LOG` selects the filter (default `info`); `verbose` forces `debug`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
