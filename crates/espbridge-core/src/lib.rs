//! Core domain types and port definitions for espbridge.
//!
//! This crate is pure domain: it resolves logical tool names to candidate
//! executables, models invocations and serial framing, and defines the event
//! envelope and the port traits that the runtime adapters implement. It
//! performs no process or device I/O.

pub mod error;
pub mod events;
pub mod invocation;
pub mod platform;
pub mod ports;
pub mod resolver;
pub mod serial;
pub mod settings;

// Re-export commonly used types for convenience
pub use error::SerialError;
pub use events::{
    CloseReason, ExitInfo, InvocationId, ProcessEvent, ProcessEventKind, ProcessFailure,
    ProcessFailureKind, SerialEvent, SerialEventKind, SessionId, StreamEvent, hex_encode,
};
pub use invocation::{Attempt, AttemptOutcome, Invocation, InvocationOutcome, normalize_args};
pub use platform::Platform;
pub use ports::{
    EventSink, NoopSink, SerialBackend, SerialChannels, SerialReader, SerialWriter,
};
pub use resolver::{CandidateList, CandidateRule, CandidateTable, PlatformMatch, resolve};
pub use serial::{ConnectionState, FlowControl, Parity, SerialOpenOptions};
pub use settings::{BridgeSettings, SettingsError};

