//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define what the domain expects from infrastructure: a place to
//! append human-readable output lines, and a byte transport for the serial
//! session. They contain no implementation details and use only domain
//! types.

pub mod event_sink;
pub mod serial_transport;

pub use event_sink::{EventSink, NoopSink};
pub use serial_transport::{
    SerialBackend, SerialChannels, SerialReader, SerialWriter, is_read_timeout,
};

#[cfg(any(test, feature = "test-utils"))]
pub use event_sink::MockEventSink;
