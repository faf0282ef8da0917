//! Runtime adapters for espbridge.
//!
//! - `broadcaster`: the process-wide `StreamEvent` bus
//! - `sink`: `EventSink` implementations (tracing, buffered)
//! - `process`: the fallback spawner that runs tool invocations
//! - `serial`: the exclusive serial session, its native backend, port
//!   discovery and ESP reset sequences
#![deny(unsafe_code)]

mod broadcaster;
mod env;
pub mod process;
pub mod serial;
mod sink;

pub use broadcaster::{EventBus, get_event_bus};
pub use sink::{BufferedSink, LineEntry, TracingSink};

pub use process::{
    FallbackSpawner, InvocationHandle, InvocationReport, InvocationSummary, shutdown_child,
};

pub use serial::{
    MemoryPortControl, MemorySerialBackend, NativeSerialBackend, PortInfo, PortKind,
    SerialSession, get_serial_session, list_ports,
};

