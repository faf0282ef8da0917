//! Serial session runtime.
//!
//! # Structure
//!
//! - `SerialSession` - the one exclusive serial connection and its events
//! - `NativeSerialBackend` - `SerialBackend` over the `serialport` crate
//! - `MemorySerialBackend` - in-memory devices for tests and demos
//! - `list_ports` - enumerate serial devices
//! - `reset` - ESP reset and bootloader sequences over RTS/DTR

mod discovery;
mod memory;
mod native;
pub mod reset;
mod session;

pub use discovery::{PortInfo, PortKind, list_ports};
pub use memory::{MemoryPortControl, MemorySerialBackend};
pub use native::NativeSerialBackend;
pub use session::{SerialSession, get_serial_session};
