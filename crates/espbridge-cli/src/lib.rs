//! Command-line adapter for espbridge.
//!
//! `main.rs` parses arguments, calls [`bootstrap`] and dispatches each
//! command to a handler in [`handlers`]. Handlers are thin: they talk to the
//! spawner and the serial session from `espbridge-runtime` and format
//! results for the terminal.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap, init_tracing};
pub use commands::{Commands, SerialArgs};
pub use error::CliError;
pub use parser::Cli;
