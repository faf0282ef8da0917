//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<...>`
//! - Thin wrappers that validate CLI input, call the runtime, and format
//!   output for the terminal
//!
//! Library errors are converted to `CliError` so `main` can pick the exit
//! code.

pub mod monitor;
pub mod ports;
pub mod reset;
pub mod resolve;
pub mod run;
