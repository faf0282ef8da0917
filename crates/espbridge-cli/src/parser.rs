//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for running ESP toolchain programs and talking to
/// boards over a serial port.
#[derive(Debug, Parser)]
#[command(name = "espbridge")]
#[command(about = "Run ESP toolchain tools and monitor serial devices")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
