//! Main commands enum and shared argument groups.

use clap::{Args, Subcommand};
use espbridge_core::{FlowControl, Parity, Platform, SerialOpenOptions};

/// Available espbridge commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a toolchain program, trying each known executable name in turn
    Run {
        /// Logical tool name (e.g. "esptool.py", "espefuse.py")
        tool: String,
        /// Arguments passed to the tool unchanged
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the executable names tried for a tool, in order
    Resolve {
        /// Logical tool name
        tool: String,
        /// Resolve for another platform (windows, macos, linux)
        #[arg(long)]
        platform: Option<Platform>,
    },

    /// List serial ports
    Ports,

    /// Print everything a device sends; stdin lines are sent to it
    Monitor {
        #[command(flatten)]
        serial: SerialArgs,
        /// Print received bytes as hex instead of text
        #[arg(long)]
        hex: bool,
        /// Reset the board after opening the port
        #[arg(long)]
        reset: bool,
    },

    /// Reset a board through the RTS/DTR lines
    Reset {
        #[command(flatten)]
        serial: SerialArgs,
        /// Restart into the ROM serial bootloader
        #[arg(long)]
        bootloader: bool,
    },
}

/// Port and framing options shared by the serial commands.
#[derive(Debug, Clone, Args)]
pub struct SerialArgs {
    /// Serial device (e.g. /dev/ttyUSB0, COM3)
    pub port: String,
    /// Baud rate [default: ESPBRIDGE_DEFAULT_BAUD or 115200]
    #[arg(short, long)]
    pub baud: Option<u32>,
    /// Data bits (5-8)
    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    #[arg(long, default_value_t = 1)]
    pub stop_bits: u8,
    /// Parity (none, odd, even)
    #[arg(long, default_value_t = Parity::None)]
    pub parity: Parity,
    /// Flow control (none, software, hardware)
    #[arg(long, default_value_t = FlowControl::None)]
    pub flow_control: FlowControl,
}

impl SerialArgs {
    /// Open options for these arguments, using `default_baud` when no baud
    /// rate was given.
    pub fn to_options(&self, default_baud: u32) -> SerialOpenOptions {
        SerialOpenOptions::new(self.port.clone(), self.baud.unwrap_or(default_baud))
            .with_data_bits(self.data_bits)
            .with_stop_bits(self.stop_bits)
            .with_parity(self.parity)
            .with_flow_control(self.flow_control)
    }
}
