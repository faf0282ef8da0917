//! Reset command handler.
//!
//! Opens the port, pulses RTS/DTR, and closes it again.

use anyhow::Result;
use espbridge_runtime::serial::reset::{enter_bootloader, hard_reset};

use crate::bootstrap::CliContext;
use crate::commands::SerialArgs;
use crate::error::CliError;

/// Execute the reset command.
///
/// The port is closed even when the reset sequence fails.
pub async fn execute(ctx: &CliContext, serial: &SerialArgs, bootloader: bool) -> Result<()> {
    let session = ctx.serial_session();
    session
        .open(serial.to_options(ctx.settings.default_baud))
        .await
        .map_err(CliError::from)?;

    let result = if bootloader {
        enter_bootloader(&session).await
    } else {
        hard_reset(&session).await
    };
    session.close().await.map_err(CliError::from)?;
    result.map_err(CliError::from)?;

    if bootloader {
        println!("{} reset into the serial bootloader", serial.port);
    } else {
        println!("{} reset", serial.port);
    }
    Ok(())
}
