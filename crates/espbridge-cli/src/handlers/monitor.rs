//! Monitor command handler.
//!
//! Prints what the device sends and forwards stdin lines to it, each
//! terminated with CRLF. Stops on stdin EOF, Ctrl-C, or when the session
//! closes because of a transport error.

use std::io;

use anyhow::Result;
use espbridge_core::{SerialEventKind, StreamEvent};
use espbridge_runtime::SerialSession;
use espbridge_runtime::serial::reset::hard_reset;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::bootstrap::CliContext;
use crate::commands::SerialArgs;
use crate::error::CliError;
use crate::presentation::SerialPrinter;

/// Execute the monitor command.
pub async fn execute(ctx: &CliContext, serial: &SerialArgs, hex: bool, reset: bool) -> Result<()> {
    let session = ctx.serial_session();
    // Subscribe first so the "opened" status is printed too
    let events = ctx.bus.subscribe();
    session
        .open(serial.to_options(ctx.settings.default_baud))
        .await
        .map_err(CliError::from)?;

    let result = attach(&session, events, hex, reset).await;
    session.close().await.map_err(CliError::from)?;
    Ok(result?)
}

async fn attach(
    session: &SerialSession,
    events: broadcast::Receiver<StreamEvent>,
    hex: bool,
    reset: bool,
) -> Result<(), CliError> {
    if reset {
        hard_reset(session).await?;
    }
    eprintln!("--- Ctrl-C or end of input to exit ---");
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = pump(session, events, stdin, hex) => result,
        result = signal::ctrl_c() => result.map_err(CliError::from),
    }
}

/// Copy serial events to the terminal and `input` lines to the device until
/// `input` ends or the session closes.
pub async fn pump<R>(
    session: &SerialSession,
    mut events: broadcast::Receiver<StreamEvent>,
    input: R,
    hex: bool,
) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut printer = SerialPrinter::new(hex);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(StreamEvent::Serial(event)) => {
                    printer.write_event(&mut io::stdout(), &mut io::stderr(), &event.kind)?;
                    if matches!(event.kind, SerialEventKind::Status { .. }) && !session.is_open() {
                        return Ok(());
                    }
                }
                Ok(StreamEvent::Process(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Monitor fell behind, serial events dropped");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    let mut bytes = line.into_bytes();
                    bytes.extend_from_slice(b"\r\n");
                    session.send(&bytes).await?;
                }
                None => return Ok(()),
            },
        }
    }
}
