//! Terminal output for CLI commands.
//!
//! Keep this module format-only: handlers decide what to print.

use std::io::{self, Write};

use espbridge_core::{CandidateList, EventSink, SerialEventKind};
use espbridge_runtime::PortInfo;

/// Sink that writes every line to stdout.
///
/// Write errors (a closed pipe, usually) are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSink;

impl TerminalSink {
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TerminalSink {
    fn append_line(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    }
}

/// Writes serial events: device data to `out`, status and errors to `diag`.
///
/// In text mode data is written as received (line endings included). A UTF-8
/// sequence split across chunks is held back until it completes; invalid
/// bytes print as U+FFFD. In hex mode each chunk becomes one line of hex
/// pairs.
#[derive(Debug, Default)]
pub struct SerialPrinter {
    hex: bool,
    pending: Vec<u8>,
}

impl SerialPrinter {
    pub const fn new(hex: bool) -> Self {
        Self {
            hex,
            pending: Vec::new(),
        }
    }

    pub fn write_event(
        &mut self,
        out: &mut impl Write,
        diag: &mut impl Write,
        kind: &SerialEventKind,
    ) -> io::Result<()> {
        match kind {
            SerialEventKind::Data { hex: pairs, .. } if self.hex => writeln!(out, "{pairs}")?,
            SerialEventKind::Data { bytes, .. } => {
                let text = self.decode(bytes);
                write!(out, "{text}")?;
            }
            SerialEventKind::Status { text } => {
                self.flush_pending(out)?;
                writeln!(diag, "--- {text} ---")?;
            }
            SerialEventKind::Error { text } => {
                self.flush_pending(out)?;
                writeln!(diag, "--- error: {text} ---")?;
            }
        }
        out.flush()
    }

    /// Decode `bytes` after any held-back prefix, keeping an incomplete
    /// trailing sequence for the next chunk.
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buffered = std::mem::take(&mut self.pending);
        buffered.extend_from_slice(bytes);

        let mut text = String::with_capacity(buffered.len());
        let mut rest = buffered.as_slice();
        while let Err(e) = std::str::from_utf8(rest) {
            let (valid, after) = rest.split_at(e.valid_up_to());
            text.push_str(&String::from_utf8_lossy(valid));
            match e.error_len() {
                Some(len) => {
                    text.push(char::REPLACEMENT_CHARACTER);
                    rest = &after[len..];
                }
                None => {
                    self.pending = after.to_vec();
                    return text;
                }
            }
        }
        text.push_str(&String::from_utf8_lossy(rest));
        text
    }

    fn flush_pending(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        write!(out, "{}", String::from_utf8_lossy(&pending))
    }
}

/// One line per port, with the bridge chip when it is a known one.
pub fn format_port(port: &PortInfo) -> String {
    match port.bridge_chip() {
        Some(chip) => format!("{port} [{chip}]"),
        None => port.to_string(),
    }
}

/// Numbered candidate lines, in the order they are tried.
pub fn format_candidates(candidates: &CandidateList) -> Vec<String> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{:>2}. {name}", i + 1))
        .collect()
}
