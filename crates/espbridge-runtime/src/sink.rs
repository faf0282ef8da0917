//! `EventSink` adapters.

use chrono::{DateTime, Utc};
use espbridge_core::{BridgeSettings, EventSink};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::info;

use crate::env::settings_from_env;

/// Sink that turns every line into an `info!` record on the
/// `espbridge::output` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn append_line(&self, line: &str) {
        info!(target: "espbridge::output", "{line}");
    }
}

/// A line captured by `BufferedSink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineEntry {
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

/// Ring buffer of recent lines plus a live broadcast of new ones.
///
/// Suited to a console view that shows history on attach and then follows.
#[derive(Debug)]
pub struct BufferedSink {
    lines: Mutex<VecDeque<LineEntry>>,
    capacity: usize,
    broadcast_tx: broadcast::Sender<LineEntry>,
}

impl BufferedSink {
    /// Create a sink keeping at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (broadcast_tx, _) = broadcast::channel(1000);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            broadcast_tx,
        }
    }

    /// Create a sink keeping `settings.sink_buffer_lines` lines.
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self::new(settings.sink_buffer_lines)
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn lines(&self) -> Vec<LineEntry> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Receive lines appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LineEntry> {
        self.broadcast_tx.subscribe()
    }
}

impl Default for BufferedSink {
    /// Sized from `ESPBRIDGE_SINK_BUFFER_LINES`.
    fn default() -> Self {
        Self::from_settings(&settings_from_env("buffered sink"))
    }
}

impl EventSink for BufferedSink {
    fn append_line(&self, line: &str) {
        let entry = LineEntry {
            timestamp: Utc::now(),
            line: line.to_string(),
        };
        {
            let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
            if lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(entry.clone());
        }
        let _ = self.broadcast_tx.send(entry);
    }
}
