//! Event sink port for human-readable output.
//!
//! The spawner forwards every stdout/stderr line of a launched tool, and the
//! text of a final launch failure, to a sink. The CLI prints to the terminal,
//! a UI adapter would append to a console widget, tests use a mock.

/// Port for appending a line of text for display.
///
/// Implementations must be thread-safe and must not block: the spawner calls
/// this from its reader tasks.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Append one line (without trailing newline).
    fn append_line(&self, line: &str);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NoopSink {
    /// Create a new no-op sink.
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for NoopSink {
    fn append_line(&self, _line: &str) {}
}
