//! Child output forwarding (non-UTF8-safe).
//!
//! Flashing tools can emit non-UTF8 bytes (progress bars, raw device
//! output). `BufReader::lines()` would end the reader on the first invalid
//! byte, so lines are read as bytes and decoded lossily.

use espbridge_core::{EventSink, InvocationId, ProcessEvent, ProcessEventKind};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::broadcaster::EventBus;

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Delivers the events of one invocation to the bus, the invocation's
/// private channel, and (for text) the sink.
#[derive(Clone)]
pub(crate) struct InvocationEmitter {
    id: InvocationId,
    bus: Arc<EventBus>,
    private_tx: mpsc::UnboundedSender<ProcessEvent>,
    sink: Arc<dyn EventSink>,
}

impl InvocationEmitter {
    pub(crate) fn new(
        id: InvocationId,
        bus: Arc<EventBus>,
        private_tx: mpsc::UnboundedSender<ProcessEvent>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id,
            bus,
            private_tx,
            sink,
        }
    }

    pub(crate) fn emit(&self, kind: ProcessEventKind) {
        let event = ProcessEvent::new(self.id, kind);
        // The handle may already be dropped
        let _ = self.private_tx.send(event.clone());
        self.bus.publish(event);
    }

    /// Forward a line of text to the sink only.
    pub(crate) fn append_line(&self, line: &str) {
        self.sink.append_line(line);
    }

    fn line(&self, stream: StreamKind, line: String) {
        self.sink.append_line(&line);
        self.emit(match stream {
            StreamKind::Stdout => ProcessEventKind::Stdout { line },
            StreamKind::Stderr => ProcessEventKind::Stderr { line },
        });
    }
}

/// Spawn a task forwarding every line of `stream` until EOF or read error.
pub(crate) fn spawn_line_forwarder(
    stream: impl AsyncRead + Unpin + Send + 'static,
    kind: StreamKind,
    emitter: InvocationEmitter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let stream_type = kind.label();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    debug!(invocation = %emitter.id, %stream_type, "{line}");
                    emitter.line(kind, line);
                }
                Err(e) => {
                    debug!(invocation = %emitter.id, %stream_type, error = %e, "Output reader exiting due to read error");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use espbridge_core::ports::MockEventSink;

    fn emitter_with(
        sink: MockEventSink,
    ) -> (InvocationEmitter, mpsc::UnboundedReceiver<ProcessEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = InvocationEmitter::new(
            InvocationId::new(),
            Arc::new(EventBus::new()),
            tx,
            Arc::new(sink),
        );
        (emitter, rx)
    }

    #[tokio::test]
    async fn test_lines_are_trimmed_and_decoded_lossily() {
        let mut sink = MockEventSink::new();
        sink.expect_append_line().times(3).return_const(());
        let (emitter, mut rx) = emitter_with(sink);

        let input: &[u8] = b"first\r\nbad \xFF byte\nlast without newline";
        spawn_line_forwarder(input, StreamKind::Stderr, emitter)
            .await
            .unwrap();

        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event.kind {
                ProcessEventKind::Stderr { line } => lines.push(line),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(lines, ["first", "bad \u{FFFD} byte", "last without newline"]);
    }

    #[tokio::test]
    async fn test_empty_stream_emits_nothing() {
        let mut sink = MockEventSink::new();
        sink.expect_append_line().never();
        let (emitter, mut rx) = emitter_with(sink);

        spawn_line_forwarder(&b""[..], StreamKind::Stdout, emitter)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
