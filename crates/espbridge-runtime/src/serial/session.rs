//! The exclusive serial session.
//!
//! One `SerialSession` owns at most one open connection. All operations on
//! the connection are serialized through one async mutex, so `close` waits
//! for an in-flight `send`, and a `send` that starts after `close` sees
//! `NotOpen`. `is_open` reads an atomic flag and never waits.
//!
//! Inbound bytes are read on the blocking pool and forwarded by a pump task
//! as `Data` events, in arrival order. Status and error text is also
//! appended to the session's sink.

use espbridge_core::ports::is_read_timeout;
use espbridge_core::settings::DEFAULT_SERIAL_READ_CHUNK;
use espbridge_core::{
    ConnectionState, EventSink, NoopSink, SerialBackend, SerialError, SerialEvent,
    SerialOpenOptions, SerialReader, SerialWriter, SessionId,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::native::NativeSerialBackend;
use crate::broadcaster::{EventBus, get_event_bus};
use crate::env::settings_from_env;
use crate::sink::TracingSink;

/// Global serial session over the native backend and the global bus,
/// logging its status text through tracing.
static SERIAL_SESSION: LazyLock<Arc<SerialSession>> = LazyLock::new(|| {
    let settings = settings_from_env("serial session");
    Arc::new(SerialSession::with_sink(
        Arc::new(NativeSerialBackend::new(settings.serial_read_timeout())),
        get_event_bus(),
        settings.serial_read_chunk,
        Arc::new(TracingSink::new()),
    ))
});

/// Get the process-wide serial session.
pub fn get_serial_session() -> Arc<SerialSession> {
    SERIAL_SESSION.clone()
}

enum ReaderMessage {
    Data(Vec<u8>),
    Failed(String),
}

/// An open connection. Owned by the session state, never shared.
struct Connection {
    session: SessionId,
    port: String,
    /// `None` only while a blocking write or line change is in flight.
    writer: Option<Box<dyn SerialWriter>>,
    stop: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    pump: JoinHandle<()>,
}

struct Inner {
    backend: Arc<dyn SerialBackend>,
    bus: Arc<EventBus>,
    sink: Arc<dyn EventSink>,
    read_chunk: usize,
    open: AtomicBool,
    state: Mutex<Option<Connection>>,
}

/// Manager of the single serial connection.
#[derive(Clone)]
pub struct SerialSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSession")
            .field("open", &self.is_open())
            .field("read_chunk", &self.inner.read_chunk)
            .finish_non_exhaustive()
    }
}

impl SerialSession {
    /// Create a closed session reading in default-sized chunks.
    pub fn new(backend: Arc<dyn SerialBackend>, bus: Arc<EventBus>) -> Self {
        Self::with_read_chunk(backend, bus, DEFAULT_SERIAL_READ_CHUNK)
    }

    /// Create a closed session reading at most `read_chunk` bytes at a time.
    pub fn with_read_chunk(
        backend: Arc<dyn SerialBackend>,
        bus: Arc<EventBus>,
        read_chunk: usize,
    ) -> Self {
        Self::with_sink(backend, bus, read_chunk, Arc::new(NoopSink))
    }

    /// Create a closed session that also appends its status and error text
    /// to `sink`.
    pub fn with_sink(
        backend: Arc<dyn SerialBackend>,
        bus: Arc<EventBus>,
        read_chunk: usize,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                bus,
                sink,
                read_chunk: read_chunk.max(1),
                open: AtomicBool::new(false),
                state: Mutex::new(None),
            }),
        }
    }

    /// Whether a connection is open. Never waits on pending I/O.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_open() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Name of the open port, if any.
    pub async fn port(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.port.clone())
    }

    /// Open a connection.
    ///
    /// Fails with `AlreadyOpen` while a connection is open; the existing one
    /// is left untouched. Every failure also emits an `Error` event.
    pub async fn open(&self, options: SerialOpenOptions) -> Result<(), SerialError> {
        let result = self.try_open(options).await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to open serial port");
            self.inner.error(SessionId::new(), e.to_string());
        }
        result
    }

    async fn try_open(&self, options: SerialOpenOptions) -> Result<(), SerialError> {
        options.validate()?;

        let mut state = self.inner.state.lock().await;
        if let Some(conn) = state.as_ref() {
            return Err(SerialError::AlreadyOpen {
                port: conn.port.clone(),
            });
        }

        let backend = Arc::clone(&self.inner.backend);
        let blocking_options = options.clone();
        let channels = tokio::task::spawn_blocking(move || backend.open(&blocking_options))
            .await
            .map_err(|e| SerialError::unavailable(&options.port, e.to_string()))??;

        let session = SessionId::new();
        let framing = options.framing();
        let opened = format!("opened {} at {framing}", options.port);
        info!(port = %options.port, %framing, %session, "Serial port opened");

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = {
            let stop = Arc::clone(&stop);
            let read_chunk = self.inner.read_chunk;
            let reader_half = channels.reader;
            tokio::task::spawn_blocking(move || read_loop(reader_half, &stop, read_chunk, &tx))
        };
        let pump = tokio::spawn(pump_events(Arc::clone(&self.inner), session, rx));

        *state = Some(Connection {
            session,
            port: options.port,
            writer: Some(channels.writer),
            stop,
            reader,
            pump,
        });
        self.inner.open.store(true, Ordering::SeqCst);
        // Subscribers reacting to this status must already see the session open.
        self.inner.status(session, opened);
        Ok(())
    }

    /// Write `bytes` and return how many the device accepted.
    ///
    /// Stops early when the device accepts nothing or a write times out; the
    /// count reflects exactly what was written. Any other write error is a
    /// transport error and closes the connection.
    pub async fn send(&self, bytes: &[u8]) -> Result<usize, SerialError> {
        let data = bytes.to_vec();
        let result = self
            .with_writer(move |writer| write_counting(writer, &data))
            .await?;
        debug!(bytes = result, "Serial data sent");
        Ok(result)
    }

    /// Drive the RTS and DTR lines.
    pub async fn set_signals(&self, rts: bool, dtr: bool) -> Result<(), SerialError> {
        self.with_writer(move |writer| writer.set_signals(rts, dtr))
            .await?;
        let state = self.inner.state.lock().await;
        if let Some(conn) = state.as_ref() {
            self.inner.status(
                conn.session,
                format!("signals RTS={} DTR={}", level(rts), level(dtr)),
            );
        }
        Ok(())
    }

    /// Close the connection. Closing a closed session succeeds.
    ///
    /// Waits for the reader to release the port before emitting the
    /// `closed` status.
    pub async fn close(&self) -> Result<(), SerialError> {
        let conn = {
            let mut state = self.inner.state.lock().await;
            let conn = state.take();
            if conn.is_some() {
                self.inner.open.store(false, Ordering::SeqCst);
            }
            conn
        };
        match conn {
            Some(conn) => {
                self.inner.finish_close(conn, false).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Run a blocking writer operation on the blocking pool while holding
    /// the state lock. An I/O failure tears the connection down.
    async fn with_writer<T, F>(&self, op: F) -> Result<T, SerialError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialWriter) -> io::Result<T> + Send + 'static,
    {
        let mut state = self.inner.state.lock().await;
        let Some(conn) = state.as_mut() else {
            return Err(SerialError::NotOpen);
        };
        let Some(mut writer) = conn.writer.take() else {
            return Err(SerialError::NotOpen);
        };

        let joined = tokio::task::spawn_blocking(move || {
            let result = op(writer.as_mut());
            (writer, result)
        })
        .await;

        let message = match joined {
            Ok((writer, Ok(value))) => {
                conn.writer = Some(writer);
                return Ok(value);
            }
            Ok((writer, Err(e))) => {
                conn.writer = Some(writer);
                e.to_string()
            }
            Err(e) => e.to_string(),
        };

        let session = conn.session;
        warn!(port = %conn.port, error = %message, "Serial transport error");
        self.inner.error(session, message.clone());
        let conn = state.take();
        self.inner.open.store(false, Ordering::SeqCst);
        drop(state);
        if let Some(conn) = conn {
            self.inner.finish_close(conn, false).await;
        }
        Err(SerialError::Transport(message))
    }
}

impl Inner {
    fn status(&self, session: SessionId, text: String) {
        self.sink.append_line(&text);
        self.bus.publish(SerialEvent::status(session, text));
    }

    fn error(&self, session: SessionId, text: String) {
        self.sink.append_line(&text);
        self.bus.publish(SerialEvent::error(session, text));
    }

    /// Stop the reader, wait for it to release the port, and report closed.
    async fn finish_close(&self, conn: Connection, from_pump: bool) {
        let Connection {
            session,
            port,
            writer,
            stop,
            reader,
            pump,
        } = conn;
        stop.store(true, Ordering::SeqCst);
        if let Err(e) = reader.await {
            warn!(%port, error = %e, "Serial reader task failed");
        }
        // The pump flushes data read before the stop; it cannot await itself
        if !from_pump {
            let _ = pump.await;
        }
        drop(writer);
        info!(%port, %session, "Serial port closed");
        self.status(session, format!("closed {port}"));
    }
}

/// Forward reader output to the bus; on a read failure, report it and
/// close the connection it belongs to.
async fn pump_events(
    inner: Arc<Inner>,
    session: SessionId,
    mut rx: mpsc::UnboundedReceiver<ReaderMessage>,
) {
    // Wait until `open` has published the opened status.
    drop(inner.state.lock().await);
    while let Some(message) = rx.recv().await {
        match message {
            ReaderMessage::Data(bytes) => {
                inner.bus.publish(SerialEvent::data(session, bytes));
            }
            ReaderMessage::Failed(text) => {
                warn!(%session, error = %text, "Serial transport error");
                inner.error(session, text);
                let conn = {
                    let mut state = inner.state.lock().await;
                    if state.as_ref().is_some_and(|conn| conn.session == session) {
                        inner.open.store(false, Ordering::SeqCst);
                        state.take()
                    } else {
                        None
                    }
                };
                if let Some(conn) = conn {
                    inner.finish_close(conn, true).await;
                }
                break;
            }
        }
    }
}

fn read_loop(
    mut reader: Box<dyn SerialReader>,
    stop: &AtomicBool,
    read_chunk: usize,
    tx: &mpsc::UnboundedSender<ReaderMessage>,
) {
    let mut buf = vec![0u8; read_chunk];
    while !stop.load(Ordering::SeqCst) {
        match reader.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if tx.send(ReaderMessage::Data(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if is_read_timeout(&e) => {}
            Err(e) => {
                let _ = tx.send(ReaderMessage::Failed(e.to_string()));
                break;
            }
        }
    }
    debug!("Serial reader exiting");
}

/// Write until everything is accepted, the device accepts nothing, or a
/// write times out.
fn write_counting(writer: &mut dyn SerialWriter, data: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) => return Err(e),
        }
    }
    if written > 0 {
        match writer.flush() {
            Err(e) if e.kind() != io::ErrorKind::TimedOut => return Err(e),
            _ => {}
        }
    }
    Ok(written)
}

const fn level(asserted: bool) -> &'static str {
    if asserted { "on" } else { "off" }
}
