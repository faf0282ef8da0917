//! In-memory serial devices for tests.
//!
//! Register a port with `MemorySerialBackend::add_port`, then drive the
//! simulated device through the returned `MemoryPortControl`: feed inbound
//! bytes, inspect what the host wrote, inject failures.

use espbridge_core::{
    SerialBackend, SerialChannels, SerialError, SerialOpenOptions, SerialReader, SerialWriter,
};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct PortState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    signals: Vec<(bool, bool)>,
    read_error: Option<String>,
    write_error: Option<String>,
    max_write: Option<usize>,
    write_delay: Duration,
    busy: bool,
    handles: usize,
    last_options: Option<SerialOpenOptions>,
}

#[derive(Debug, Default)]
struct SharedPort {
    state: Mutex<PortState>,
    inbound_ready: Condvar,
}

impl SharedPort {
    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serial backend whose devices live in memory.
#[derive(Debug, Clone)]
pub struct MemorySerialBackend {
    ports: Arc<Mutex<HashMap<String, Arc<SharedPort>>>>,
    read_timeout: Duration,
}

impl Default for MemorySerialBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySerialBackend {
    pub fn new() -> Self {
        Self {
            ports: Arc::new(Mutex::new(HashMap::new())),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Register a device named `name` and return its control handle.
    pub fn add_port(&self, name: &str) -> MemoryPortControl {
        let port = Arc::new(SharedPort::default());
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&port));
        MemoryPortControl { port }
    }

    /// Remove a device, as if it was unplugged. Open handles keep working.
    pub fn remove_port(&self, name: &str) {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

impl SerialBackend for MemorySerialBackend {
    fn open(&self, options: &SerialOpenOptions) -> Result<SerialChannels, SerialError> {
        let port = self
            .ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&options.port)
            .cloned()
            .ok_or_else(|| SerialError::unavailable(&options.port, "no such device"))?;

        {
            let mut state = port.lock();
            if state.busy || state.handles > 0 {
                return Err(SerialError::unavailable(&options.port, "device or resource busy"));
            }
            state.handles = 2;
            state.read_error = None;
            state.write_error = None;
            state.last_options = Some(options.clone());
        }

        Ok(SerialChannels {
            reader: Box::new(MemoryReader {
                port: Arc::clone(&port),
                timeout: self.read_timeout,
            }),
            writer: Box::new(MemoryWriter { port }),
        })
    }
}

struct MemoryReader {
    port: Arc<SharedPort>,
    timeout: Duration,
}

impl SerialReader for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.port.lock();
        let (mut state, _) = self
            .port
            .inbound_ready
            .wait_timeout_while(state, self.timeout, |state| {
                state.inbound.is_empty() && state.read_error.is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(message) = state.read_error.take() {
            return Err(io::Error::other(message));
        }
        if state.inbound.is_empty() {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        let mut state = self.port.lock();
        state.handles = state.handles.saturating_sub(1);
    }
}

struct MemoryWriter {
    port: Arc<SharedPort>,
}

impl SerialWriter for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let delay = self.port.lock().write_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut state = self.port.lock();
        if let Some(message) = state.write_error.clone() {
            return Err(io::Error::other(message));
        }
        let n = state.max_write.map_or(buf.len(), |max| buf.len().min(max));
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn set_signals(&mut self, rts: bool, dtr: bool) -> io::Result<()> {
        let mut state = self.port.lock();
        if let Some(message) = state.write_error.clone() {
            return Err(io::Error::other(message));
        }
        state.signals.push((rts, dtr));
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let mut state = self.port.lock();
        state.handles = state.handles.saturating_sub(1);
    }
}

/// Test-side handle on one in-memory device.
#[derive(Debug, Clone)]
pub struct MemoryPortControl {
    port: Arc<SharedPort>,
}

impl MemoryPortControl {
    /// Make bytes available to the host, as if the device sent them.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.port.lock().inbound.extend(bytes.iter().copied());
        self.port.inbound_ready.notify_all();
    }

    /// Everything the host has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.port.lock().written.clone()
    }

    /// Every `(rts, dtr)` pair the host has set, in order.
    pub fn signals(&self) -> Vec<(bool, bool)> {
        self.port.lock().signals.clone()
    }

    /// Options used by the most recent successful open.
    pub fn last_options(&self) -> Option<SerialOpenOptions> {
        self.port.lock().last_options.clone()
    }

    /// Make the next read fail with `message`.
    pub fn fail_reads(&self, message: &str) {
        self.port.lock().read_error = Some(message.to_string());
        self.port.inbound_ready.notify_all();
    }

    /// Make every write and line change fail with `message`.
    pub fn fail_writes(&self, message: &str) {
        self.port.lock().write_error = Some(message.to_string());
    }

    /// Accept at most `max` bytes per write (`None` for unlimited).
    pub fn set_max_write(&self, max: Option<usize>) {
        self.port.lock().max_write = max;
    }

    /// Make every write block for `delay` before it lands.
    pub fn set_write_delay(&self, delay: Duration) {
        self.port.lock().write_delay = delay;
    }

    /// Simulate another process holding the device.
    pub fn set_busy(&self, busy: bool) {
        self.port.lock().busy = busy;
    }

    /// Whether any reader or writer handle is still alive.
    pub fn is_in_use(&self) -> bool {
        self.port.lock().handles > 0
    }
}
