//! `SerialBackend` over the `serialport` crate.

use espbridge_core::{
    FlowControl, Parity, SerialBackend, SerialChannels, SerialError, SerialOpenOptions,
    SerialReader, SerialWriter,
};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

/// Opens real serial devices.
#[derive(Debug, Clone, Copy)]
pub struct NativeSerialBackend {
    read_timeout: Duration,
}

impl NativeSerialBackend {
    /// `read_timeout` bounds each blocking read, and with it how long
    /// `close` waits for the reader to notice.
    pub const fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for NativeSerialBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            espbridge_core::settings::DEFAULT_SERIAL_READ_TIMEOUT_MS,
        ))
    }
}

impl SerialBackend for NativeSerialBackend {
    fn open(&self, options: &SerialOpenOptions) -> Result<SerialChannels, SerialError> {
        let data_bits = match options.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(SerialError::invalid(format!("unsupported data bits {other}")));
            }
        };
        let stop_bits = match options.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(SerialError::invalid(format!("unsupported stop bits {other}")));
            }
        };
        let parity = match options.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };
        let flow_control = match options.flow_control {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        };

        debug!(port = %options.port, framing = %options.framing(), "Opening native serial port");
        let port = serialport::new(options.port.as_str(), options.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| map_open_error(&options.port, e))?;
        let reader = port
            .try_clone()
            .map_err(|e| map_open_error(&options.port, e))?;

        Ok(SerialChannels {
            reader: Box::new(NativeReader(reader)),
            writer: Box::new(NativeWriter(port)),
        })
    }
}

fn map_open_error(port: &str, err: serialport::Error) -> SerialError {
    match err.kind() {
        serialport::ErrorKind::InvalidInput => SerialError::invalid(err.description),
        // Missing device, busy, permission denied
        _ => SerialError::unavailable(port, err.description),
    }
}

struct NativeReader(Box<dyn SerialPort>);

impl SerialReader for NativeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

struct NativeWriter(Box<dyn SerialPort>);

impl SerialWriter for NativeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }

    fn set_signals(&mut self, rts: bool, dtr: bool) -> io::Result<()> {
        self.0.write_request_to_send(rts)?;
        self.0.write_data_terminal_ready(dtr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_unavailable() {
        let backend = NativeSerialBackend::default();
        let options = SerialOpenOptions::new("/dev/espbridge-does-not-exist", 115_200);
        match backend.open(&options) {
            Err(SerialError::PortUnavailable { port, .. }) => {
                assert_eq!(port, "/dev/espbridge-does-not-exist");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a device that does not exist"),
        }
    }

    #[test]
    fn test_error_mapping() {
        let invalid = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        assert_eq!(
            map_open_error("COM9", invalid),
            SerialError::InvalidParameters("bad baud".to_string())
        );
        let busy = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "Permission denied",
        );
        assert!(matches!(
            map_open_error("COM9", busy),
            SerialError::PortUnavailable { .. }
        ));
    }
}
