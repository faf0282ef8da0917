//! Serial port enumeration.

use serde::Serialize;
use serialport::SerialPortType;
use std::fmt;
use tracing::warn;

/// USB vendor ids of the bridge chips found on ESP development boards.
const KNOWN_BRIDGE_VIDS: &[(u16, &str)] = &[
    (0x303A, "Espressif USB-JTAG/Serial"),
    (0x10C4, "Silicon Labs CP210x"),
    (0x1A86, "WCH CH34x"),
    (0x0403, "FTDI"),
];

/// How a serial port is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PortKind {
    #[serde(rename_all = "camelCase")]
    Usb {
        vid: u16,
        pid: u16,
        serial_number: Option<String>,
        manufacturer: Option<String>,
        product: Option<String>,
    },
    Pci,
    Bluetooth,
    Unknown,
}

/// An available serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub name: String,
    pub kind: PortKind,
}

impl PortInfo {
    /// Name of the USB bridge chip when the vendor id is a known one.
    pub fn bridge_chip(&self) -> Option<&'static str> {
        match self.kind {
            PortKind::Usb { vid, .. } => KNOWN_BRIDGE_VIDS
                .iter()
                .find(|(known, _)| *known == vid)
                .map(|(_, name)| *name),
            _ => None,
        }
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PortKind::Usb {
                vid, pid, product, ..
            } => {
                write!(f, "{} (USB {vid:04x}:{pid:04x}", self.name)?;
                if let Some(product) = product {
                    write!(f, " {product}")?;
                }
                f.write_str(")")
            }
            PortKind::Pci => write!(f, "{} (PCI)", self.name),
            PortKind::Bluetooth => write!(f, "{} (Bluetooth)", self.name),
            PortKind::Unknown => f.write_str(&self.name),
        }
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let kind = match info.port_type {
            SerialPortType::UsbPort(usb) => PortKind::Usb {
                vid: usb.vid,
                pid: usb.pid,
                serial_number: usb.serial_number,
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            SerialPortType::PciPort => PortKind::Pci,
            SerialPortType::BluetoothPort => PortKind::Bluetooth,
            SerialPortType::Unknown => PortKind::Unknown,
        };
        Self {
            name: info.port_name,
            kind,
        }
    }
}

/// List available serial ports, sorted by name.
///
/// Enumeration failures are logged and yield an empty list.
pub fn list_ports() -> Vec<PortInfo> {
    match serialport::available_ports() {
        Ok(ports) => {
            let mut ports: Vec<PortInfo> = ports.into_iter().map(PortInfo::from).collect();
            ports.sort_by(|a, b| a.name.cmp(&b.name));
            ports
        }
        Err(e) => {
            warn!(error = %e, "Failed to enumerate serial ports");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_port(vid: u16) -> PortInfo {
        PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            kind: PortKind::Usb {
                vid,
                pid: 0xEA60,
                serial_number: None,
                manufacturer: None,
                product: Some("CP2102N".to_string()),
            },
        }
    }

    #[test]
    fn test_known_bridge_chips() {
        assert_eq!(usb_port(0x10C4).bridge_chip(), Some("Silicon Labs CP210x"));
        assert_eq!(usb_port(0x1234).bridge_chip(), None);
        let pci = PortInfo {
            name: "COM1".to_string(),
            kind: PortKind::Pci,
        };
        assert_eq!(pci.bridge_chip(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            usb_port(0x10C4).to_string(),
            "/dev/ttyUSB0 (USB 10c4:ea60 CP2102N)"
        );
    }

    #[test]
    fn test_serialization_tags_kind() {
        let json = serde_json::to_string(&usb_port(0x303A)).unwrap();
        assert!(json.contains("\"type\":\"usb\""));
        assert!(json.contains("\"vid\":12346"));
    }

    #[test]
    fn test_list_ports_does_not_fail() {
        let ports = list_ports();
        assert!(ports.windows(2).all(|pair| pair[0].name <= pair[1].name));
    }
}
