//! Ports command handler.

use espbridge_runtime::list_ports;

use crate::presentation::format_port;

/// Execute the ports command.
pub fn execute() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("No serial ports found.");
        return;
    }
    for port in &ports {
        println!("{}", format_port(port));
    }
}
