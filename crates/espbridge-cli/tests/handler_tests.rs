//! Handler tests against in-memory serial devices and real `/bin/sh`
//! children.

use espbridge_cli::handlers::{monitor, reset, resolve};
use espbridge_cli::{CliConfig, CliContext, SerialArgs, bootstrap};
use espbridge_core::{FlowControl, Parity, Platform};
use espbridge_runtime::{MemoryPortControl, MemorySerialBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn context() -> (CliContext, MemoryPortControl) {
    let backend = MemorySerialBackend::new();
    let control = backend.add_port("COM-TEST");
    let ctx = bootstrap(CliConfig::default()).with_serial_backend(Arc::new(backend));
    (ctx, control)
}

fn serial_args(port: &str) -> SerialArgs {
    SerialArgs {
        port: port.to_string(),
        baud: None,
        data_bits: 8,
        stop_bits: 1,
        parity: Parity::None,
        flow_control: FlowControl::None,
    }
}

#[tokio::test]
async fn test_reset_pulses_lines_and_releases_port() {
    let (ctx, control) = context();

    assert_ok!(reset::execute(&ctx, &serial_args("COM-TEST"), false).await);
    assert_eq!(control.signals(), [(true, false), (false, false)]);
    assert!(!control.is_in_use());
    assert_eq!(
        control.last_options().map(|options| options.framing()),
        Some("115200-8-N-1".to_string())
    );
}

#[tokio::test]
async fn test_reset_into_bootloader() {
    let (ctx, control) = context();

    assert_ok!(reset::execute(&ctx, &serial_args("COM-TEST"), true).await);
    assert_eq!(
        control.signals(),
        [(true, false), (false, true), (false, false)]
    );
}

#[tokio::test]
async fn test_reset_failure_still_closes_port() {
    let (ctx, control) = context();
    control.fail_writes("line control not supported");

    assert_err!(reset::execute(&ctx, &serial_args("COM-TEST"), false).await);
    assert!(!control.is_in_use());
}

#[tokio::test]
async fn test_reset_missing_port_maps_to_unavailable() {
    let (ctx, _control) = context();

    let err = assert_err!(reset::execute(&ctx, &serial_args("COM-ABSENT"), false).await);
    let cli_err = err
        .downcast_ref::<espbridge_cli::CliError>()
        .expect("CliError");
    assert_eq!(cli_err.exit_code(), 69);
}

#[tokio::test]
async fn test_monitor_sends_input_lines_with_crlf() {
    let (ctx, control) = context();
    let session = ctx.serial_session();
    let events = ctx.bus.subscribe();
    assert_ok!(
        session
            .open(serial_args("COM-TEST").to_options(115_200))
            .await
    );

    let input: &[u8] = b"AT\nAT+GMR\n";
    let result = timeout(TEST_TIMEOUT, monitor::pump(&session, events, input, false)).await;
    assert_ok!(assert_ok!(result));
    assert_eq!(control.written(), b"AT\r\nAT+GMR\r\n");

    assert_ok!(session.close().await);
}

#[tokio::test]
async fn test_monitor_stops_when_device_fails() {
    let (ctx, control) = context();
    let session = ctx.serial_session();
    let events = ctx.bus.subscribe();
    assert_ok!(
        session
            .open(serial_args("COM-TEST").to_options(115_200))
            .await
    );

    // Input that never ends
    let (_writer, reader) = tokio::io::duplex(64);
    control.push_inbound(b"boot:0x13\r\n");
    control.fail_reads("device disconnected");

    let result = timeout(
        TEST_TIMEOUT,
        monitor::pump(&session, events, BufReader::new(reader), true),
    )
    .await;
    assert_ok!(assert_ok!(result));
    assert!(!session.is_open());
    assert!(!control.is_in_use());
}

#[test]
fn test_resolve_uses_requested_platform() {
    let (ctx, _control) = context();

    let host = resolve::candidates(&ctx, "unregistered-tool", None);
    assert_eq!(host.as_slice(), ["unregistered-tool"]);

    let windows = resolve::candidates(&ctx, "esptool.py", Some(Platform::WINDOWS));
    assert_eq!(windows.as_slice(), ["esptool.py", "esptool.exe", "esptool"]);
}

#[cfg(unix)]
mod run_handler {
    use super::*;
    use espbridge_cli::handlers::run;

    #[tokio::test]
    async fn test_run_returns_tool_exit_code() {
        let (ctx, _control) = context();
        let args = ["-c".to_string(), "exit 3".to_string()];

        let code = timeout(TEST_TIMEOUT, run::execute(&ctx, "sh", &args)).await;
        assert_eq!(assert_ok!(assert_ok!(code)), 3);
    }

    #[tokio::test]
    async fn test_run_missing_tool_exits_127() {
        let (ctx, _control) = context();

        let code = timeout(
            TEST_TIMEOUT,
            run::execute(&ctx, "espbridge-test-missing-tool", &[]),
        )
        .await;
        assert_eq!(assert_ok!(assert_ok!(code)), 127);
    }
}
