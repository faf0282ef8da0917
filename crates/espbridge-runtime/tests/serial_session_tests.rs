//! Integration tests for the serial session over in-memory devices.

use espbridge_core::{
    FlowControl, Parity, SerialError, SerialEvent, SerialEventKind, SerialOpenOptions,
    StreamEvent, hex_encode,
};
use espbridge_runtime::{
    BufferedSink, EventBus, MemoryPortControl, MemorySerialBackend, SerialSession,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    session: SerialSession,
    control: MemoryPortControl,
    backend: MemorySerialBackend,
    events: broadcast::Receiver<StreamEvent>,
}

fn harness() -> Harness {
    let backend = MemorySerialBackend::new();
    let control = backend.add_port("COM-TEST");
    let bus = Arc::new(EventBus::new());
    let events = bus.subscribe();
    let session = SerialSession::new(Arc::new(backend.clone()), bus);
    Harness {
        session,
        control,
        backend,
        events,
    }
}

fn options() -> SerialOpenOptions {
    SerialOpenOptions::new("COM-TEST", 115_200)
        .with_data_bits(8)
        .with_stop_bits(1)
        .with_parity(Parity::None)
        .with_flow_control(FlowControl::None)
}

async fn next_serial(events: &mut broadcast::Receiver<StreamEvent>) -> SerialEvent {
    loop {
        let event = timeout(EVENT_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for a serial event")
            .expect("event bus closed");
        if let StreamEvent::Serial(event) = event {
            return event;
        }
    }
}

async fn next_status(events: &mut broadcast::Receiver<StreamEvent>) -> String {
    loop {
        if let SerialEventKind::Status { text } = next_serial(events).await.kind {
            return text;
        }
    }
}

#[tokio::test]
async fn test_open_send_close_scenario() {
    let mut h = harness();

    assert_ok!(h.session.open(options()).await);
    assert!(h.session.is_open());
    assert_eq!(h.session.port().await.as_deref(), Some("COM-TEST"));
    assert_eq!(next_status(&mut h.events).await, "opened COM-TEST at 115200-8-N-1");

    assert_eq!(h.session.send(&[0x1B, 0x40]).await, Ok(2));
    assert_eq!(h.control.written(), [0x1B, 0x40]);

    assert_ok!(h.session.close().await);
    assert!(!h.session.is_open());
    assert_eq!(next_status(&mut h.events).await, "closed COM-TEST");
    assert!(!h.control.is_in_use());
}

#[tokio::test]
async fn test_invalid_parameters_leave_session_closed() {
    let mut h = harness();

    let cases = [
        SerialOpenOptions::new("", 115_200),
        SerialOpenOptions::new("COM-TEST", 0),
        options().with_data_bits(9),
        options().with_stop_bits(3),
    ];
    for case in cases {
        let err = assert_err!(h.session.open(case).await);
        assert!(matches!(err, SerialError::InvalidParameters(_)), "{err:?}");
        assert!(!h.session.is_open());
        assert!(matches!(
            next_serial(&mut h.events).await.kind,
            SerialEventKind::Error { .. }
        ));
    }
    assert!(!h.control.is_in_use());
}

#[tokio::test]
async fn test_send_on_closed_session_writes_nothing() {
    let h = harness();

    assert_eq!(h.session.send(b"AT\r\n").await, Err(SerialError::NotOpen));
    assert!(h.control.written().is_empty());
}

#[tokio::test]
async fn test_double_close_succeeds() {
    let h = harness();

    assert_ok!(h.session.open(options()).await);
    assert_ok!(h.session.close().await);
    assert_ok!(h.session.close().await);
    assert!(!h.session.is_open());

    // Closing a never-opened session also succeeds
    let fresh = harness();
    assert_ok!(fresh.session.close().await);
}

#[tokio::test]
async fn test_second_open_is_rejected() {
    let h = harness();
    h.backend.add_port("COM-OTHER");

    assert_ok!(h.session.open(options()).await);
    let err = assert_err!(
        h.session
            .open(SerialOpenOptions::new("COM-OTHER", 9600))
            .await
    );
    assert_eq!(
        err,
        SerialError::AlreadyOpen {
            port: "COM-TEST".to_string()
        }
    );
    assert!(h.session.is_open());
    assert_eq!(h.session.send(b"x").await, Ok(1));
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_missing_and_busy_ports_are_unavailable() {
    let h = harness();

    let err = assert_err!(
        h.session
            .open(SerialOpenOptions::new("COM-ABSENT", 115_200))
            .await
    );
    assert!(matches!(err, SerialError::PortUnavailable { .. }));

    h.control.set_busy(true);
    let err = assert_err!(h.session.open(options()).await);
    assert!(matches!(err, SerialError::PortUnavailable { .. }));
    assert!(!h.session.is_open());

    h.control.set_busy(false);
    assert_ok!(h.session.open(options()).await);
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_inbound_data_arrives_in_order_with_hex() {
    let mut h = harness();
    assert_ok!(h.session.open(options()).await);
    next_status(&mut h.events).await;

    h.control.push_inbound(b"ets Jun  8 2016\r\n");
    h.control.push_inbound(&[0x1B, 0x40]);

    let expected: Vec<u8> = [b"ets Jun  8 2016\r\n".as_slice(), &[0x1B, 0x40]].concat();
    let mut received = Vec::new();
    while received.len() < expected.len() {
        match next_serial(&mut h.events).await.kind {
            SerialEventKind::Data { text, hex, bytes } => {
                assert_eq!(hex, hex_encode(&bytes));
                assert_eq!(text, String::from_utf8_lossy(&bytes));
                received.extend(bytes);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(received, expected);
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_read_failure_reports_error_before_closed() {
    let mut h = harness();
    assert_ok!(h.session.open(options()).await);
    next_status(&mut h.events).await;

    h.control.fail_reads("device disconnected");

    match next_serial(&mut h.events).await.kind {
        SerialEventKind::Error { text } => assert!(text.contains("device disconnected")),
        other => panic!("expected error first, got {other:?}"),
    }
    assert_eq!(next_status(&mut h.events).await, "closed COM-TEST");
    assert!(!h.session.is_open());
    assert!(!h.control.is_in_use());
    assert_eq!(h.session.send(b"x").await, Err(SerialError::NotOpen));
}

#[tokio::test]
async fn test_write_failure_closes_connection() {
    let mut h = harness();
    assert_ok!(h.session.open(options()).await);
    next_status(&mut h.events).await;

    h.control.fail_writes("broken pipe");
    let err = assert_err!(h.session.send(b"hello").await);
    assert!(matches!(err, SerialError::Transport(_)));
    assert!(!h.session.is_open());

    assert!(matches!(
        next_serial(&mut h.events).await.kind,
        SerialEventKind::Error { .. }
    ));
    assert_eq!(next_status(&mut h.events).await, "closed COM-TEST");
}

#[tokio::test]
async fn test_send_reports_partial_acceptance() {
    let h = harness();
    assert_ok!(h.session.open(options()).await);

    h.control.set_max_write(Some(0));
    assert_eq!(h.session.send(b"abc").await, Ok(0));
    h.control.set_max_write(Some(2));
    assert_eq!(h.session.send(b"abcde").await, Ok(5));
    assert_eq!(h.control.written(), b"abcde");
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_set_signals() {
    let mut h = harness();

    assert_eq!(
        h.session.set_signals(true, false).await,
        Err(SerialError::NotOpen)
    );

    assert_ok!(h.session.open(options()).await);
    next_status(&mut h.events).await;
    assert_ok!(h.session.set_signals(true, false).await);
    assert_eq!(next_status(&mut h.events).await, "signals RTS=on DTR=off");
    assert_eq!(h.control.signals(), [(true, false)]);
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_reopen_after_close_uses_new_options() {
    let h = harness();

    assert_ok!(h.session.open(options()).await);
    assert_ok!(h.session.close().await);
    assert_ok!(
        h.session
            .open(options().with_parity(Parity::Even).with_stop_bits(2))
            .await
    );
    let used = h.control.last_options().unwrap();
    assert_eq!(used.framing(), "115200-8-E-2");
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_status_and_error_text_reach_the_sink() {
    let backend = MemorySerialBackend::new();
    let control = backend.add_port("COM-TEST");
    let sink = Arc::new(BufferedSink::new(16));
    let session = SerialSession::with_sink(
        Arc::new(backend),
        Arc::new(EventBus::new()),
        64,
        Arc::clone(&sink) as Arc<dyn espbridge_core::EventSink>,
    );

    assert_err!(
        session
            .open(SerialOpenOptions::new("COM-ABSENT", 115_200))
            .await
    );
    assert_ok!(session.open(options()).await);
    control.push_inbound(b"data is not logged");
    assert_ok!(session.close().await);

    let lines: Vec<String> = sink.lines().into_iter().map(|entry| entry.line).collect();
    assert_eq!(lines.len(), 3, "{lines:?}");
    assert!(lines[0].contains("COM-ABSENT"));
    assert_eq!(lines[1], "opened COM-TEST at 115200-8-N-1");
    assert_eq!(lines[2], "closed COM-TEST");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_is_open_when_opened_status_arrives() {
    let backend = MemorySerialBackend::new();
    backend.add_port("COM-TEST");
    let bus = Arc::new(EventBus::new());
    let session = SerialSession::new(Arc::new(backend), Arc::clone(&bus));

    for _ in 0..50 {
        let mut events = bus.subscribe();
        let observer = session.clone();
        let seen = tokio::spawn(async move {
            loop {
                if next_status(&mut events).await.starts_with("opened") {
                    return observer.is_open();
                }
            }
        });
        assert_ok!(session.open(options()).await);
        assert!(seen.await.unwrap(), "opened status seen before the session was open");
        assert_ok!(session.close().await);
    }
}

#[tokio::test]
async fn test_opened_status_precedes_queued_data() {
    let mut h = harness();
    h.control.push_inbound(b"boot");

    assert_ok!(h.session.open(options()).await);
    let first = next_serial(&mut h.events).await;
    assert!(
        matches!(&first.kind, SerialEventKind::Status { text } if text.starts_with("opened")),
        "{first:?}"
    );
    assert_ok!(h.session.close().await);
}

#[tokio::test]
async fn test_close_waits_for_in_flight_send() {
    let h = harness();
    assert_ok!(h.session.open(options()).await);
    h.control.set_write_delay(Duration::from_millis(200));

    let sender = h.session.clone();
    let send = tokio::spawn(async move { sender.send(b"abc").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_ok!(h.session.close().await);
    assert_eq!(send.await.unwrap(), Ok(3));
    assert_eq!(h.control.written(), b"abc");
    assert!(!h.session.is_open());
    assert_eq!(h.session.send(b"x").await, Err(SerialError::NotOpen));
}

#[tokio::test]
async fn test_concurrent_open_admits_one_connection() {
    let h = harness();

    let (first, second) = tokio::join!(h.session.open(options()), h.session.open(options()));
    let already_open = SerialError::AlreadyOpen {
        port: "COM-TEST".to_string(),
    };
    match (first, second) {
        (Ok(()), Err(e)) | (Err(e), Ok(())) => assert_eq!(e, already_open),
        other => panic!("expected exactly one open to succeed: {other:?}"),
    }
    assert!(h.session.is_open());
    assert_ok!(h.session.close().await);
}
