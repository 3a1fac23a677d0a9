//! Serial connection lifecycle against mock lines.

mod common;

use common::{SerialHarness, DEVICE};
use gnss_link::control::{CancellationToken, RecordingSleeper, ThreadSleeper};
use gnss_link::line::{
    DataBits, FlowControl, LineOp, MockOpener, MockSerialLine, Parity, StopBits,
};
use gnss_link::log_sink::{RecordingSink, Severity};
use gnss_link::{ConnectError, Connection, ConnectionState, SerialConnection};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_device_plugged_in_late() {
    let (mut conn, harness) = SerialHarness::connection(
        Some(2),
        RecordingSleeper::new(),
        CancellationToken::new(),
        460800,
        || MockSerialLine::new(DEVICE, 115200),
    );

    conn.connect().unwrap();

    assert_eq!(conn.state(), ConnectionState::Connected);
    assert_eq!(harness.attempts(), 3);
    assert_eq!(
        harness.sleeper.naps(),
        vec![Duration::from_secs(1), Duration::from_secs(1)]
    );
    assert_eq!(harness.sink.count(Severity::Error), 2);
    assert_eq!(harness.view(0).baud_rate(), 460800);
}

#[test]
fn test_line_is_configured_in_order() {
    let (mut conn, harness) = SerialHarness::connection(
        Some(0),
        RecordingSleeper::new(),
        CancellationToken::new(),
        115200,
        || MockSerialLine::new(DEVICE, 9600),
    );
    conn.connect().unwrap();

    assert_eq!(
        harness.view(0).ops(),
        vec![
            LineOp::SetBaudRate(115200),
            LineOp::SetParity(Parity::None),
            LineOp::SetDataBits(DataBits::Eight),
            LineOp::SetStopBits(StopBits::One),
            LineOp::SetFlowControl(FlowControl::None),
            LineOp::RawMode {
                hardware_flow_control: false
            },
            LineOp::LowLatency,
        ]
    );
}

#[test]
fn test_cancel_after_two_retries() {
    let token = CancellationToken::new();
    let (mut conn, harness) = SerialHarness::connection(
        None,
        RecordingSleeper::cancelling(token.clone(), 2),
        token,
        115200,
        || MockSerialLine::new(DEVICE, 115200),
    );

    let err = conn.connect().unwrap_err();

    assert!(matches!(
        err,
        ConnectError::DeviceUnavailable { attempts: 2, .. }
    ));
    assert_eq!(harness.sleeper.count(), 2);
    assert_eq!(harness.attempts(), 2);
    assert_eq!(conn.state(), ConnectionState::Failed);
}

#[test]
fn test_cancel_from_another_thread_with_real_sleeps() {
    let token = CancellationToken::new();
    let opener = MockOpener::never_present();
    let attempts = opener.attempts();
    let mut conn = SerialConnection::new("/dev/ttyUSB9", 115200, false)
        .with_opener(Arc::new(opener))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_sleeper(Arc::new(ThreadSleeper))
        .with_retry_interval(Duration::from_millis(20))
        .with_cancellation(token.clone());

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let started = Instant::now();
    let err = conn.connect().unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, ConnectError::DeviceUnavailable { .. }));
    assert!(*attempts.lock() >= 2);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_io_requires_connection() {
    let mut conn = SerialConnection::new(DEVICE, 115200, false);
    let mut buf = [0u8; 16];

    assert!(matches!(
        conn.read_bytes(&mut buf),
        Err(ConnectError::NotConnected)
    ));
    assert!(matches!(
        conn.write_bytes(b"sdio, COM1, SBF, SBF\n"),
        Err(ConnectError::NotConnected)
    ));
}

#[test]
fn test_io_after_close_is_not_connected() {
    let (mut conn, harness) = SerialHarness::connection(
        Some(0),
        RecordingSleeper::new(),
        CancellationToken::new(),
        115200,
        || {
            let mut line = MockSerialLine::new(DEVICE, 115200);
            line.enqueue_read(b"$GPGGA");
            line
        },
    );
    conn.connect().unwrap();
    conn.close();
    assert_eq!(conn.state(), ConnectionState::Closed);

    let mut buf = [0u8; 16];
    assert!(matches!(
        conn.read_bytes(&mut buf),
        Err(ConnectError::NotConnected)
    ));
    assert!(matches!(
        conn.write_bytes(b"sdio, COM1, SBF, SBF\n"),
        Err(ConnectError::NotConnected)
    ));
    assert!(matches!(conn.flush(), Err(ConnectError::NotConnected)));

    // Nothing reached the released line.
    let line = harness.view(0);
    assert!(line.write_log().is_empty());
    assert!(!line.ops().contains(&LineOp::Flush));
    assert_eq!(line.releases(), 1);
}

#[test]
fn test_double_close_releases_once() {
    let (mut conn, harness) = SerialHarness::connection(
        Some(0),
        RecordingSleeper::new(),
        CancellationToken::new(),
        115200,
        || MockSerialLine::new(DEVICE, 115200),
    );
    conn.connect().unwrap();

    conn.close();
    conn.close();
    drop(conn);

    assert_eq!(harness.view(0).releases(), 1);
}

#[test]
fn test_reconnect_after_failure() {
    let token = CancellationToken::new();
    token.cancel();
    let (mut conn, _harness) = SerialHarness::connection(
        Some(0),
        RecordingSleeper::new(),
        token,
        115200,
        || MockSerialLine::new(DEVICE, 115200),
    );

    assert!(matches!(conn.connect(), Err(ConnectError::Cancelled)));
    assert_eq!(conn.state(), ConnectionState::Failed);

    let mut conn = conn.with_cancellation(CancellationToken::new());
    conn.connect().unwrap();
    assert!(conn.is_connected());
}
