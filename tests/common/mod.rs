//! Shared test utilities for gnss-link integration tests.
//!
//! This module provides common test infrastructure including:
//! - Serial connections wired to mock lines, a recording sink and sleeper
//! - A local TCP echo receiver

#![allow(dead_code)]

use gnss_link::control::{CancellationToken, RecordingSleeper};
use gnss_link::line::{MockLineView, MockOpener, MockSerialLine};
use gnss_link::log_sink::RecordingSink;
use gnss_link::SerialConnection;
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;

pub const DEVICE: &str = "/dev/ttyACM0";

/// Everything a test needs to observe a serial connection from outside.
pub struct SerialHarness {
    pub sink: RecordingSink,
    pub sleeper: RecordingSleeper,
    pub token: CancellationToken,
    pub attempts: Arc<Mutex<usize>>,
    pub views: Arc<Mutex<Vec<MockLineView>>>,
}

impl SerialHarness {
    /// Build a connection whose opener fails `failures` times before
    /// handing out lines made by `line`. `None` never succeeds.
    pub fn connection<F>(
        failures: Option<usize>,
        sleeper: RecordingSleeper,
        token: CancellationToken,
        target: u32,
        line: F,
    ) -> (SerialConnection, Self)
    where
        F: Fn() -> MockSerialLine + Send + Sync + 'static,
    {
        let views = Arc::new(Mutex::new(Vec::new()));
        let handed_out = Arc::clone(&views);

        let opener = match failures {
            Some(n) => MockOpener::new(move || {
                let line = line();
                handed_out.lock().push(line.view());
                line
            })
            .failing_first(n),
            None => MockOpener::never_present(),
        };

        let sink = RecordingSink::new();
        let harness = Self {
            sink: sink.clone(),
            sleeper: sleeper.clone(),
            token: token.clone(),
            attempts: opener.attempts(),
            views,
        };

        let conn = SerialConnection::new(DEVICE, target, false)
            .with_opener(Arc::new(opener))
            .with_sink(Arc::new(sink))
            .with_sleeper(Arc::new(sleeper))
            .with_cancellation(token);

        (conn, harness)
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn view(&self, index: usize) -> MockLineView {
        self.views.lock()[index].clone()
    }
}

/// Bind an echo server on an ephemeral local port. Serves one client and
/// returns when it disconnects.
pub fn spawn_echo_receiver() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind echo receiver");
    let port = listener.local_addr().expect("local addr").port().to_string();

    let handle = std::thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut buf = [0u8; 512];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stream.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            }
        }
    });

    (port, handle)
}
