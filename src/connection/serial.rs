//! Serial transport: wait for the device, configure the line, negotiate
//! the baud rate.

use super::{Connection, ConnectionState};
use crate::config::ConnectionConfig;
use crate::control::{CancellationToken, Sleeper, ThreadSleeper};
use crate::error::ConnectError;
use crate::line::{
    LineOpener, LineSettings, NativeOpener, PortError, SerialLine, SerialLineConfigurator,
};
use crate::log_sink::{LogSink, Severity, TracingSink};
use crate::negotiation::{BaudRateNegotiator, NegotiationReport, DEFAULT_SETTLE_DELAY};
use std::sync::Arc;
use std::time::Duration;

/// Wait between attempts to open a missing device.
pub const DEFAULT_OPEN_RETRY: Duration = Duration::from_secs(1);

/// Serial connection to a receiver.
///
/// `connect()` blocks until the device can be opened. A receiver plugged in
/// after start-up is picked up on the next attempt; the wait only ends
/// when the cancellation token fires.
pub struct SerialConnection {
    device: String,
    baud_rate: u32,
    hardware_flow_control: bool,
    timeout: Duration,
    retry_interval: Duration,
    settle_delay: Duration,
    /// `None` until connected and again after `close()`.
    line: Option<Box<dyn SerialLine>>,
    state: ConnectionState,
    opener: Arc<dyn LineOpener>,
    sink: Arc<dyn LogSink>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    report: Option<NegotiationReport>,
}

impl SerialConnection {
    pub fn new(device: impl Into<String>, baud_rate: u32, hardware_flow_control: bool) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            hardware_flow_control,
            timeout: Duration::from_secs(1),
            retry_interval: DEFAULT_OPEN_RETRY,
            settle_delay: DEFAULT_SETTLE_DELAY,
            line: None,
            state: ConnectionState::Unconnected,
            opener: Arc::new(NativeOpener),
            sink: Arc::new(TracingSink),
            sleeper: Arc::new(ThreadSleeper),
            cancel: CancellationToken::new(),
            report: None,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.device.clone(), config.baud_rate, config.flow_control)
            .with_timeout(config.read_timeout())
            .with_retry_interval(config.open_retry())
            .with_settle_delay(config.baud_settle())
    }

    pub fn with_opener(mut self, opener: Arc<dyn LineOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Token that stops the device wait.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Blocking read/write timeout once open.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Result of the last successful negotiation.
    pub fn negotiation_report(&self) -> Option<&NegotiationReport> {
        self.report.as_ref()
    }

    /// Open the device, retrying until it appears or the token fires.
    fn open_line(&self) -> Result<Box<dyn SerialLine>, ConnectError> {
        let settings =
            LineSettings::receiver(self.baud_rate, self.hardware_flow_control, self.timeout);
        let mut attempts = 0u32;
        let mut last_error: Option<PortError> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(match last_error {
                    Some(source) => ConnectError::DeviceUnavailable {
                        path: self.device.clone(),
                        attempts,
                        source,
                    },
                    None => ConnectError::Cancelled,
                });
            }

            attempts = attempts.saturating_add(1);
            match self.opener.open(&self.device, &settings) {
                Ok(line) => {
                    self.sink.log(
                        Severity::Debug,
                        &format!("Opened {} after {attempts} attempt(s)", self.device),
                    );
                    return Ok(line);
                }
                Err(e) => {
                    self.sink.log(
                        Severity::Error,
                        &format!(
                            "Could not open serial port {}: {e}. Will retry every {} ms.",
                            self.device,
                            self.retry_interval.as_millis()
                        ),
                    );
                    last_error = Some(e);
                    self.sleeper.sleep(self.retry_interval);
                }
            }
        }
    }

    fn establish(&mut self) -> Result<(), ConnectError> {
        let mut line = self.open_line()?;

        SerialLineConfigurator::new(self.hardware_flow_control, Arc::clone(&self.sink))
            .apply(line.as_mut(), self.baud_rate)
            .map_err(ConnectError::LineConfig)?;

        let report = BaudRateNegotiator::new(Arc::clone(&self.sink), Arc::clone(&self.sleeper))
            .with_settle_delay(self.settle_delay)
            .negotiate(line.as_mut(), self.baud_rate)?;

        self.report = Some(report);
        self.line = Some(line);
        Ok(())
    }

    fn line_mut(&mut self) -> Result<&mut Box<dyn SerialLine>, ConnectError> {
        self.line.as_mut().ok_or(ConnectError::NotConnected)
    }
}

impl Connection for SerialConnection {
    fn connect(&mut self) -> Result<(), ConnectError> {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return Err(ConnectError::AlreadyConnected);
        }

        // Release whatever a previous attempt left behind.
        self.line = None;
        self.report = None;
        self.state = ConnectionState::Connecting;

        match self.establish() {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.sink.log(
                    Severity::Info,
                    &format!("Connected to {} at {} baud", self.device, self.baud_rate),
                );
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Failed;
                Err(err)
            }
        }
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, ConnectError> {
        Ok(self.line_mut()?.read_bytes(buffer)?)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ConnectError> {
        Ok(self.line_mut()?.write_bytes(data)?)
    }

    fn flush(&mut self) -> Result<(), ConnectError> {
        Ok(self.line_mut()?.flush()?)
    }

    fn close(&mut self) {
        if self.line.take().is_some() {
            self.sink
                .log(Severity::Debug, &format!("Closed {}", self.device));
        }
        self.state = ConnectionState::Closed;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn endpoint(&self) -> &str {
        &self.device
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialConnection")
            .field("device", &self.device)
            .field("baud_rate", &self.baud_rate)
            .field("hardware_flow_control", &self.hardware_flow_control)
            .field("state", &self.state)
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}
