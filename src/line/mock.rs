//! In-memory serial line for tests.
//!
//! [`MockSerialLine`] simulates a device driver: it remembers the rate last
//! programmed, records every call in order, and can be told to fail
//! specific calls. A [`MockLineView`] shares the same state so a test can
//! keep inspecting the line after handing it to a connection.
//!
//! [`MockOpener`] hands out mock lines and can be made to fail a number of
//! open attempts first, which simulates a receiver that is plugged in late.

use super::error::PortError;
use super::traits::{DataBits, FlowControl, LineOpener, LineSettings, Parity, SerialLine, StopBits};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// One call made against a mock line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOp {
    SetBaudRate(u32),
    SetParity(Parity),
    SetDataBits(DataBits),
    SetStopBits(StopBits),
    SetFlowControl(FlowControl),
    RawMode { hardware_flow_control: bool },
    LowLatency,
    Flush,
}

/// How the simulated driver answers a baud rate read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readback {
    /// Reports whatever was last programmed.
    Mirror,
    /// Silently ignores every set and keeps reporting this rate.
    Stuck(u32),
}

#[derive(Debug)]
struct MockLineState {
    baud_rate: u32,
    readback: Readback,
    ops: Vec<LineOp>,
    reads: usize,
    fail_read_at: Option<usize>,
    fail_set_at: Option<u32>,
    fail_raw_mode: bool,
    fail_low_latency: bool,
    read_queue: VecDeque<u8>,
    write_log: Vec<Vec<u8>>,
    releases: usize,
}

/// Simulated serial device.
pub struct MockSerialLine {
    name: String,
    state: Arc<Mutex<MockLineState>>,
}

impl MockSerialLine {
    /// A line whose driver currently reports `baud_rate`.
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockLineState {
                baud_rate,
                readback: Readback::Mirror,
                ops: Vec::new(),
                reads: 0,
                fail_read_at: None,
                fail_set_at: None,
                fail_raw_mode: false,
                fail_low_latency: false,
                read_queue: VecDeque::new(),
                write_log: Vec::new(),
                releases: 0,
            })),
        }
    }

    /// Handle for inspecting this line after it has been moved elsewhere.
    pub fn view(&self) -> MockLineView {
        MockLineView {
            state: Arc::clone(&self.state),
        }
    }

    pub fn with_readback(self, readback: Readback) -> Self {
        self.state.lock().readback = readback;
        self
    }

    /// Fail the `n`th baud rate read (1-based).
    pub fn failing_read_at(self, n: usize) -> Self {
        self.state.lock().fail_read_at = Some(n);
        self
    }

    /// Fail any attempt to program `rate`.
    pub fn failing_set_at(self, rate: u32) -> Self {
        self.state.lock().fail_set_at = Some(rate);
        self
    }

    pub fn failing_raw_mode(self) -> Self {
        self.state.lock().fail_raw_mode = true;
        self
    }

    pub fn failing_low_latency(self) -> Self {
        self.state.lock().fail_low_latency = true;
        self
    }

    /// Queue bytes for subsequent reads.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }
}

impl SerialLine for MockSerialLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        let mut state = self.state.lock();
        state.reads += 1;
        if state.fail_read_at == Some(state.reads) {
            return Err(PortError::Io(io::Error::other("TCGETS2 failed")));
        }
        Ok(match state.readback {
            Readback::Mirror => state.baud_rate,
            Readback::Stuck(rate) => rate,
        })
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.ops.push(LineOp::SetBaudRate(baud_rate));
        if state.fail_set_at == Some(baud_rate) {
            return Err(PortError::config(format!("driver rejected {baud_rate} baud")));
        }
        state.baud_rate = baud_rate;
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> Result<(), PortError> {
        self.state.lock().ops.push(LineOp::SetParity(parity));
        Ok(())
    }

    fn set_data_bits(&mut self, data_bits: DataBits) -> Result<(), PortError> {
        self.state.lock().ops.push(LineOp::SetDataBits(data_bits));
        Ok(())
    }

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<(), PortError> {
        self.state.lock().ops.push(LineOp::SetStopBits(stop_bits));
        Ok(())
    }

    fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<(), PortError> {
        self.state.lock().ops.push(LineOp::SetFlowControl(flow_control));
        Ok(())
    }

    fn apply_raw_mode(&mut self, hardware_flow_control: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.ops.push(LineOp::RawMode {
            hardware_flow_control,
        });
        if state.fail_raw_mode {
            return Err(PortError::Io(io::Error::other("tcsetattr failed")));
        }
        Ok(())
    }

    fn set_low_latency(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.ops.push(LineOp::LowLatency);
        if state.fail_low_latency {
            return Err(PortError::unsupported("TIOCSSERIAL"));
        }
        Ok(())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }

        if n == 0 {
            Err(PortError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "No data available",
            )))
        } else {
            Ok(n)
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.state.lock().write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.state.lock().ops.push(LineOp::Flush);
        Ok(())
    }
}

impl Drop for MockSerialLine {
    fn drop(&mut self) {
        self.state.lock().releases += 1;
    }
}

impl std::fmt::Debug for MockSerialLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialLine")
            .field("name", &self.name)
            .field("baud_rate", &self.state.lock().baud_rate)
            .finish()
    }
}

/// Shared view of a [`MockSerialLine`]'s state.
#[derive(Debug, Clone)]
pub struct MockLineView {
    state: Arc<Mutex<MockLineState>>,
}

impl MockLineView {
    /// Rate the simulated driver is programmed to.
    pub fn baud_rate(&self) -> u32 {
        self.state.lock().baud_rate
    }

    /// Every call made against the line, in order.
    pub fn ops(&self) -> Vec<LineOp> {
        self.state.lock().ops.clone()
    }

    /// Rates passed to `set_baud_rate`, in order.
    pub fn baud_sets(&self) -> Vec<u32> {
        self.state
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                LineOp::SetBaudRate(rate) => Some(*rate),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// How many times the owning handle has been dropped.
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }
}

type LineFactory = Box<dyn Fn() -> MockSerialLine + Send + Sync>;

/// Opener that fails a configurable number of attempts before handing out
/// mock lines.
pub struct MockOpener {
    failures_before_success: Option<usize>,
    attempts: Arc<Mutex<usize>>,
    factory: LineFactory,
}

impl MockOpener {
    /// Succeeds on the first attempt, producing lines from `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> MockSerialLine + Send + Sync + 'static,
    {
        Self {
            failures_before_success: Some(0),
            attempts: Arc::default(),
            factory: Box::new(factory),
        }
    }

    /// Fails the first `failures` attempts.
    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures_before_success = Some(failures);
        self
    }

    /// A device path that never appears.
    pub fn never_present() -> Self {
        Self {
            failures_before_success: None,
            attempts: Arc::default(),
            factory: Box::new(|| MockSerialLine::new("unreachable", 0)),
        }
    }

    /// Shared counter of open attempts.
    pub fn attempts(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.attempts)
    }
}

impl LineOpener for MockOpener {
    fn open(&self, device: &str, _settings: &LineSettings) -> Result<Box<dyn SerialLine>, PortError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            *attempts
        };

        match self.failures_before_success {
            Some(failures) if attempt > failures => Ok(Box::new((self.factory)())),
            _ => Err(PortError::not_found(device)),
        }
    }
}

impl std::fmt::Debug for MockOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockOpener")
            .field("failures_before_success", &self.failures_before_success)
            .field("attempts", &*self.attempts.lock())
            .finish()
    }
}
