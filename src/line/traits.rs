//! Narrow platform abstraction over a serial device.
//!
//! Everything that touches terminal attributes or ioctls sits behind
//! [`SerialLine`], so the configurator and the baud negotiator can be driven
//! against [`MockSerialLine`](super::MockSerialLine) in tests.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters used when opening a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSettings {
    /// Initial baud rate (bits per second).
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub flow_control: FlowControl,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Blocking read/write timeout.
    pub timeout: Duration,
}

impl LineSettings {
    /// 8N1 at `baud_rate`, hardware flow control if `hardware_flow_control`.
    pub fn receiver(baud_rate: u32, hardware_flow_control: bool, timeout: Duration) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::from_flag(hardware_flow_control),
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout,
        }
    }
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::receiver(crate::baud::RECEIVER_DEFAULT_BAUD, false, Duration::from_secs(1))
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes the receiver supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    /// RTS/CTS.
    Hardware,
}

impl FlowControl {
    pub fn from_flag(hardware: bool) -> Self {
        if hardware {
            Self::Hardware
        } else {
            Self::None
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// An open serial device.
///
/// Each method maps to one driver call. Implementations must not retry
/// internally; retry policy belongs to the caller.
pub trait SerialLine: Send + std::fmt::Debug {
    /// Device path this line was opened from.
    fn name(&self) -> &str;

    /// Read the rate the driver currently reports.
    fn baud_rate(&self) -> Result<u32, PortError>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError>;

    fn set_parity(&mut self, parity: Parity) -> Result<(), PortError>;

    fn set_data_bits(&mut self, data_bits: DataBits) -> Result<(), PortError>;

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<(), PortError>;

    fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<(), PortError>;

    /// Put the terminal into raw mode and commit immediately.
    ///
    /// Disables canonical input, echo and signal characters, clears
    /// `IXON`/`IXOFF`, and sets or clears `CRTSCTS` according to
    /// `hardware_flow_control`.
    fn apply_raw_mode(&mut self, hardware_flow_control: bool) -> Result<(), PortError>;

    /// Ask the driver not to batch small reads (`ASYNC_LOW_LATENCY`).
    fn set_low_latency(&mut self) -> Result<(), PortError>;

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Block until every written byte has left the transmit buffer.
    fn flush(&mut self) -> Result<(), PortError>;
}

/// Opens serial devices by path.
pub trait LineOpener: Send + Sync + std::fmt::Debug {
    fn open(&self, device: &str, settings: &LineSettings) -> Result<Box<dyn SerialLine>, PortError>;
}
