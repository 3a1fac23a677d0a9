//! Line discipline setup for a freshly opened receiver port.

use super::error::PortError;
use super::traits::{DataBits, FlowControl, Parity, SerialLine, StopBits};
use crate::log_sink::{LogSink, Severity};
use std::sync::Arc;

/// Applies 8N1, flow control, raw mode and the low-latency hint to an open
/// line, in that order.
pub struct SerialLineConfigurator {
    hardware_flow_control: bool,
    sink: Arc<dyn LogSink>,
}

impl SerialLineConfigurator {
    pub fn new(hardware_flow_control: bool, sink: Arc<dyn LogSink>) -> Self {
        Self {
            hardware_flow_control,
            sink,
        }
    }

    /// Configure `line` with `baud_rate` as its initial rate.
    ///
    /// Attribute failures are returned to the caller. A rejected low-latency
    /// flag is logged and ignored: CDC-ACM and most USB bridges have no
    /// `serial_struct` to update.
    pub fn apply(&self, line: &mut dyn SerialLine, baud_rate: u32) -> Result<(), PortError> {
        line.set_baud_rate(baud_rate)?;
        line.set_parity(Parity::None)?;
        line.set_data_bits(DataBits::Eight)?;
        line.set_stop_bits(StopBits::One)?;
        line.set_flow_control(FlowControl::from_flag(self.hardware_flow_control))?;

        line.apply_raw_mode(self.hardware_flow_control)?;
        self.sink.log(
            Severity::Debug,
            &format!(
                "Configured {} as raw 8N1 at {} baud, hardware flow control {}",
                line.name(),
                baud_rate,
                if self.hardware_flow_control { "on" } else { "off" }
            ),
        );

        if let Err(e) = line.set_low_latency() {
            self.sink.log(
                Severity::Error,
                &format!("Could not set low-latency mode on {}: {}", line.name(), e),
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for SerialLineConfigurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLineConfigurator")
            .field("hardware_flow_control", &self.hardware_flow_control)
            .finish()
    }
}
