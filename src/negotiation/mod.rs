//! Stepped baud rate negotiation.
//!
//! A receiver's UART and the host driver have to change rate together. The
//! negotiator never jumps straight to the target; it walks the standard
//! table in ascending order, programming each rate it has not already
//! passed, waiting for the link to settle and reading the rate back before
//! moving on.

pub mod negotiator;

pub use negotiator::{
    BaudRateNegotiator, NegotiationAttempt, NegotiationReport, DEFAULT_SETTLE_DELAY,
};

use crate::line::PortError;
use thiserror::Error;

/// Errors that end a negotiation.
#[derive(Debug, Error)]
pub enum BaudError {
    /// Reading the current rate from the driver failed.
    #[error("Failed to read back baud rate: {0}")]
    Readback(#[source] PortError),

    /// The driver refused a rate.
    #[error("Failed to set baud rate {rate}: {source}")]
    Set {
        rate: u32,
        #[source]
        source: PortError,
    },

    /// The whole table was walked without the line reporting the target.
    #[error("Baud rate {target} not reached; line stayed at {achieved}")]
    UnreachableTarget { target: u32, achieved: u32 },
}
