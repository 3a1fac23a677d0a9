//! Serial line error types.
//!
//! Kept separate from connection-level errors: these describe what went
//! wrong at a single call against the device, and the connection layer
//! decides what that means for `connect()`.

use thiserror::Error;

/// Errors from operations against an open (or opening) serial line.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device node does not exist (yet).
    #[error("Serial device not found: {0}")]
    NotFound(String),

    /// An I/O error occurred, including failed terminal attribute calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The driver rejected a line setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The platform or driver does not support the operation.
    #[error("Unsupported on this device: {0}")]
    Unsupported(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    pub fn not_found(device: impl Into<String>) -> Self {
        Self::NotFound(device.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Wrap the calling thread's last OS error.
    pub fn last_os_error() -> Self {
        Self::Io(std::io::Error::last_os_error())
    }
}
