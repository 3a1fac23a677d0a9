//! Connection-level errors.
//!
//! Every failure a [`Connection`](crate::connection::Connection) reports is
//! one of these. None of them end the process; the owner decides whether to
//! retry, abort, or show a diagnostic.

use crate::line::PortError;
use crate::negotiation::BaudError;
use std::io;
use thiserror::Error;

/// Errors from connecting to or talking through a transport.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Host resolution or TCP connect failed. Not retried.
    #[error("Network error: {0}")]
    Network(#[source] io::Error),

    /// The serial device could not be opened before the wait was cancelled.
    #[error("Serial device {path} unavailable after {attempts} attempt(s): {source}")]
    DeviceUnavailable {
        path: String,
        attempts: u32,
        #[source]
        source: PortError,
    },

    /// The wait for the serial device was cancelled before any attempt.
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// Reading or writing terminal attributes failed.
    #[error("Line configuration failed: {0}")]
    LineConfig(#[source] PortError),

    /// Baud rate negotiation failed.
    #[error("Baud rate negotiation failed: {0}")]
    Baud(#[from] BaudError),

    /// I/O attempted while not connected.
    #[error("Connection is not established")]
    NotConnected,

    /// `connect()` called on a live connection.
    #[error("Connection is already established")]
    AlreadyConnected,

    /// Read or write on an established connection failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl ConnectError {
    /// Whether the error is a read/write timeout rather than a broken link.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

impl From<PortError> for ConnectError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Io(e) => Self::Io(e),
            other => Self::Io(io::Error::other(other)),
        }
    }
}

impl From<ConnectError> for io::Error {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Io(e) | ConnectError::Network(e) => e,
            ConnectError::NotConnected => {
                io::Error::new(io::ErrorKind::NotConnected, ConnectError::NotConnected)
            }
            other => io::Error::other(other),
        }
    }
}
