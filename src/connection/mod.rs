//! Transport-agnostic connections to a receiver.
//!
//! [`Connection`] is the contract both transports satisfy. [`AnyConnection`]
//! is the closed set of transports the owning process builds from
//! configuration and then drives without caring which one it got.
//!
//! # Example
//!
//! ```no_run
//! use gnss_link::config::ConnectionConfig;
//! use gnss_link::connection::{AnyConnection, Connection};
//! use gnss_link::control::CancellationToken;
//! use gnss_link::log_sink::TracingSink;
//! use std::sync::Arc;
//!
//! let config = ConnectionConfig::serial("/dev/ttyACM0", 921600, false);
//! let mut conn = AnyConnection::from_config(&config, Arc::new(TracingSink), CancellationToken::new());
//! conn.connect()?;
//!
//! let mut buf = [0u8; 1024];
//! let n = conn.read_bytes(&mut buf)?;
//! conn.close();
//! # Ok::<(), gnss_link::ConnectError>(())
//! ```

pub mod serial;
pub mod tcp;

pub use serial::SerialConnection;
pub use tcp::TcpConnection;

use crate::config::{ConnectionConfig, TransportKind};
use crate::control::CancellationToken;
use crate::error::ConnectError;
use crate::log_sink::LogSink;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    /// The last `connect()` failed; no handle is held.
    Failed,
    Closed,
}

/// A byte-stream link to a receiver.
///
/// Methods take `&mut self`: a connection has one owner, and callers that
/// share one across threads bring their own lock.
pub trait Connection: Send + std::fmt::Debug {
    /// Establish the link.
    ///
    /// Fails with [`ConnectError::AlreadyConnected`] on a live connection.
    /// From `Failed` or `Closed` a fresh attempt is made.
    fn connect(&mut self) -> Result<(), ConnectError>;

    /// Blocking read; short reads are normal.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, ConnectError>;

    /// Blocking write; short writes are normal.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ConnectError>;

    /// Wait until written bytes have been handed to the transport.
    fn flush(&mut self) -> Result<(), ConnectError>;

    /// Release the handle. Safe in any state; repeated calls do nothing.
    fn close(&mut self);

    fn state(&self) -> ConnectionState;

    /// Where this connection points, for diagnostics.
    fn endpoint(&self) -> &str;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// The transports a receiver can be reached over.
#[derive(Debug)]
pub enum AnyConnection {
    Tcp(TcpConnection),
    Serial(SerialConnection),
}

impl AnyConnection {
    /// Build the transport `config` asks for.
    ///
    /// `cancel` interrupts the serial device wait; TCP connects never wait.
    pub fn from_config(
        config: &ConnectionConfig,
        sink: Arc<dyn LogSink>,
        cancel: CancellationToken,
    ) -> Self {
        match config.transport {
            TransportKind::Tcp => Self::Tcp(TcpConnection::from_config(config).with_sink(sink)),
            TransportKind::Serial => Self::Serial(
                SerialConnection::from_config(config)
                    .with_sink(sink)
                    .with_cancellation(cancel),
            ),
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            Self::Tcp(_) => TransportKind::Tcp,
            Self::Serial(_) => TransportKind::Serial,
        }
    }

    fn inner(&self) -> &dyn Connection {
        match self {
            Self::Tcp(conn) => conn,
            Self::Serial(conn) => conn,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Connection {
        match self {
            Self::Tcp(conn) => conn,
            Self::Serial(conn) => conn,
        }
    }
}

impl Connection for AnyConnection {
    fn connect(&mut self) -> Result<(), ConnectError> {
        self.inner_mut().connect()
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, ConnectError> {
        self.inner_mut().read_bytes(buffer)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ConnectError> {
        self.inner_mut().write_bytes(data)
    }

    fn flush(&mut self) -> Result<(), ConnectError> {
        self.inner_mut().flush()
    }

    fn close(&mut self) {
        self.inner_mut().close()
    }

    fn state(&self) -> ConnectionState {
        self.inner().state()
    }

    fn endpoint(&self) -> &str {
        self.inner().endpoint()
    }
}

impl io::Read for AnyConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(io::Error::from)
    }
}

impl io::Write for AnyConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Connection::flush(self).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::RecordingSink;
    use std::io::{Read, Write};

    fn build(config: &ConnectionConfig) -> AnyConnection {
        AnyConnection::from_config(
            config,
            Arc::new(RecordingSink::new()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_from_config_picks_transport() {
        let tcp = build(&ConnectionConfig::tcp("192.168.3.1", "28784"));
        assert_eq!(tcp.transport(), TransportKind::Tcp);
        assert_eq!(tcp.endpoint(), "192.168.3.1:28784");

        let serial = build(&ConnectionConfig::serial("/dev/ttyUSB0", 460800, false));
        assert_eq!(serial.transport(), TransportKind::Serial);
        assert_eq!(serial.endpoint(), "/dev/ttyUSB0");
    }

    #[test]
    fn test_new_connection_is_unconnected() {
        for config in [
            ConnectionConfig::tcp("192.168.3.1", "28784"),
            ConnectionConfig::serial("/dev/ttyACM0", 115200, false),
        ] {
            let conn = build(&config);
            assert_eq!(conn.state(), ConnectionState::Unconnected);
            assert!(!conn.is_connected());
        }
    }

    #[test]
    fn test_io_traits_report_not_connected() {
        let mut conn = build(&ConnectionConfig::tcp("192.168.3.1", "28784"));
        let mut buf = [0u8; 8];

        let err = conn.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let err = conn.write(b"grc\r\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let err = Write::flush(&mut conn).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_close_is_idempotent_on_any_variant() {
        let mut conn = build(&ConnectionConfig::serial("/dev/ttyACM0", 115200, false));
        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
