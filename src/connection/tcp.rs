//! TCP transport for receivers with a raw data port.
//!
//! Many receivers stream corrections and observations on a plain TCP port
//! (e.g. `192.168.3.1:28784`). There is nothing to negotiate: connect,
//! disable Nagle, and hand the stream to the caller.

use super::{Connection, ConnectionState};
use crate::config::ConnectionConfig;
use crate::error::ConnectError;
use crate::log_sink::{LogSink, Severity, TracingSink};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP connection to a receiver.
pub struct TcpConnection {
    host: String,
    port: String,
    /// `host:port`, for logging.
    addr: String,
    /// `None` until connected and again after `close()`.
    stream: Option<TcpStream>,
    state: ConnectionState,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    sink: Arc<dyn LogSink>,
}

impl TcpConnection {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        let host = host.into();
        let port = port.into();
        Self {
            addr: format!("{host}:{port}"),
            host,
            port,
            stream: None,
            state: ConnectionState::Unconnected,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.host.clone(), config.port.clone())
            .with_connect_timeout(config.connect_timeout())
            .with_read_timeout(Some(config.read_timeout()))
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout for blocking reads; `None` blocks indefinitely.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Peer address of the live stream.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Whether Nagle's algorithm is disabled on the live stream.
    pub fn nodelay(&self) -> Option<bool> {
        self.stream.as_ref().and_then(|s| s.nodelay().ok())
    }

    fn resolve(&self) -> Result<SocketAddr, ConnectError> {
        let port: u16 = self.port.parse().map_err(|_| {
            ConnectError::Network(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid TCP port \"{}\"", self.port),
            ))
        })?;

        (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(ConnectError::Network)?
            .next()
            .ok_or_else(|| {
                ConnectError::Network(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} did not resolve to any address", self.host),
                ))
            })
    }

    fn open_stream(&self) -> Result<TcpStream, ConnectError> {
        let target = self.resolve()?;

        tracing::debug!(
            addr = %self.addr,
            resolved = %target,
            timeout_ms = self.connect_timeout.as_millis(),
            "Connecting to TCP endpoint"
        );

        let stream = TcpStream::connect_timeout(&target, self.connect_timeout)
            .map_err(ConnectError::Network)?;

        if let Err(e) = stream.set_nodelay(true) {
            self.sink.log(
                Severity::Error,
                &format!("Could not set TCP_NODELAY on {}: {e}", self.addr),
            );
        }
        stream
            .set_read_timeout(self.read_timeout)
            .map_err(ConnectError::Network)?;

        Ok(stream)
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, ConnectError> {
        self.stream.as_mut().ok_or(ConnectError::NotConnected)
    }
}

impl Connection for TcpConnection {
    fn connect(&mut self) -> Result<(), ConnectError> {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return Err(ConnectError::AlreadyConnected);
        }

        self.state = ConnectionState::Connecting;
        match self.open_stream() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ConnectionState::Connected;
                self.sink.log(
                    Severity::Info,
                    &format!("Connected to {}", self.addr),
                );
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Failed;
                self.sink.log(
                    Severity::Error,
                    &format!("Could not connect to {}: {err}", self.addr),
                );
                Err(err)
            }
        }
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, ConnectError> {
        self.stream_mut()?.read(buffer).map_err(ConnectError::Io)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, ConnectError> {
        self.stream_mut()?.write(data).map_err(ConnectError::Io)
    }

    fn flush(&mut self) -> Result<(), ConnectError> {
        self.stream_mut()?.flush().map_err(ConnectError::Io)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; dropping the stream still
            // releases the socket.
            let _ = stream.shutdown(Shutdown::Both);
            self.sink
                .log(Severity::Debug, &format!("Closed {}", self.addr));
        }
        self.state = ConnectionState::Closed;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn endpoint(&self) -> &str {
        &self.addr
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("addr", &self.addr)
            .field("state", &self.state)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::RecordingSink;
    use std::net::TcpListener;

    fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        (listener, port)
    }

    #[test]
    fn test_connect_enables_nodelay() {
        let (listener, port) = listener();
        let sink = RecordingSink::new();
        let mut conn = TcpConnection::new("127.0.0.1", port).with_sink(Arc::new(sink.clone()));

        conn.connect().unwrap();
        let _peer = listener.accept().unwrap();

        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.nodelay(), Some(true));
        assert!(conn.peer_addr().is_some());
        assert_eq!(sink.count(Severity::Error), 0);
    }

    #[test]
    fn test_refused_connection_is_network_error() {
        let (listener, port) = listener();
        drop(listener);

        let sink = RecordingSink::new();
        let mut conn = TcpConnection::new("127.0.0.1", port).with_sink(Arc::new(sink.clone()));

        let err = conn.connect().unwrap_err();
        assert!(matches!(err, ConnectError::Network(_)));
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[test]
    fn test_invalid_port_is_network_error() {
        let mut conn = TcpConnection::new("127.0.0.1", "gnss").with_sink(Arc::new(RecordingSink::new()));
        let err = conn.connect().unwrap_err();
        match err {
            ConnectError::Network(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_io_before_connect() {
        let mut conn = TcpConnection::new("127.0.0.1", "28784");
        let mut buf = [0u8; 4];
        assert!(matches!(conn.read_bytes(&mut buf), Err(ConnectError::NotConnected)));
        assert!(matches!(conn.write_bytes(b"x"), Err(ConnectError::NotConnected)));
    }

    #[test]
    fn test_connect_twice_is_rejected() {
        let (listener, port) = listener();
        let mut conn = TcpConnection::new("127.0.0.1", port).with_sink(Arc::new(RecordingSink::new()));
        conn.connect().unwrap();
        let _peer = listener.accept().unwrap();

        assert!(matches!(conn.connect(), Err(ConnectError::AlreadyConnected)));
        assert!(conn.is_connected());
    }

    #[test]
    fn test_close_twice_and_reconnect() {
        let (listener, port) = listener();
        let sink = RecordingSink::new();
        let mut conn = TcpConnection::new("127.0.0.1", port).with_sink(Arc::new(sink.clone()));
        conn.connect().unwrap();
        let _first = listener.accept().unwrap();

        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(sink.contains(Severity::Debug, "Closed 127.0.0.1"));
        assert_eq!(
            sink.events()
                .iter()
                .filter(|(_, msg)| msg.starts_with("Closed"))
                .count(),
            1
        );

        conn.connect().unwrap();
        let _second = listener.accept().unwrap();
        assert!(conn.is_connected());
    }
}
