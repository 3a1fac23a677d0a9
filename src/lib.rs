//! GNSS receiver link library
//!
//! Gives a receiver client one byte-stream [`Connection`] regardless of
//! whether the receiver sits behind a TCP port or a local serial device.
//! The serial path waits for the device to appear, puts the line into raw
//! 8N1 mode, and walks the baud rate up the standard table to the requested
//! value.
//!
//! # Modules
//!
//! - `connection`: the `Connection` contract and the TCP/serial transports
//! - `line`: serial line abstraction, native driver access and a mock
//! - `negotiation`: stepped baud rate negotiation
//! - `baud`: the standard baud rate table
//! - `control`: cancellation and sleeping for retry loops
//! - `log_sink`: the logging callback handed to connections
//! - `config`: TOML configuration with environment overrides
//! - `error`: connection-level errors

pub mod baud;
pub mod config;
pub mod connection;
pub mod control;
pub mod error;
pub mod line;
pub mod log_sink;
pub mod negotiation;

// Re-export commonly used types for convenience
pub use connection::{AnyConnection, Connection, ConnectionState, SerialConnection, TcpConnection};
pub use control::{CancellationToken, Sleeper, ThreadSleeper};
pub use error::ConnectError;
pub use line::{PortError, SerialLine, SerialLineConfigurator};
pub use log_sink::{LogSink, Severity, TracingSink};
pub use negotiation::{BaudError, BaudRateNegotiator, NegotiationReport};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, ConnectionConfig};
