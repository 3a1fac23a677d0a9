//! Configuration schema definitions.
//!
//! Every section derives serde with `#[serde(default)]`, so a file only needs
//! the keys it wants to change.

use super::error::{ConfigError, ConfigResult};
use crate::baud;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Receiver connection
    pub connection: ConnectionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check every section. Connections assume a validated config.
    pub fn validate(&self) -> ConfigResult<()> {
        self.connection.validate()
    }
}

/// Which transport reaches the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    #[default]
    Serial,
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "serial" => Ok(Self::Serial),
            other => Err(ConfigError::validation(
                "connection.transport",
                format!("expected \"tcp\" or \"serial\", got \"{other}\""),
            )),
        }
    }
}

/// Receiver connection section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// "tcp" or "serial"
    pub transport: TransportKind,
    /// Receiver host name or address (TCP)
    pub host: String,
    /// Receiver port (TCP)
    pub port: String,
    /// Serial device path
    pub device: String,
    /// Requested baud rate; must be in the standard table
    pub baud_rate: u32,
    /// RTS/CTS hardware flow control
    pub flow_control: bool,
    /// Wait between attempts to open the serial device
    pub open_retry_ms: u64,
    /// Settle time after each baud rate change
    pub baud_settle_ms: u64,
    /// TCP connect timeout
    pub connect_timeout_ms: u64,
    /// Blocking read timeout once connected
    pub read_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Serial,
            host: "192.168.3.1".to_string(),
            port: "28784".to_string(),
            device: "/dev/ttyACM0".to_string(),
            baud_rate: baud::RECEIVER_DEFAULT_BAUD,
            flow_control: false,
            open_retry_ms: 1000,
            baud_settle_ms: 500,
            connect_timeout_ms: 5000,
            read_timeout_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    /// TCP connection to `host:port`.
    pub fn tcp(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            transport: TransportKind::Tcp,
            host: host.into(),
            port: port.into(),
            ..Default::default()
        }
    }

    /// Serial connection to `device` at `baud_rate`.
    pub fn serial(device: impl Into<String>, baud_rate: u32, flow_control: bool) -> Self {
        Self {
            transport: TransportKind::Serial,
            device: device.into(),
            baud_rate,
            flow_control,
            ..Default::default()
        }
    }

    pub fn open_retry(&self) -> Duration {
        Duration::from_millis(self.open_retry_ms)
    }

    pub fn baud_settle(&self) -> Duration {
        Duration::from_millis(self.baud_settle_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Human-readable endpoint, e.g. `192.168.3.1:28784` or `/dev/ttyACM0`.
    pub fn endpoint(&self) -> String {
        match self.transport {
            TransportKind::Tcp => format!("{}:{}", self.host, self.port),
            TransportKind::Serial => self.device.clone(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match self.transport {
            TransportKind::Tcp => {
                if self.host.trim().is_empty() {
                    return Err(ConfigError::validation("connection.host", "must not be empty"));
                }
                if self.port.parse::<u16>().is_err() {
                    return Err(ConfigError::validation(
                        "connection.port",
                        format!("\"{}\" is not a TCP port number", self.port),
                    ));
                }
                if self.connect_timeout_ms == 0 {
                    return Err(ConfigError::validation(
                        "connection.connect_timeout_ms",
                        "must be greater than zero",
                    ));
                }
            }
            TransportKind::Serial => {
                if self.device.trim().is_empty() {
                    return Err(ConfigError::validation(
                        "connection.device",
                        "must not be empty",
                    ));
                }
                if !baud::is_standard(self.baud_rate) {
                    return Err(ConfigError::validation(
                        "connection.baud_rate",
                        format!("{} is not a standard receiver baud rate", self.baud_rate),
                    ));
                }
                if self.open_retry_ms == 0 {
                    return Err(ConfigError::validation(
                        "connection.open_retry_ms",
                        "must be greater than zero",
                    ));
                }
                if self.baud_settle_ms == 0 {
                    return Err(ConfigError::validation(
                        "connection.baud_settle_ms",
                        "must be greater than zero",
                    ));
                }
            }
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "connection.read_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error" or a
    /// full `EnvFilter` string. `RUST_LOG` takes precedence.
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}
