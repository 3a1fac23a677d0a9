//! Configuration for the owning process.
//!
//! TOML-based, with environment variable overrides. This layer is the
//! "caller" that validates a [`ConnectionConfig`] before a connection is
//! built from it; connections themselves trust what they are given.
//!
//! # Configuration Resolution
//!
//! 1. `GNSS_LINK_CONFIG` environment variable (explicit path)
//! 2. `./gnss-link.toml` (current directory)
//! 3. the platform config directory (`~/.config/gnss-link/gnss-link.toml`
//!    on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! `GNSS_LINK_<SECTION>_<KEY>`, for example:
//! - `GNSS_LINK_CONNECTION_TRANSPORT=tcp`
//! - `GNSS_LINK_CONNECTION_BAUD_RATE=921600`
//! - `GNSS_LINK_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```toml
//! [connection]
//! transport = "serial"
//! device = "/dev/ttyACM0"
//! baud_rate = 921600
//! flow_control = true
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    apply_overrides, get_default_config_dir, get_default_config_path, resolve_config_path,
    ConfigLoader,
};
pub use schema::{Config, ConnectionConfig, LogFormat, LoggingConfig, TransportKind};
