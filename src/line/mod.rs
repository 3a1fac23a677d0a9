//! Serial line layer.
//!
//! [`SerialLine`] is the only place that touches the device driver. The
//! native implementation wraps `serialport` plus a few raw `termios`/`ioctl`
//! calls; the mock lets the rest of the crate be tested without hardware.

pub mod configurator;
pub mod error;
pub mod mock;
pub mod native;
pub mod traits;

pub use configurator::SerialLineConfigurator;
pub use error::PortError;
pub use mock::{LineOp, MockLineView, MockOpener, MockSerialLine, Readback};
pub use native::{NativeOpener, NativeSerialLine};
pub use traits::*;
