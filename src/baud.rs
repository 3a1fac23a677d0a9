//! The standard baud rate table.
//!
//! Serves two purposes: it is the set of rates a caller may request, and it
//! is the ascending step sequence the negotiator walks through. The values
//! must not change; deployed receivers are configured against exactly this
//! list.

/// Every rate the receiver's COM ports accept, strictly ascending.
pub const STANDARD_BAUD_RATES: [u32; 21] = [
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 576000, 921600,
    1000000, 1152000, 1500000, 2000000, 2500000, 3000000, 3500000, 4000000,
];

/// Factory default rate of the receiver's serial ports (8N1, no flow control).
pub const RECEIVER_DEFAULT_BAUD: u32 = 115200;

/// Returns `true` if `rate` is a member of [`STANDARD_BAUD_RATES`].
pub fn is_standard(rate: u32) -> bool {
    STANDARD_BAUD_RATES.binary_search(&rate).is_ok()
}

/// Index of `rate` in the table, if present.
pub fn position(rate: u32) -> Option<usize> {
    STANDARD_BAUD_RATES.binary_search(&rate).ok()
}
