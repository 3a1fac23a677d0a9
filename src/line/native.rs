//! Serial line backed by a real device.
//!
//! Line settings go through the `serialport` crate. Raw mode and the
//! low-latency flag are not exposed there, so on Unix they are applied with
//! `termios`/`ioctl` calls against the port's file descriptor.

use super::error::PortError;
use super::traits::{DataBits, FlowControl, LineOpener, LineSettings, Parity, SerialLine, StopBits};
use serialport::SerialPort;
use std::io::{Read, Write};

#[cfg(unix)]
type NativePort = serialport::TTYPort;
#[cfg(windows)]
type NativePort = serialport::COMPort;

/// Serial line wrapping the platform's native port type.
pub struct NativeSerialLine {
    port: NativePort,
    name: String,
}

impl NativeSerialLine {
    /// Open `device` with the given initial settings.
    ///
    /// # Example
    /// ```no_run
    /// use gnss_link::line::{LineSettings, NativeSerialLine};
    ///
    /// let line = NativeSerialLine::open("/dev/ttyACM0", &LineSettings::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device: &str, settings: &LineSettings) -> Result<Self, PortError> {
        let port = serialport::new(device, settings.baud_rate)
            .data_bits(settings.data_bits.into())
            .flow_control(settings.flow_control.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .timeout(settings.timeout)
            .open_native()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(device),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: device.to_string(),
        })
    }
}

impl SerialLine for NativeSerialLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        self.port.baud_rate().map_err(PortError::Serial)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError> {
        self.port.set_baud_rate(baud_rate).map_err(PortError::Serial)
    }

    fn set_parity(&mut self, parity: Parity) -> Result<(), PortError> {
        self.port.set_parity(parity.into()).map_err(PortError::Serial)
    }

    fn set_data_bits(&mut self, data_bits: DataBits) -> Result<(), PortError> {
        self.port
            .set_data_bits(data_bits.into())
            .map_err(PortError::Serial)
    }

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<(), PortError> {
        self.port
            .set_stop_bits(stop_bits.into())
            .map_err(PortError::Serial)
    }

    fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<(), PortError> {
        self.port
            .set_flow_control(flow_control.into())
            .map_err(PortError::Serial)
    }

    #[cfg(unix)]
    fn apply_raw_mode(&mut self, hardware_flow_control: bool) -> Result<(), PortError> {
        use std::os::unix::io::AsRawFd;

        let fd = self.port.as_raw_fd();

        // SAFETY: termios is plain old data and fd stays open for the
        // lifetime of self.port.
        let mut tio: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
            return Err(PortError::last_os_error());
        }

        unsafe { libc::cfmakeraw(&mut tio) };

        tio.c_iflag &= !(libc::IXON | libc::IXOFF);
        if hardware_flow_control {
            tio.c_cflag |= libc::CRTSCTS;
        } else {
            tio.c_cflag &= !libc::CRTSCTS;
        }

        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }

    // The Windows driver never does line processing.
    #[cfg(not(unix))]
    fn apply_raw_mode(&mut self, hardware_flow_control: bool) -> Result<(), PortError> {
        self.set_flow_control(FlowControl::from_flag(hardware_flow_control))
    }

    #[cfg(target_os = "linux")]
    fn set_low_latency(&mut self) -> Result<(), PortError> {
        use std::os::unix::io::AsRawFd;

        let fd = self.port.as_raw_fd();

        // SAFETY: SerialStruct mirrors `struct serial_struct` from
        // <linux/serial.h>, which is what TIOCGSERIAL/TIOCSSERIAL expect.
        let mut info: SerialStruct = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(fd, libc::TIOCGSERIAL, &mut info as *mut SerialStruct) } != 0 {
            return Err(PortError::last_os_error());
        }
        info.flags |= ASYNC_LOW_LATENCY;
        if unsafe { libc::ioctl(fd, libc::TIOCSSERIAL, &info as *const SerialStruct) } != 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn set_low_latency(&mut self) -> Result<(), PortError> {
        Err(PortError::unsupported("low-latency flag"))
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    /// `tcdrain` on Unix, `FlushFileBuffers` on Windows.
    fn flush(&mut self) -> Result<(), PortError> {
        self.port.flush().map_err(PortError::Io)
    }
}

impl std::fmt::Debug for NativeSerialLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSerialLine")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

/// Opens [`NativeSerialLine`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl LineOpener for NativeOpener {
    fn open(&self, device: &str, settings: &LineSettings) -> Result<Box<dyn SerialLine>, PortError> {
        Ok(Box::new(NativeSerialLine::open(device, settings)?))
    }
}

/// `ASYNCB_LOW_LATENCY` from <linux/tty_flags.h>.
#[cfg(target_os = "linux")]
const ASYNC_LOW_LATENCY: libc::c_int = 1 << 13;

#[cfg(target_os = "linux")]
#[repr(C)]
#[allow(dead_code)]
struct SerialStruct {
    kind: libc::c_int,
    line: libc::c_int,
    port: libc::c_uint,
    irq: libc::c_int,
    flags: libc::c_int,
    xmit_fifo_size: libc::c_int,
    custom_divisor: libc::c_int,
    baud_base: libc::c_int,
    close_delay: libc::c_ushort,
    io_type: libc::c_char,
    reserved_char: [libc::c_char; 1],
    hub6: libc::c_int,
    closing_wait: libc::c_ushort,
    closing_wait2: libc::c_ushort,
    iomem_base: *mut libc::c_uchar,
    iomem_reg_shift: libc::c_ushort,
    port_high: libc::c_uint,
    iomap_base: libc::c_ulong,
}
