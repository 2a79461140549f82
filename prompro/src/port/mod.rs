//! Port abstraction for the serial line to the programmer.
//!
//! The protocol layer only needs a byte stream with an adjustable read
//! timeout, so it is written against the [`Port`] trait rather than a
//! concrete serial implementation:
//!
//! ```text
//! +------------------------------+
//! |  Session / TypeSelector /    |
//! |  DownloadOrchestrator        |
//! +--------------+---------------+
//!                |
//!                v
//! +--------------+---------------+
//! |  Channel (read_byte, write)  |
//! +--------------+---------------+
//!                |
//!                v
//! +--------------+---------------+
//! |  Port trait                  |
//! +--------------+---------------+
//!                |
//!                v
//! +--------------+---------------+
//! |  NativePort (serialport)     |
//! +------------------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default read timeout, used for the handshake and steady-state prompts.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2000);

/// Serial port configuration.
///
/// Line parameters are applied once when the port is opened.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Initial read/write timeout.
    pub timeout: Duration,
    /// Data bits.
    pub data_bits: DataBits,
    /// Parity. The Prompro-8 expects odd parity.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Flow control.
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            timeout: DEFAULT_READ_TIMEOUT,
            data_bits: DataBits::Eight,
            parity: Parity::Odd,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable RTS/CTS hardware flow control.
    #[must_use]
    pub fn with_rtscts(mut self, rtscts: bool) -> Self {
        self.flow_control = if rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    None,
    /// Odd parity.
    #[default]
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
}

/// Byte-stream port used by the protocol layer.
///
/// Reads must honour the timeout set with [`Port::set_timeout`] and report an
/// elapsed timeout as [`std::io::ErrorKind::TimedOut`].
pub trait Port: Read + Write + Send {
    /// Set the read/write timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Clear input/output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;
