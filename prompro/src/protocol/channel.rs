//! Duplex byte channel over an opened port.

use std::io::{self, ErrorKind};
use std::time::Duration;

use log::trace;

use crate::error::{Error, Result};
use crate::port::Port;

/// Byte channel to the programmer.
///
/// Wraps a [`Port`] and exposes the two primitives the protocol is built on:
/// raw writes and a single-byte read bounded by a per-call timeout.
pub struct Channel<P: Port> {
    port: P,
    trace: bool,
}

impl<P: Port> Channel<P> {
    /// Create a channel over an opened port.
    pub fn new(port: P) -> Self {
        Self { port, trace: false }
    }

    /// Trace every byte sent and received at `trace` level.
    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Write raw bytes and flush them to the device.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.trace {
            trace!(target: "prompro::wire", "TX {:?}", bytes.escape_ascii().to_string());
        }
        self.port.write_all_bytes(bytes)
    }

    /// Read a single byte, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the timeout elapses without data. Interrupted
    /// reads are retried transparently. A zero-length read means the line
    /// was hung up and is returned as [`Error::Io`] like any other failure.
    pub fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        if self.port.timeout() != timeout {
            self.port.set_timeout(timeout)?;
        }

        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "serial channel closed",
                    )));
                },
                Ok(_) => {
                    if self.trace {
                        trace!(target: "prompro::wire", "RX {:?}", buf.escape_ascii().to_string());
                    }
                    return Ok(Some(buf[0]));
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None);
                },
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}
