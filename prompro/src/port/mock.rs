//! Scripted in-memory port for unit tests.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// What the mock does once its scripted input is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exhausted {
    /// Report `TimedOut`, like a silent device.
    TimedOut,
    /// Report a hard I/O failure, like an unplugged adapter.
    Broken,
    /// Return zero bytes, like a line that was hung up.
    HungUp,
}

/// Mock serial port with separate read/write buffers.
///
/// Each element of `replies` is released after the next write, which lets a
/// test model a device that only answers once a command has been sent.
pub(crate) struct MockPort {
    pub(crate) read_buf: VecDeque<u8>,
    pub(crate) write_buf: Vec<u8>,
    pub(crate) replies: VecDeque<Vec<u8>>,
    pub(crate) timeouts: Vec<Duration>,
    pub(crate) reads: usize,
    pub(crate) interrupt_next_read: bool,
    pub(crate) closed: bool,
    timeout: Duration,
    exhausted: Exhausted,
}

impl MockPort {
    /// Port that yields `input` immediately, then times out.
    pub(crate) fn new(input: &[u8]) -> Self {
        Self {
            read_buf: input.iter().copied().collect(),
            write_buf: Vec::new(),
            replies: VecDeque::new(),
            timeouts: Vec::new(),
            reads: 0,
            interrupt_next_read: false,
            closed: false,
            timeout: Duration::from_millis(1),
            exhausted: Exhausted::TimedOut,
        }
    }

    /// Port with nothing to read until written to; each write releases the
    /// next reply.
    pub(crate) fn with_replies(replies: &[&[u8]]) -> Self {
        let mut port = Self::new(&[]);
        port.replies = replies.iter().map(|r| r.to_vec()).collect();
        port
    }

    pub(crate) fn broken() -> Self {
        let mut port = Self::new(&[]);
        port.exhausted = Exhausted::Broken;
        port
    }

    pub(crate) fn hung_up() -> Self {
        let mut port = Self::new(&[]);
        port.exhausted = Exhausted::HungUp;
        port
    }

    /// Count how many times `command` appears in the write log.
    pub(crate) fn count_writes(&self, command: &[u8]) -> usize {
        self.write_buf
            .windows(command.len())
            .filter(|w| *w == command)
            .count()
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.interrupt_next_read {
            self.interrupt_next_read = false;
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "interrupted",
            ));
        }
        if self.read_buf.is_empty() {
            return match self.exhausted {
                Exhausted::TimedOut => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "no data",
                )),
                Exhausted::Broken => Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device disconnected",
                )),
                Exhausted::HungUp => Ok(0),
            };
        }
        let n = buf.len().min(self.read_buf.len());
        for b in buf.iter_mut().take(n) {
            if let Some(byte) = self.read_buf.pop_front() {
                *b = byte;
            }
        }
        self.reads += 1;
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_buf.extend_from_slice(buf);
        if let Some(reply) = self.replies.pop_front() {
            self.read_buf.extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeouts.push(timeout);
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.read_buf.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
