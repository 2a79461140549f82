//! Prompt synchronisation.

use std::time::Duration;

use log::trace;

use crate::error::Result;
use crate::port::Port;
use crate::protocol::{Channel, PROMPT};

/// Read and discard bytes until the device sends its `*` prompt.
///
/// Returns `Ok(true)` once the prompt has been consumed and `Ok(false)` if a
/// read times out first. Each read waits the full `timeout`, so a device that
/// keeps sending other bytes can hold this call for longer than `timeout` in
/// total. Only channel I/O failures are returned as errors.
pub fn wait_for_prompt<P: Port>(channel: &mut Channel<P>, timeout: Duration) -> Result<bool> {
    let mut discarded = 0usize;

    loop {
        match channel.read_byte(timeout)? {
            Some(PROMPT) => {
                if discarded > 0 {
                    trace!("Prompt received after discarding {discarded} bytes");
                }
                return Ok(true);
            },
            Some(_) => discarded += 1,
            None => {
                trace!("No prompt within {} ms", timeout.as_millis());
                return Ok(false);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::port::mock::MockPort;

    const T: Duration = Duration::from_millis(5);

    #[test]
    fn test_prompt_after_noise() {
        let mut channel = Channel::new(MockPort::new(b"xy*"));
        assert!(wait_for_prompt(&mut channel, T).unwrap());
        assert_eq!(channel.port().reads, 3);
        assert!(channel.port().read_buf.is_empty());
    }

    #[test]
    fn test_prompt_stops_at_first_prompt() {
        let mut channel = Channel::new(MockPort::new(b"*rest"));
        assert!(wait_for_prompt(&mut channel, T).unwrap());
        assert_eq!(channel.port().read_buf.len(), 4);
    }

    #[test]
    fn test_no_prompt_returns_false() {
        let mut channel = Channel::new(MockPort::new(b"no prompt here"));
        assert!(!wait_for_prompt(&mut channel, T).unwrap());
        assert!(channel.port().read_buf.is_empty());
    }

    #[test]
    fn test_silent_device_returns_false() {
        let mut channel = Channel::new(MockPort::new(&[]));
        assert!(!wait_for_prompt(&mut channel, T).unwrap());
    }

    #[test]
    fn test_each_read_uses_full_timeout() {
        let mut channel = Channel::new(MockPort::new(b"abc*"));
        let timeout = Duration::from_millis(700);
        assert!(wait_for_prompt(&mut channel, timeout).unwrap());
        // The timeout is never reduced between reads.
        assert_eq!(channel.port().timeouts, vec![timeout]);
    }

    #[test]
    fn test_io_error_propagates() {
        let mut channel = Channel::new(MockPort::broken());
        assert!(matches!(
            wait_for_prompt(&mut channel, T),
            Err(Error::Io(_))
        ));
    }
}
