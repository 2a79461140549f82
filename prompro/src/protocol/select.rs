//! Device type selection.

use std::time::Duration;

use log::{debug, info};

use crate::error::{Error, Phase, Result};
use crate::port::Port;
use crate::protocol::{Channel, LINE_END, SELECT_COMMAND, wait_for_prompt};

/// Default timeout while waiting for the device to confirm a selection.
///
/// Selecting a device type reconfigures the programmer and takes noticeably
/// longer than answering a bare carriage return.
pub const DEFAULT_SELECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the select-type command for `device_type_id`.
pub fn select_command(device_type_id: &str) -> Vec<u8> {
    let mut cmd = Vec::with_capacity(device_type_id.len() + 2);
    cmd.push(SELECT_COMMAND);
    cmd.extend_from_slice(device_type_id.as_bytes());
    cmd.push(LINE_END);
    cmd
}

/// Check that `device_type_id` can be framed as a single command.
pub fn validate_device_type_id(device_type_id: &str) -> Result<()> {
    if device_type_id.is_empty() {
        return Err(Error::Config("empty device type identifier".into()));
    }
    if !device_type_id
        .bytes()
        .all(|b| b.is_ascii_graphic())
    {
        return Err(Error::Config(format!(
            "device type identifier {device_type_id:?} must be printable ASCII without spaces"
        )));
    }
    Ok(())
}

/// Issues select-type commands and remembers what the device last accepted.
#[derive(Debug, Clone)]
pub struct TypeSelector {
    selected: Option<String>,
    timeout: Duration,
}

impl Default for TypeSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SELECT_TIMEOUT)
    }
}

impl TypeSelector {
    /// Create a selector that waits up to `timeout` per byte for confirmation.
    pub fn new(timeout: Duration) -> Self {
        Self {
            selected: None,
            timeout,
        }
    }

    /// Device type the programmer last confirmed, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Timeout used while waiting for a selection prompt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Select `device_type_id` on the device.
    ///
    /// Does nothing if that type is already selected. Otherwise sends
    /// `S<id>\r` and waits for the prompt. The remembered selection only
    /// changes once the device has confirmed it.
    ///
    /// Returns `true` when a command was sent.
    pub fn select<P: Port>(&mut self, channel: &mut Channel<P>, device_type_id: &str) -> Result<bool> {
        if self.selected.as_deref() == Some(device_type_id) {
            debug!("Device type {device_type_id} already selected");
            return Ok(false);
        }

        validate_device_type_id(device_type_id)?;

        debug!("Selecting device type {device_type_id}");
        let confirmed = channel
            .write(&select_command(device_type_id))
            .and_then(|()| wait_for_prompt(channel, self.timeout))
            .map_err(|e| e.during(Phase::Selection))?;

        if !confirmed {
            return Err(Error::SelectionTimeout {
                device_type_id: device_type_id.to_string(),
            });
        }

        info!("Selected device type {device_type_id}");
        self.selected = Some(device_type_id.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;

    fn selector() -> TypeSelector {
        TypeSelector::new(Duration::from_millis(5))
    }

    #[test]
    fn test_select_command_framing() {
        assert_eq!(select_command("27C256"), b"S27C256\r");
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut channel = Channel::new(MockPort::with_replies(&[b"*", b"*"]));
        let mut sel = selector();

        assert!(sel.select(&mut channel, "2764").unwrap());
        assert!(!sel.select(&mut channel, "2764").unwrap());

        assert_eq!(channel.port().write_buf, b"S2764\r");
        assert_eq!(sel.selected(), Some("2764"));
    }

    #[test]
    fn test_reselect_on_change() {
        let mut channel = Channel::new(MockPort::with_replies(&[b"*", b"*", b"*"]));
        let mut sel = selector();

        sel.select(&mut channel, "a").unwrap();
        sel.select(&mut channel, "b").unwrap();
        sel.select(&mut channel, "a").unwrap();

        assert_eq!(channel.port().write_buf, b"Sa\rSb\rSa\r");
        assert_eq!(sel.selected(), Some("a"));
    }

    #[test]
    fn test_selection_timeout_leaves_state_unchanged() {
        let mut channel = Channel::new(MockPort::with_replies(&[b"*", b"garbage"]));
        let mut sel = selector();

        sel.select(&mut channel, "2716").unwrap();
        let err = sel.select(&mut channel, "2732").unwrap_err();

        assert!(matches!(
            err,
            Error::SelectionTimeout { ref device_type_id } if device_type_id == "2732"
        ));
        assert_eq!(sel.selected(), Some("2716"));
    }

    #[test]
    fn test_first_selection_timeout() {
        let mut channel = Channel::new(MockPort::new(&[]));
        let mut sel = selector();

        assert!(sel.select(&mut channel, "2764").is_err());
        assert_eq!(sel.selected(), None);
        // The command was still sent once.
        assert_eq!(channel.port().write_buf, b"S2764\r");
    }

    #[test]
    fn test_broken_channel_names_selection() {
        let mut channel = Channel::new(MockPort::broken());
        let mut sel = selector();

        let err = sel.select(&mut channel, "2764").unwrap_err();
        assert!(matches!(
            err,
            Error::Channel {
                phase: Phase::Selection,
                ..
            }
        ));
        assert!(err.to_string().starts_with("Selection"));
        assert!(err.to_string().contains("device disconnected"));
        assert_eq!(sel.selected(), None);
    }

    #[test]
    fn test_waits_with_selection_timeout() {
        let mut channel = Channel::new(MockPort::with_replies(&[b"*"]));
        let mut sel = TypeSelector::new(Duration::from_secs(7));

        sel.select(&mut channel, "2764").unwrap();
        assert_eq!(channel.port().timeouts, vec![Duration::from_secs(7)]);
    }

    #[test]
    fn test_invalid_identifier_sends_nothing() {
        let mut channel = Channel::new(MockPort::with_replies(&[b"*"]));
        let mut sel = selector();

        assert!(matches!(sel.select(&mut channel, ""), Err(Error::Config(_))));
        assert!(matches!(
            sel.select(&mut channel, "27\r64"),
            Err(Error::Config(_))
        ));
        assert!(channel.port().write_buf.is_empty());
    }
}
