//! A session with one Prompro-8 programmer.
//!
//! The session owns the serial channel for its whole lifetime together with
//! the catalog and the selection state. All protocol operations go through
//! it; nothing else holds a handle to the port.
//!
//! ## Example
//!
//! ```rust,no_run
//! use prompro::{Catalog, EpromType, SerialConfig, Session, SessionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::from_types([
//!         EpromType::new("27C256", 32768).with_segment("27C256", 0),
//!     ])?;
//!
//!     let serial = SerialConfig::new("/dev/ttyUSB0", 19200);
//!     let mut session = Session::open(&serial, catalog, SessionConfig::default())?;
//!
//!     session.handshake()?;
//!     session.select_type("27C256")?;
//!     session.download("image.bin".as_ref(), |_, _, _| {})?;
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};

use crate::catalog::{Catalog, EpromType, Segment};
use crate::download::{DownloadOrchestrator, DownloadSummary, SelectOnly, UploadCommand};
use crate::error::{Error, Phase, Result};
use crate::port::{DEFAULT_READ_TIMEOUT, Port};
use crate::protocol::select::DEFAULT_SELECT_TIMEOUT;
use crate::protocol::{Channel, LINE_END, TypeSelector, wait_for_prompt};

/// Timing and tracing settings for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Per-byte timeout for the handshake and data reads.
    pub read_timeout: Duration,
    /// Per-byte timeout while waiting for a selection to be confirmed.
    pub select_timeout: Duration,
    /// Trace raw wire bytes.
    pub trace: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            select_timeout: DEFAULT_SELECT_TIMEOUT,
            trace: false,
        }
    }
}

/// Session with a single programmer.
pub struct Session<P: Port> {
    channel: Channel<P>,
    selector: TypeSelector,
    catalog: Catalog,
    active: Option<String>,
    read_timeout: Duration,
}

impl<P: Port> Session<P> {
    /// Create a session over an opened port.
    pub fn new(port: P, catalog: Catalog, config: SessionConfig) -> Self {
        Self {
            channel: Channel::new(port).with_trace(config.trace),
            selector: TypeSelector::new(config.select_timeout),
            catalog,
            active: None,
            read_timeout: config.read_timeout,
        }
    }

    /// The catalog this session was built with.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Name of the serial port.
    pub fn port_name(&self) -> &str {
        self.channel.port().name()
    }

    /// Device type the programmer last confirmed.
    pub fn selected_device_type(&self) -> Option<&str> {
        self.selector.selected()
    }

    /// Make `name` the active EPROM type. No device I/O is performed.
    pub fn set_active_type(&mut self, name: &str) -> Result<&EpromType> {
        let eprom = self.catalog.get(name)?;
        self.active = Some(name.to_string());
        Ok(eprom)
    }

    /// The active EPROM type.
    pub fn active_type(&self) -> Result<&EpromType> {
        let name = self
            .active
            .as_deref()
            .ok_or_else(|| Error::Config("no EPROM type selected".into()))?;
        self.catalog.get(name)
    }

    /// Confirm the device is present by sending a bare carriage return and
    /// waiting for the prompt.
    ///
    /// Input left over from before the session started is discarded first.
    pub fn handshake(&mut self) -> Result<()> {
        debug!("Handshake on {}", self.channel.port().name());
        let ready = self
            .channel
            .port_mut()
            .clear_buffers()
            .and_then(|()| self.channel.write(&[LINE_END]))
            .and_then(|()| wait_for_prompt(&mut self.channel, self.read_timeout))
            .map_err(|e| e.during(Phase::Handshake))?;

        if !ready {
            return Err(Error::NotReady {
                timeout_ms: u64::try_from(self.read_timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }

        info!("Programmer ready on {}", self.channel.port().name());
        Ok(())
    }

    /// Select a device type by its identifier.
    ///
    /// Returns `true` when a select command was actually sent.
    pub fn select(&mut self, device_type_id: &str) -> Result<bool> {
        self.selector.select(&mut self.channel, device_type_id)
    }

    /// Select the device type of the active EPROM type's first segment.
    pub fn select_default(&mut self) -> Result<()> {
        let segment = self.active_type()?.first_segment()?.device_type_id.clone();
        self.select(&segment)?;
        Ok(())
    }

    /// Make `name` active and select its first segment's device type.
    pub fn select_type(&mut self, name: &str) -> Result<()> {
        self.set_active_type(name)?;
        self.select_default()
    }

    /// Download the active EPROM type into `destination`.
    ///
    /// Types with an upload command have each segment's bytes written at its
    /// offset. Types without one only have their segments selected and the
    /// destination created.
    pub fn download<F>(&mut self, destination: &Path, progress: F) -> Result<DownloadSummary>
    where
        F: FnMut(&Segment, usize, usize),
    {
        let name = self
            .active
            .as_deref()
            .ok_or_else(|| Error::Config("no EPROM type selected".into()))?;
        let eprom = self.catalog.get(name)?;

        let mut orchestrator = DownloadOrchestrator::new(&mut self.channel, &mut self.selector);
        match eprom.upload_command.as_deref() {
            Some(command) => {
                let mut transfer = UploadCommand::new(command).with_timeout(self.read_timeout);
                orchestrator.download(eprom, destination, &mut transfer, progress)
            },
            None => {
                warn!(
                    "EPROM type {} has no upload command; segments are selected but no data is transferred",
                    eprom.name
                );
                orchestrator.download(eprom, destination, &mut SelectOnly, progress)
            },
        }
    }

    /// Close the serial port.
    pub fn close(&mut self) -> Result<()> {
        self.channel.port_mut().close()
    }
}

impl<P: Port> Drop for Session<P> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// Native-specific convenience functions
#[cfg(feature = "native")]
mod native_impl {
    use super::{Catalog, Result, Session, SessionConfig};
    use crate::port::{NativePort, SerialConfig};

    impl Session<NativePort> {
        /// Open the serial port described by `serial` and start a session.
        pub fn open(serial: &SerialConfig, catalog: Catalog, config: SessionConfig) -> Result<Self> {
            let port = NativePort::open(serial)?;
            Ok(Self::new(port, catalog, config))
        }
    }
}
