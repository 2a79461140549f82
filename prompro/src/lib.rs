//! # prompro
//!
//! A library for driving the Prompro-8 EPROM programmer over a serial line.
//!
//! This crate provides:
//!
//! - A byte channel with per-read timeouts over a serial port
//! - Prompt synchronisation (`*`) with the programmer's command loop
//! - Device type selection with redundant-selection suppression
//! - An EPROM type catalog mapping logical parts to device segments
//! - Multi-segment download into a local image file
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for catalog types
//!
//! ## Example
//!
//! ```rust,no_run
//! use prompro::{Catalog, EpromType, SerialConfig, Session, SessionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::from_types([
//!         EpromType::new("27C512", 32768)
//!             .with_segment("27256", 0)
//!             .with_segment("27256", 32768),
//!     ])?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let serial = SerialConfig::new("/dev/ttyUSB0", 19200).with_rtscts(true);
//!         let mut session = Session::open(&serial, catalog, SessionConfig::default())?;
//!         session.handshake()?;
//!         session.select_type("27C512")?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod download;
pub mod error;
pub mod port;
pub mod protocol;
pub mod session;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    catalog::{Catalog, EpromType, Segment},
    download::{DownloadOrchestrator, DownloadSummary, SegmentTransfer, SelectOnly, UploadCommand},
    error::{Error, ErrorKind, Phase, Result},
    port::{DEFAULT_READ_TIMEOUT, FlowControl, Parity, Port, SerialConfig},
    protocol::{Channel, PROMPT, TypeSelector, select::DEFAULT_SELECT_TIMEOUT, wait_for_prompt},
    session::{Session, SessionConfig},
};
