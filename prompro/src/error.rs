//! Error types for prompro.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for prompro operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol phase a channel failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Startup handshake.
    Handshake,
    /// Device type selection.
    Selection,
    /// Segment download.
    Download,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Handshake => "Handshake",
            Self::Selection => "Selection",
            Self::Download => "Download",
        })
    }
}

/// Error type for prompro operations.
///
/// Every variant is terminal for the current run. The device protocol is a
/// synchronous request/response exchange with no retry semantics.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial channel.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error (typically while opening or configuring the port).
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The channel broke while a protocol phase was in progress.
    #[error("{phase}: channel I/O error: {source}")]
    Channel {
        /// Phase that was running.
        phase: Phase,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The device did not answer the startup handshake with a prompt.
    #[error("Handshake: device is not ready (no prompt within {timeout_ms} ms)")]
    NotReady {
        /// Per-byte timeout that elapsed.
        timeout_ms: u64,
    },

    /// The device did not confirm a select-type command with a prompt.
    #[error("Selection: timed out selecting device type '{device_type_id}'")]
    SelectionTimeout {
        /// Device type identifier that was being selected.
        device_type_id: String,
    },

    /// The device stopped sending segment data before the segment was complete.
    #[error("Download: timed out reading segment at offset {offset:#x} ({received} of {expected} bytes)")]
    TransferTimeout {
        /// Offset of the segment within the image.
        offset: u32,
        /// Bytes received before the timeout.
        received: usize,
        /// Bytes expected for the segment.
        expected: usize,
    },

    /// Requested EPROM type is not present in the catalog.
    #[error("Configuration: unknown EPROM type '{0}'")]
    UnknownType(String),

    /// EPROM type exists but has no segments.
    #[error("Configuration: EPROM type '{0}' has no segments")]
    NoSegments(String),

    /// The device sent a full segment but never returned to its prompt.
    #[error("Download: no prompt after segment at offset {offset:#x}")]
    UploadUnconfirmed {
        /// Offset of the segment within the image.
        offset: u32,
    },

    /// Destination file could not be opened or written.
    #[error("Download: cannot write {}: {source}", .path.display())]
    Download {
        /// Destination path.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Other configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The channel itself is broken (open/read/write failure).
    Io,
    /// The device is present but did not answer in time.
    Timeout,
    /// The catalog or settings are unusable. Detected before device I/O.
    Configuration,
    /// The destination file could not be written.
    Download,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Channel { .. } => ErrorKind::Io,
            #[cfg(feature = "native")]
            Self::Serial(_) => ErrorKind::Io,
            Self::NotReady { .. }
            | Self::SelectionTimeout { .. }
            | Self::TransferTimeout { .. }
            | Self::UploadUnconfirmed { .. } => ErrorKind::Timeout,
            Self::UnknownType(_) | Self::NoSegments(_) | Self::Config(_) => {
                ErrorKind::Configuration
            },
            Self::Download { .. } => ErrorKind::Download,
        }
    }

    /// Attribute a raw channel failure to `phase`. Other errors pass through.
    pub(crate) fn during(self, phase: Phase) -> Self {
        match self {
            Self::Io(source) => Self::Channel { phase, source },
            #[cfg(feature = "native")]
            Self::Serial(err) => Self::Channel {
                phase,
                source: err.into(),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).kind(),
            ErrorKind::Io
        );
        assert_eq!(Error::NotReady { timeout_ms: 2000 }.kind(), ErrorKind::Timeout);
        assert_eq!(
            Error::SelectionTimeout {
                device_type_id: "2764".into()
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::UnknownType("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(Error::NoSegments("x".into()).kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_messages_name_phase() {
        let err = Error::SelectionTimeout {
            device_type_id: "27256".into(),
        };
        assert!(err.to_string().starts_with("Selection"));
        assert!(err.to_string().contains("27256"));

        let err = Error::NotReady { timeout_ms: 2000 };
        assert!(err.to_string().starts_with("Handshake"));

        let err = Error::Download {
            path: PathBuf::from("/tmp/out.bin"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"),
        };
        assert!(err.to_string().starts_with("Download"));
        assert!(err.to_string().contains("Permission denied"));

        let err = Error::UploadUnconfirmed { offset: 0x8000 };
        assert!(err.to_string().starts_with("Download"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_during_attributes_channel_errors() {
        let err = Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"))
            .during(Phase::Handshake);
        assert!(matches!(
            err,
            Error::Channel {
                phase: Phase::Handshake,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(
            err.to_string(),
            "Handshake: channel I/O error: device disconnected"
        );

        // Protocol errors keep their own wording
        let err = Error::NotReady { timeout_ms: 5 }.during(Phase::Selection);
        assert!(matches!(err, Error::NotReady { .. }));
    }
}
