//! Multi-segment download of an EPROM image to a local file.
//!
//! The orchestrator walks the segments of an [`EpromType`] in order,
//! switches the programmer to each segment's device type (only when it
//! changes), asks a [`SegmentTransfer`] for the segment's bytes and writes
//! them into the destination file at the segment's offset.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use log::{debug, info};

use crate::catalog::{EpromType, Segment};
use crate::error::{Error, Phase, Result};
use crate::port::{DEFAULT_READ_TIMEOUT, Port};
use crate::protocol::{Channel, LINE_END, TypeSelector, wait_for_prompt};

/// Retrieves the payload of the currently selected segment.
pub trait SegmentTransfer {
    /// Read the bytes of `segment` from the device.
    ///
    /// Called right after the segment's device type was selected.
    fn read_segment<P: Port>(
        &mut self,
        channel: &mut Channel<P>,
        segment: &Segment,
        segment_size: u32,
    ) -> Result<Vec<u8>>;
}

/// Transfer that retrieves no data.
///
/// Segments are still selected in order and the destination file is still
/// created, but nothing is written to it. Used for EPROM types that have no
/// upload command configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOnly;

impl SegmentTransfer for SelectOnly {
    fn read_segment<P: Port>(
        &mut self,
        _channel: &mut Channel<P>,
        _segment: &Segment,
        _segment_size: u32,
    ) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Transfer that sends a configured upload command and reads back exactly
/// one segment of raw bytes followed by a prompt.
///
/// A segment that is not followed by the prompt fails the download, since the
/// device is then in an unknown state for the next selection.
#[derive(Debug, Clone)]
pub struct UploadCommand {
    command: String,
    timeout: Duration,
}

impl UploadCommand {
    /// Create a transfer sending `command` (without terminator).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the per-byte read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SegmentTransfer for UploadCommand {
    fn read_segment<P: Port>(
        &mut self,
        channel: &mut Channel<P>,
        segment: &Segment,
        segment_size: u32,
    ) -> Result<Vec<u8>> {
        let expected = segment_size as usize;

        let mut cmd = self.command.clone().into_bytes();
        cmd.push(LINE_END);
        channel.write(&cmd)?;

        let mut data = Vec::with_capacity(expected);
        while data.len() < expected {
            match channel.read_byte(self.timeout)? {
                Some(byte) => data.push(byte),
                None => {
                    return Err(Error::TransferTimeout {
                        offset: segment.offset,
                        received: data.len(),
                        expected,
                    });
                },
            }
        }

        if !wait_for_prompt(channel, self.timeout)? {
            return Err(Error::UploadUnconfirmed {
                offset: segment.offset,
            });
        }

        Ok(data)
    }
}

/// Outcome of a completed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadSummary {
    /// Segments processed.
    pub segments: usize,
    /// Select commands actually sent.
    pub selections: usize,
    /// Payload bytes written to the destination.
    pub bytes_written: u64,
}

/// Drives a download over the segments of one EPROM type.
pub struct DownloadOrchestrator<'a, P: Port> {
    channel: &'a mut Channel<P>,
    selector: &'a mut TypeSelector,
}

impl<'a, P: Port> DownloadOrchestrator<'a, P> {
    /// Create an orchestrator borrowing the session's channel and selector.
    pub fn new(channel: &'a mut Channel<P>, selector: &'a mut TypeSelector) -> Self {
        Self { channel, selector }
    }

    /// Download every segment of `eprom` into `destination`.
    ///
    /// The destination is created (or truncated) before the first selection.
    /// It is flushed and closed whether the download succeeds or fails.
    ///
    /// # Arguments
    ///
    /// * `eprom` - The EPROM type to download
    /// * `destination` - Output file path
    /// * `transfer` - How each segment's bytes are retrieved
    /// * `progress` - Progress callback (segment, index, total segments)
    pub fn download<T, F>(
        &mut self,
        eprom: &EpromType,
        destination: &Path,
        transfer: &mut T,
        mut progress: F,
    ) -> Result<DownloadSummary>
    where
        T: SegmentTransfer,
        F: FnMut(&Segment, usize, usize),
    {
        let segments = eprom.require_segments()?;

        let file = File::create(destination).map_err(|source| Error::Download {
            path: destination.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);

        info!(
            "Downloading {} ({} segments of {} bytes, {} byte image) to {}",
            eprom.name,
            segments.len(),
            eprom.segment_size,
            eprom.image_size(),
            destination.display()
        );

        let mut summary = DownloadSummary::default();
        let outcome = self
            .download_segments(
                eprom,
                segments,
                destination,
                &mut out,
                transfer,
                &mut progress,
                &mut summary,
            )
            .map_err(|e| e.during(Phase::Download));

        let flushed = out
            .flush()
            .map_err(|source| Error::Download {
                path: destination.to_path_buf(),
                source,
            });

        outcome?;
        flushed?;

        info!(
            "Download complete: {} segments, {} selections, {} bytes",
            summary.segments, summary.selections, summary.bytes_written
        );
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn download_segments<W, T, F>(
        &mut self,
        eprom: &EpromType,
        segments: &[Segment],
        destination: &Path,
        out: &mut W,
        transfer: &mut T,
        progress: &mut F,
        summary: &mut DownloadSummary,
    ) -> Result<()>
    where
        W: Write + Seek,
        T: SegmentTransfer,
        F: FnMut(&Segment, usize, usize),
    {
        let total = segments.len();

        for (index, segment) in segments.iter().enumerate() {
            progress(segment, index, total);

            if self
                .selector
                .select(self.channel, &segment.device_type_id)?
            {
                summary.selections += 1;
            }

            let data = transfer.read_segment(self.channel, segment, eprom.segment_size)?;
            if !data.is_empty() {
                debug!(
                    "Writing {} bytes at offset {:#x}",
                    data.len(),
                    segment.offset
                );
                out.seek(SeekFrom::Start(u64::from(segment.offset)))
                    .and_then(|_| out.write_all(&data))
                    .map_err(|source| Error::Download {
                        path: destination.to_path_buf(),
                        source,
                    })?;
                summary.bytes_written += data.len() as u64;
            }

            summary.segments += 1;
        }

        progress(&segments[total - 1], total, total);
        Ok(())
    }
}
