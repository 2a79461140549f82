//! EPROM type catalog.
//!
//! A logical EPROM part is handled by the programmer as one or more
//! segments. Each segment names the device type the programmer must be
//! switched to and where the segment's bytes begin in the logical image.
//! Larger parts are typically covered by several segments of a smaller
//! device type.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One region of a logical EPROM image.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    /// Identifier sent to the device with the select-type command.
    pub device_type_id: String,
    /// Byte offset of this segment within the logical image.
    pub offset: u32,
}

impl Segment {
    /// Create a new segment.
    pub fn new(device_type_id: impl Into<String>, offset: u32) -> Self {
        Self {
            device_type_id: device_type_id.into(),
            offset,
        }
    }
}

/// A user-selectable EPROM part.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpromType {
    /// Part name, unique within a catalog.
    pub name: String,
    /// Size of each segment in bytes.
    pub segment_size: u32,
    /// Segments in image order. Selection commands are issued in this order.
    pub segments: Vec<Segment>,
    /// Command that makes the device send the selected segment's data.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub upload_command: Option<String>,
}

impl EpromType {
    /// Create a type with no segments.
    pub fn new(name: impl Into<String>, segment_size: u32) -> Self {
        Self {
            name: name.into(),
            segment_size,
            segments: Vec::new(),
            upload_command: None,
        }
    }

    /// Append a segment.
    #[must_use]
    pub fn with_segment(mut self, device_type_id: impl Into<String>, offset: u32) -> Self {
        self.segments
            .push(Segment::new(device_type_id, offset));
        self
    }

    /// Set the upload command.
    #[must_use]
    pub fn with_upload_command(mut self, command: impl Into<String>) -> Self {
        self.upload_command = Some(command.into());
        self
    }

    /// First segment, used for the default selection.
    ///
    /// An empty segment list is a configuration error.
    pub fn first_segment(&self) -> Result<&Segment> {
        self.segments
            .first()
            .ok_or_else(|| Error::NoSegments(self.name.clone()))
    }

    /// Segments, rejecting an empty list.
    pub fn require_segments(&self) -> Result<&[Segment]> {
        if self.segments.is_empty() {
            Err(Error::NoSegments(self.name.clone()))
        } else {
            Ok(&self.segments)
        }
    }

    /// Size of the logical image covered by all segments.
    pub fn image_size(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| u64::from(s.offset) + u64::from(self.segment_size))
            .max()
            .unwrap_or(0)
    }

    /// Number of select commands a full download issues from an unselected
    /// device.
    pub fn selection_count(&self) -> usize {
        let mut count = 0;
        let mut previous: Option<&str> = None;
        for segment in &self.segments {
            if previous != Some(segment.device_type_id.as_str()) {
                count += 1;
                previous = Some(&segment.device_type_id);
            }
        }
        count
    }
}

/// Mapping from EPROM type name to its definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Catalog {
    types: BTreeMap<String, EpromType>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate names.
    pub fn from_types(types: impl IntoIterator<Item = EpromType>) -> Result<Self> {
        let mut catalog = Self::new();
        for eprom in types {
            if catalog.types.contains_key(&eprom.name) {
                return Err(Error::Config(format!(
                    "EPROM type '{}' is defined more than once",
                    eprom.name
                )));
            }
            catalog.insert(eprom);
        }
        Ok(catalog)
    }

    /// Insert or replace a type, returning the previous definition.
    pub fn insert(&mut self, eprom: EpromType) -> Option<EpromType> {
        self.types
            .insert(eprom.name.clone(), eprom)
    }

    /// Look up a type by name.
    pub fn get(&self, name: &str) -> Result<&EpromType> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types
            .keys()
            .map(String::as_str)
    }

    /// Types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &EpromType> {
        self.types.values()
    }

    /// Number of types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
