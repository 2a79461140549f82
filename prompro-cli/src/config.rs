//! Configuration file support for prompro.
//!
//! Configuration is loaded from the following sources (later ones override
//! earlier ones):
//! 1. Global config file (`<config dir>/prompro/config.toml`)
//! 2. Local config file (`./prompro.toml`)
//!
//! An explicit `--config PATH` replaces both. Environment variables
//! (`PROMPRO_*`) and command-line arguments override scalar settings on top.
//!
//! ```toml
//! [serial]
//! device = "/dev/ttyUSB0"
//! baud = 19200
//! rtscts = true
//!
//! [defaults]
//! eprom = "27C512"
//!
//! [[eprom]]
//! type = "27C512"
//! segsize = 32768
//! [[eprom.segment]]
//! use = "27256"
//! offset = 0
//! [[eprom.segment]]
//! use = "27256"
//! offset = 32768
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use directories::ProjectDirs;
use log::{debug, warn};
use prompro::{Catalog, EpromType};
use serde::{Deserialize, Serialize};

use crate::CliError;

/// Local configuration file name.
pub(crate) const LOCAL_CONFIG: &str = "prompro.toml";

/// Serial line settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialSection {
    /// Serial device path (e.g., "/dev/ttyUSB0" or "COM3").
    pub device: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// RTS/CTS hardware flow control.
    pub rtscts: Option<bool>,
    /// Per-byte read timeout in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Per-byte timeout while waiting for a selection, in milliseconds.
    pub select_timeout_ms: Option<u64>,
}

/// Default selections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsSection {
    /// Default EPROM type name.
    pub eprom: Option<String>,
}

/// One `[[eprom.segment]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Device type identifier to select for this segment.
    #[serde(rename = "use")]
    pub device_type: String,
    /// Byte offset within the image.
    #[serde(default)]
    pub offset: u32,
}

/// One `[[eprom]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpromEntry {
    /// EPROM type name.
    #[serde(rename = "type")]
    pub name: String,
    /// Segment size in bytes.
    #[serde(default)]
    pub segsize: u32,
    /// Command that makes the device send a segment's data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
    /// Segments in image order.
    #[serde(default, rename = "segment")]
    pub segments: Vec<SegmentEntry>,
}

impl From<&EpromEntry> for EpromType {
    fn from(entry: &EpromEntry) -> Self {
        let mut eprom = entry
            .segments
            .iter()
            .fold(EpromType::new(&entry.name, entry.segsize), |eprom, seg| {
                eprom.with_segment(&seg.device_type, seg.offset)
            });
        eprom.upload_command.clone_from(&entry.upload);
        eprom
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial settings.
    #[serde(default)]
    pub serial: SerialSection,
    /// Defaults.
    #[serde(default)]
    pub defaults: DefaultsSection,
    /// EPROM type definitions.
    #[serde(default, rename = "eprom")]
    pub eproms: Vec<EpromEntry>,
}

impl Config {
    /// Load configuration from the global and local files.
    ///
    /// Files that fail to parse are reported and skipped. It is an error if
    /// no file could be loaded at all.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        let mut loaded = false;

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
                loaded = true;
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
            loaded = true;
        }

        if !loaded {
            let global = Self::global_config_path()
                .map_or_else(|| "<config dir>/prompro/config.toml".to_string(), |p| {
                    p.display().to_string()
                });
            return Err(CliError::Config(format!(
                "Missing or invalid {global} and/or ./{LOCAL_CONFIG} files"
            ))
            .into());
        }

        Ok(config)
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config = Self::load_from_file(path).ok_or_else(|| {
            CliError::Config(format!("Missing or invalid config file {}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                return None;
            },
        };

        match Self::parse(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Failed to parse config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Parse and validate a configuration document.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;

        if config.serial.read_timeout_ms == Some(0) {
            anyhow::bail!("[serial] read_timeout_ms must be greater than 0");
        }
        if config.serial.select_timeout_ms == Some(0) {
            anyhow::bail!("[serial] select_timeout_ms must be greater than 0");
        }

        let mut seen = HashSet::new();
        for eprom in &config.eproms {
            if !seen.insert(eprom.name.as_str()) {
                anyhow::bail!("EPROM type '{}' is defined more than once", eprom.name);
            }
            if eprom.upload.is_some() && eprom.segsize == 0 {
                anyhow::bail!(
                    "EPROM type '{}' has an upload command but no segsize",
                    eprom.name
                );
            }
        }

        Ok(config)
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "prompro").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        let serial = other.serial;
        if serial.device.is_some() {
            self.serial.device = serial.device;
        }
        if serial.baud.is_some() {
            self.serial.baud = serial.baud;
        }
        if serial.rtscts.is_some() {
            self.serial.rtscts = serial.rtscts;
        }
        if serial.read_timeout_ms.is_some() {
            self.serial.read_timeout_ms = serial.read_timeout_ms;
        }
        if serial.select_timeout_ms.is_some() {
            self.serial.select_timeout_ms = serial.select_timeout_ms;
        }

        if other.defaults.eprom.is_some() {
            self.defaults.eprom = other.defaults.eprom;
        }

        // Later definitions replace earlier ones with the same name
        for eprom in other.eproms {
            if let Some(existing) = self
                .eproms
                .iter_mut()
                .find(|e| e.name == eprom.name)
            {
                *existing = eprom;
            } else {
                self.eproms.push(eprom);
            }
        }
    }

    /// Build the EPROM type catalog.
    pub fn catalog(&self) -> prompro::Result<Catalog> {
        Catalog::from_types(self.eproms.iter().map(EpromType::from))
    }

    /// Configured read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.serial
            .read_timeout_ms
            .map_or(prompro::DEFAULT_READ_TIMEOUT, Duration::from_millis)
    }

    /// Configured selection timeout.
    pub fn select_timeout(&self) -> Duration {
        self.serial
            .select_timeout_ms
            .map_or(prompro::DEFAULT_SELECT_TIMEOUT, Duration::from_millis)
    }
}
