//! Commands that talk to the programmer: ready, select and download.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use prompro::{Catalog, EpromType, NativePort, SerialConfig, Session, SessionConfig};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::{Cli, CliError};

/// Default baud rate when neither the command line nor the config sets one.
const DEFAULT_BAUD: u32 = 9600;

/// Settings resolved from the command line, environment and config files.
#[derive(Debug, Clone)]
pub(crate) struct DeviceSettings {
    pub(crate) port: String,
    pub(crate) baud: u32,
    pub(crate) rtscts: bool,
    pub(crate) eprom: Option<String>,
    pub(crate) read_timeout: Duration,
    pub(crate) select_timeout: Duration,
}

impl DeviceSettings {
    pub(crate) fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let port = cli
            .port
            .clone()
            .or_else(|| config.serial.device.clone())
            .ok_or_else(|| {
                CliError::Config(
                    "No serial device configured (set [serial] device or use --port)".into(),
                )
            })?;

        Ok(Self {
            port,
            baud: cli
                .baud
                .or(config.serial.baud)
                .unwrap_or(DEFAULT_BAUD),
            rtscts: cli.rtscts || config.serial.rtscts.unwrap_or(false),
            eprom: cli
                .eprom
                .clone()
                .or_else(|| config.defaults.eprom.clone()),
            read_timeout: config.read_timeout(),
            select_timeout: config.select_timeout(),
        })
    }

    fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(&self.port, self.baud)
            .with_timeout(self.read_timeout)
            .with_rtscts(self.rtscts)
    }

    /// The EPROM type to operate on. Checked before any device I/O.
    fn eprom<'c>(&self, catalog: &'c Catalog) -> Result<&'c EpromType> {
        let name = self.eprom.as_deref().ok_or_else(|| {
            CliError::Config("No EPROM type given (use --eprom or set [defaults] eprom)".into())
        })?;
        let eprom = catalog.get(name)?;
        eprom.require_segments()?;
        Ok(eprom)
    }
}

/// Print the resolved settings, like the programmer's banner line.
fn print_settings(cli: &Cli, settings: &DeviceSettings) {
    if cli.quiet {
        return;
    }
    eprintln!(
        "{} Dev='{}', baud={}, rtscts={}, eprom={}",
        style("ℹ").blue(),
        settings.port,
        settings.baud,
        u8::from(settings.rtscts),
        settings.eprom.as_deref().unwrap_or("")
    );
}

/// Open the serial device and confirm the programmer answers.
fn connect(cli: &Cli, settings: &DeviceSettings, catalog: Catalog) -> Result<Session<NativePort>> {
    let session_config = SessionConfig {
        read_timeout: settings.read_timeout,
        select_timeout: settings.select_timeout,
        trace: cli.verbose >= 2,
    };

    let mut session = Session::open(&settings.serial_config(), catalog, session_config).map_err(
        |source| CliError::OpenPort {
            port: settings.port.clone(),
            source,
        },
    )?;

    session.handshake()?;
    Ok(session)
}

/// Ready command implementation.
pub(crate) fn cmd_ready(cli: &Cli, config: &Config) -> Result<()> {
    let settings = DeviceSettings::resolve(cli, config)?;
    print_settings(cli, &settings);

    let mut session = connect(cli, &settings, Catalog::new())?;
    session.close()?;

    println!("Ready.");
    Ok(())
}

/// Select command implementation.
pub(crate) fn cmd_select(cli: &Cli, config: &Config) -> Result<()> {
    let settings = DeviceSettings::resolve(cli, config)?;
    let catalog = config.catalog()?;
    let name = settings.eprom(&catalog)?.name.clone();
    print_settings(cli, &settings);

    let mut session = connect(cli, &settings, catalog)?;
    session.select_type(&name)?;

    let device_type = session
        .selected_device_type()
        .unwrap_or_default()
        .to_string();
    session.close()?;

    if !cli.quiet {
        eprintln!(
            "{} Selected {} (device type {})",
            style("✓").green(),
            style(&name).cyan(),
            device_type
        );
    }
    Ok(())
}

/// Download command implementation.
pub(crate) fn cmd_download(cli: &Cli, config: &Config, output: &Path) -> Result<()> {
    let settings = DeviceSettings::resolve(cli, config)?;
    let catalog = config.catalog()?;
    let eprom = settings.eprom(&catalog)?;
    let name = eprom.name.clone();
    let segment_count = eprom.segments.len();
    print_settings(cli, &settings);

    let mut session = connect(cli, &settings, catalog)?;
    session.select_type(&name)?;

    let pb = if cli.quiet || !console::Term::stderr().is_term() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(segment_count as u64);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    };

    let summary = session
        .download(output, |segment, index, _total| {
            pb.set_position(index as u64);
            pb.set_message(format!(
                "{} @ 0x{:06X}",
                segment.device_type_id, segment.offset
            ));
        })
        .with_context(|| format!("Downloading {name} to {}", output.display()))?;

    pb.finish_and_clear();
    session.close()?;

    if !cli.quiet {
        eprintln!(
            "{} Downloaded {} segments of {} ({} bytes, {} selections) to {}",
            style("✓").green().bold(),
            summary.segments,
            style(&name).cyan(),
            summary.bytes_written,
            summary.selections,
            style(output.display()).yellow()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Commands;
    use clap::Parser;

    fn config() -> Config {
        Config::parse(
            r#"
[serial]
device = "/dev/ttyUSB0"
baud = 19200

[defaults]
eprom = "2764"

[[eprom]]
type = "2764"
segsize = 8192
[[eprom.segment]]
use = "2764"
offset = 0

[[eprom]]
type = "empty"
segsize = 8192
"#,
        )
        .unwrap()
    }

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["prompro"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_resolve_from_config() {
        let cli = cli(&["ready"]);
        assert!(matches!(cli.command, Commands::Ready));
        let settings = DeviceSettings::resolve(&cli, &config()).unwrap();
        assert_eq!(settings.port, "/dev/ttyUSB0");
        assert_eq!(settings.baud, 19200);
        assert!(!settings.rtscts);
        assert_eq!(settings.eprom.as_deref(), Some("2764"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = cli(&["-p", "/dev/ttyS3", "-b", "4800", "--rtscts", "-t", "empty", "select"]);
        let settings = DeviceSettings::resolve(&cli, &config()).unwrap();
        assert_eq!(settings.port, "/dev/ttyS3");
        assert_eq!(settings.baud, 4800);
        assert!(settings.rtscts);
        assert_eq!(settings.eprom.as_deref(), Some("empty"));
        assert_eq!(
            settings.serial_config().flow_control,
            prompro::FlowControl::Hardware
        );
        assert_eq!(settings.serial_config().parity, prompro::Parity::Odd);
    }

    #[test]
    fn test_missing_device_is_config_error() {
        let cli = cli(&["ready"]);
        let err = DeviceSettings::resolve(&cli, &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Config(_))
        ));
    }

    #[test]
    fn test_missing_eprom_type_is_config_error() {
        let mut config = config();
        config.defaults.eprom = None;
        let catalog = config.catalog().unwrap();

        let settings = DeviceSettings::resolve(&cli(&["select"]), &config).unwrap();
        let err = settings.eprom(&catalog).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Config(_))
        ));
        assert_eq!(crate::exit_code_for_error(&err), crate::exit_code::CONFIG);
    }

    #[test]
    fn test_eprom_checks_before_io() {
        let config = config();
        let catalog = config.catalog().unwrap();

        let settings = DeviceSettings::resolve(&cli(&["-t", "2716", "select"]), &config).unwrap();
        let err = settings.eprom(&catalog).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<prompro::Error>(),
            Some(prompro::Error::UnknownType(_))
        ));

        let settings = DeviceSettings::resolve(&cli(&["-t", "empty", "select"]), &config).unwrap();
        let err = settings.eprom(&catalog).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<prompro::Error>(),
            Some(prompro::Error::NoSegments(_))
        ));

        let settings = DeviceSettings::resolve(&cli(&["select"]), &config).unwrap();
        assert_eq!(settings.eprom(&catalog).unwrap().name, "2764");
    }
}
