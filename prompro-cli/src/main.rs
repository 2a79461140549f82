//! prompro CLI - Command-line tool for the Prompro-8 EPROM programmer.
//!
//! ## Features
//!
//! - Check that the programmer is connected and ready
//! - Select the device type for a configured EPROM part
//! - Download a multi-segment EPROM image to a file
//! - List the configured EPROM types
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use prompro::ErrorKind;
use std::path::PathBuf;

mod commands;
mod config;

use commands::{catalog::cmd_list_types, completions::cmd_completions, device};
use config::Config;

/// prompro - Drive a Prompro-8 EPROM programmer over a serial line.
///
/// Environment variables:
///   PROMPRO_PORT    - Serial device
///   PROMPRO_BAUD    - Baud rate
///   PROMPRO_EPROM   - EPROM type
///   PROMPRO_CONFIG  - Configuration file
#[derive(Parser)]
#[command(name = "prompro")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial device (overrides the configuration file).
    #[arg(short, long, global = true, env = "PROMPRO_PORT")]
    pub(crate) port: Option<String>,

    /// Baud rate (overrides the configuration file).
    #[arg(short, long, global = true, env = "PROMPRO_BAUD")]
    pub(crate) baud: Option<u32>,

    /// EPROM type to use (defaults to `[defaults] eprom`).
    #[arg(short = 't', long, global = true, env = "PROMPRO_EPROM")]
    pub(crate) eprom: Option<String>,

    /// Enable RTS/CTS flow control.
    #[arg(long, global = true)]
    pub(crate) rtscts: bool,

    /// Verbose output level (-v, -vv for wire tracing).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH", env = "PROMPRO_CONFIG")]
    pub(crate) config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Check that the programmer answers with its prompt.
    Ready,

    /// Select the device type of the EPROM type's first segment.
    Select,

    /// Download the EPROM image to a file.
    Download {
        /// Destination file.
        output: PathBuf,
    },

    /// List configured EPROM types.
    ListTypes {
        /// Output the catalog as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// CLI-level failures that are not library errors.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Missing or invalid configuration.
    #[error("{0}")]
    Config(String),

    /// The serial device could not be opened.
    #[error("Unable to open serial device {port}: {source}")]
    OpenPort {
        /// Device path.
        port: String,
        /// Underlying error.
        #[source]
        source: prompro::Error,
    },
}

/// Process exit codes for fatal conditions.
///
/// Code 2 is left to clap for usage errors.
pub(crate) mod exit_code {
    pub(crate) const GENERIC: i32 = 1;
    pub(crate) const OPEN_PORT: i32 = 3;
    pub(crate) const READ_IO: i32 = 4;
    pub(crate) const NOT_READY: i32 = 5;
    pub(crate) const SELECTION_TIMEOUT: i32 = 6;
    pub(crate) const CONFIG: i32 = 7;
    pub(crate) const DOWNLOAD: i32 = 8;
}

/// Map an error to the process exit code for its condition.
pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Config(_) => exit_code::CONFIG,
                CliError::OpenPort { .. } => exit_code::OPEN_PORT,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<prompro::Error>() {
            return match lib_err {
                prompro::Error::NotReady { .. } => exit_code::NOT_READY,
                prompro::Error::SelectionTimeout { .. } => exit_code::SELECTION_TIMEOUT,
                // Transfer timeouts count as failed reads
                other => match other.kind() {
                    ErrorKind::Io | ErrorKind::Timeout => exit_code::READ_IO,
                    ErrorKind::Configuration => exit_code::CONFIG,
                    ErrorKind::Download => exit_code::DOWNLOAD,
                },
            };
        }
    }
    exit_code::GENERIC
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "prompro v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return Ok(());
    }

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)?
    } else {
        Config::load()?
    };

    match &cli.command {
        Commands::Ready => device::cmd_ready(cli, &config),
        Commands::Select => device::cmd_select(cli, &config),
        Commands::Download { output } => device::cmd_download(cli, &config, output),
        Commands::ListTypes { json } => cmd_list_types(cli, &config, *json),
        Commands::Completions { .. } => Ok(()),
    }
}
