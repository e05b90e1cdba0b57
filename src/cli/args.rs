//! Command-line argument definitions for seismo-cern
//!
//! The CLI is defined with the clap derive API. Every override is optional:
//! unset flags leave the value from the configuration file (or the built-in
//! defaults) untouched.

use crate::error::{Result, SeismoError};
use crate::models::OutputUnit;
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the seismo-cern tool
///
/// Fetches seismic waveforms recorded around the CERN site from FDSN data
/// centres, removes the instrument response, and relates the ground motion
/// to LHC accelerator telemetry.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "seismo-cern",
    version,
    about = "Fetch seismic waveforms around CERN and correlate them with LHC telemetry",
    long_about = "Discovers seismic stations near the CERN site through the EIDA routing service, \
                  downloads waveforms with provider fallback, removes instrument response and \
                  stores the result as miniSEED and Parquet. Accelerator telemetry can be \
                  downloaded and aggregated against the seismic samples per fill and beam mode."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Discover stations, fetch waveforms and remove instrument response
    Fetch(FetchArgs),
    /// Download accelerator telemetry into a Parquet file
    Telemetry(TelemetryArgs),
    /// Aggregate seismic samples per fill number and beam mode
    Correlate(CorrelateArgs),
}

/// Logging and configuration flags shared by every subcommand
#[derive(Debug, Clone, Parser)]
pub struct CommonArgs {
    /// Configuration file (TOML)
    ///
    /// Defaults to ~/.config/seismo-cern/config.toml when that file exists.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings and hides progress bars.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl CommonArgs {
    /// Get the log level based on verbosity and quiet flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Arguments for the fetch command
#[derive(Debug, Clone, Parser)]
pub struct FetchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Site latitude in degrees
    #[arg(long = "lat", value_name = "DEG", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Site longitude in degrees
    #[arg(long = "lon", value_name = "DEG", allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Station search radius in degrees
    #[arg(short = 'r', long = "radius", value_name = "DEG")]
    pub radius_deg: Option<f64>,

    /// Channel pattern, e.g. "HH?,BH?,EH?"
    #[arg(long = "channels", value_name = "PATTERN")]
    pub channels: Option<String>,

    /// Start of the window (RFC 3339, e.g. 2025-07-29T23:24:00Z)
    #[arg(short = 's', long = "start", value_name = "TIME")]
    pub start: Option<String>,

    /// Window length in minutes
    #[arg(short = 'd', long = "duration", value_name = "MINUTES")]
    pub duration_minutes: Option<u64>,

    /// Providers in fallback order, comma separated (names or base URLs)
    #[arg(
        short = 'p',
        long = "providers",
        value_name = "LIST",
        value_delimiter = ','
    )]
    pub providers: Option<Vec<String>>,

    /// Directory receiving the miniSEED and Parquet files
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output_directory: Option<PathBuf>,

    /// Only write miniSEED
    #[arg(long = "no-parquet")]
    pub no_parquet: bool,

    /// Output quantity of response removal: DISP, VEL or ACC
    #[arg(long = "output-unit", value_name = "UNIT")]
    pub output_unit: Option<OutputUnit>,

    /// Skip the dataselect version probe when connecting to providers
    #[arg(long = "no-probe")]
    pub no_probe: bool,

    /// EIDA routing service URL
    #[arg(long = "routing-url", value_name = "URL")]
    pub routing_url: Option<String>,

    /// Per-connection timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl FetchArgs {
    /// Parse the `--start` override
    pub fn parsed_start(&self) -> Result<Option<DateTime<Utc>>> {
        self.start
            .as_deref()
            .map(|value| parse_time(value).map(|t| t.with_timezone(&Utc)))
            .transpose()
    }
}

/// Arguments for the telemetry command
#[derive(Debug, Clone, Parser)]
pub struct TelemetryArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Base URL of the telemetry export gateway
    #[arg(short = 'u', long = "url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Start of the window (RFC 3339 with offset)
    #[arg(short = 's', long = "start", value_name = "TIME")]
    pub start: Option<String>,

    /// End of the window (RFC 3339 with offset)
    #[arg(short = 'e', long = "end", value_name = "TIME")]
    pub end: Option<String>,

    /// Signals to download, comma separated
    #[arg(long = "signals", value_name = "LIST", value_delimiter = ',')]
    pub signals: Option<Vec<String>>,

    /// Parquet file to write
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// IANA timezone used when the file is read back
    #[arg(long = "timezone", value_name = "ZONE")]
    pub timezone: Option<String>,
}

impl TelemetryArgs {
    pub fn parsed_start(&self) -> Result<Option<DateTime<FixedOffset>>> {
        self.start.as_deref().map(parse_time).transpose()
    }

    pub fn parsed_end(&self) -> Result<Option<DateTime<FixedOffset>>> {
        self.end.as_deref().map(parse_time).transpose()
    }
}

/// Arguments for the correlate command
#[derive(Debug, Clone, Parser)]
pub struct CorrelateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Tabular seismic Parquet written by `fetch`
    #[arg(long = "seismic", value_name = "FILE")]
    pub seismic_path: PathBuf,

    /// Telemetry Parquet written by `telemetry` (defaults to the configured output)
    #[arg(long = "telemetry", value_name = "FILE")]
    pub telemetry_path: Option<PathBuf>,

    /// Write the summary table to this Parquet file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// IANA timezone used to present telemetry times
    #[arg(long = "timezone", value_name = "ZONE")]
    pub timezone: Option<String>,

    /// Signal holding the fill number
    #[arg(long = "fill-signal", value_name = "NAME")]
    pub fill_signal: Option<String>,

    /// Signal holding the beam mode
    #[arg(long = "mode-signal", value_name = "NAME")]
    pub mode_signal: Option<String>,
}

fn parse_time(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
        SeismoError::configuration(format!("invalid time '{}': {}", value, e))
    })
}
