//! Configuration management and validation.
//!
//! Provides configuration structures for the acquisition query, the
//! post-processing pipeline, output locations and accelerator telemetry.
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then command-line overrides applied by the CLI.

use crate::constants::{
    DEFAULT_CHANNELS, DEFAULT_DURATION_SECS, DEFAULT_LATITUDE, DEFAULT_LONGITUDE,
    DEFAULT_OUTPUT_DIR, DEFAULT_PRE_FILTER, DEFAULT_PROVIDERS, DEFAULT_RADIUS_DEG,
    DEFAULT_RESPONSE_TAPER_FRACTION, DEFAULT_START, DEFAULT_TAPER_MAX_PERCENTAGE,
    DEFAULT_TELEMETRY_END, DEFAULT_TELEMETRY_OUTPUT, DEFAULT_TELEMETRY_SIGNALS,
    DEFAULT_TELEMETRY_START, DEFAULT_TELEMETRY_TIMEZONE, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WATER_LEVEL_DB, EIDA_ROUTING_URL,
};
use crate::error::{Result, SeismoError};
use crate::models::OutputUnit;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub acquisition: AcquisitionConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    pub telemetry: TelemetryConfig,
}

/// Where, when and from whom to fetch waveforms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Site latitude in degrees
    pub latitude: f64,

    /// Site longitude in degrees
    pub longitude: f64,

    /// Station search radius in degrees
    pub radius_deg: f64,

    /// FDSN channel pattern, comma separated with `?`/`*` wildcards
    pub channels: String,

    /// Start of the time window (UTC)
    pub start: DateTime<Utc>,

    /// Window length in seconds
    pub duration_secs: u64,

    /// Provider identifiers in fallback priority order
    pub providers: Vec<String>,

    /// Per-connection timeout in seconds
    pub timeout_secs: u64,

    /// EIDA routing service used for station discovery
    pub routing_url: String,

    /// Probe each provider's dataselect service when building the pool
    pub probe_providers: bool,
}

/// Post-processing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Deconvolution pre-filter corners f1 < f2 < f3 < f4 (Hz)
    pub pre_filter_corners: [f64; 4],

    /// Physical quantity produced by response removal
    pub output_unit: OutputUnit,

    /// Fraction of samples tapered at each trace end
    pub taper_max_percentage: f64,

    /// Cosine taper fraction applied inside response removal
    pub response_taper_fraction: f64,

    /// Water level in dB, `None` disables regularisation
    pub water_level_db: Option<f64>,
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving miniSEED and Parquet files, created if absent
    pub directory: PathBuf,

    /// Also write the one-row-per-sample Parquet table
    pub write_parquet: bool,
}

/// Accelerator telemetry download
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL of the telemetry export gateway
    pub base_url: Option<String>,

    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,

    /// Signal names to download
    pub signals: Vec<String>,

    /// Parquet file the telemetry is written to
    pub output_path: PathBuf,

    /// IANA zone used when restoring timestamps on load
    pub timezone: String,

    pub timeout_secs: u64,
}

fn parse_default_utc(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn parse_default_fixed(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value)
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH.fixed_offset())
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            radius_deg: DEFAULT_RADIUS_DEG,
            channels: DEFAULT_CHANNELS.to_string(),
            start: parse_default_utc(DEFAULT_START),
            duration_secs: DEFAULT_DURATION_SECS,
            providers: DEFAULT_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            routing_url: EIDA_ROUTING_URL.to_string(),
            probe_providers: true,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            pre_filter_corners: DEFAULT_PRE_FILTER,
            output_unit: OutputUnit::Velocity,
            taper_max_percentage: DEFAULT_TAPER_MAX_PERCENTAGE,
            response_taper_fraction: DEFAULT_RESPONSE_TAPER_FRACTION,
            water_level_db: Some(DEFAULT_WATER_LEVEL_DB),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
            write_parquet: true,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            start: parse_default_fixed(DEFAULT_TELEMETRY_START),
            end: parse_default_fixed(DEFAULT_TELEMETRY_END),
            signals: DEFAULT_TELEMETRY_SIGNALS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_path: PathBuf::from(DEFAULT_TELEMETRY_OUTPUT),
            timezone: DEFAULT_TELEMETRY_TIMEZONE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AcquisitionConfig {
    /// End of the acquisition window, `Err` when it is not representable
    pub fn end(&self) -> Result<DateTime<Utc>> {
        i64::try_from(self.duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|length| self.start.checked_add_signed(length))
            .ok_or_else(|| {
                SeismoError::configuration(format!(
                    "duration of {} s from {} is out of range",
                    self.duration_secs, self.start
                ))
            })
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Window length in whole minutes, used in output file names
    pub fn duration_minutes(&self) -> u64 {
        self.duration_secs / 60
    }
}

impl Config {
    /// Default config file location (~/.config/seismo-cern/config.toml)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SeismoError::configuration("Could not determine config directory"))?;
        Ok(config_dir.join("seismo-cern").join("config.toml"))
    }

    /// Load defaults, then overlay the TOML file if given
    pub fn load_layered(config_file: Option<&Path>) -> Result<Self> {
        let config = match config_file {
            Some(path) => {
                debug!("Reading configuration from {}", path.display());
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    SeismoError::configuration(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validate ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;
        if !(-90.0..=90.0).contains(&acq.latitude) {
            return Err(SeismoError::configuration(format!(
                "latitude {} outside [-90, 90]",
                acq.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&acq.longitude) {
            return Err(SeismoError::configuration(format!(
                "longitude {} outside [-180, 180]",
                acq.longitude
            )));
        }
        if acq.radius_deg <= 0.0 || acq.radius_deg > 180.0 {
            return Err(SeismoError::configuration(format!(
                "radius_deg {} must be in (0, 180]",
                acq.radius_deg
            )));
        }
        if acq.channels.trim().is_empty() {
            return Err(SeismoError::configuration("channels must not be empty"));
        }
        if acq.duration_secs == 0 {
            return Err(SeismoError::configuration("duration must be positive"));
        }
        acq.end()?;

        let proc = &self.processing;
        let corners = proc.pre_filter_corners;
        if corners[0] < 0.0 || !corners.windows(2).all(|w| w[0] < w[1]) {
            return Err(SeismoError::configuration(format!(
                "pre_filter_corners {:?} must be non-negative and strictly ascending",
                corners
            )));
        }
        if !(proc.taper_max_percentage > 0.0 && proc.taper_max_percentage <= 0.5) {
            return Err(SeismoError::configuration(format!(
                "taper_max_percentage {} must be in (0, 0.5]",
                proc.taper_max_percentage
            )));
        }
        if !(0.0..=1.0).contains(&proc.response_taper_fraction) {
            return Err(SeismoError::configuration(format!(
                "response_taper_fraction {} must be in [0, 1]",
                proc.response_taper_fraction
            )));
        }

        let tel = &self.telemetry;
        if tel.end <= tel.start {
            return Err(SeismoError::configuration(
                "telemetry end must be after start",
            ));
        }
        if tel.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(SeismoError::configuration(format!(
                "unknown timezone '{}'",
                tel.timezone
            )));
        }

        Ok(())
    }

    /// Ensure the output directory exists
    pub fn ensure_output_directory(&self) -> Result<()> {
        if !self.output.directory.exists() {
            std::fs::create_dir_all(&self.output.directory).map_err(|e| {
                SeismoError::configuration(format!(
                    "Failed to create output directory '{}': {}",
                    self.output.directory.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    pub fn with_site(mut self, latitude: f64, longitude: f64) -> Self {
        self.acquisition.latitude = latitude;
        self.acquisition.longitude = longitude;
        self
    }

    pub fn with_radius(mut self, radius_deg: f64) -> Self {
        self.acquisition.radius_deg = radius_deg;
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, duration_secs: u64) -> Self {
        self.acquisition.start = start;
        self.acquisition.duration_secs = duration_secs;
        self
    }

    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.acquisition.providers = providers;
        self
    }

    pub fn with_output_directory(mut self, directory: PathBuf) -> Self {
        self.output.directory = directory;
        self
    }

    pub fn without_parquet(mut self) -> Self {
        self.output.write_parquet = false;
        self
    }

    pub fn with_output_unit(mut self, unit: OutputUnit) -> Self {
        self.processing.output_unit = unit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_describe_meyrin_run() {
        let config = Config::default();
        assert_eq!(config.acquisition.latitude, 46.234233);
        assert_eq!(config.acquisition.longitude, 6.055018);
        assert_eq!(config.acquisition.radius_deg, 0.01);
        assert_eq!(config.acquisition.channels, "HH?,BH?,EH?");
        assert_eq!(
            config.acquisition.start,
            Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap()
        );
        assert_eq!(
            config.acquisition.end().unwrap(),
            Utc.with_ymd_and_hms(2025, 7, 30, 2, 24, 0).unwrap()
        );
        assert_eq!(
            config.acquisition.providers,
            vec!["RESIF", "ETH", "ORFEUS", "INGV", "GFZ", "ODC"]
        );
        assert_eq!(config.processing.pre_filter_corners, [0.05, 0.08, 40.0, 45.0]);
        assert_eq!(config.processing.output_unit, OutputUnit::Velocity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overlays_defaults() {
        let toml = r#"
            [acquisition]
            radius_deg = 0.5
            providers = ["ETH", "RESIF"]
            start = "2025-08-01T00:00:00Z"

            [processing]
            output_unit = "DISP"
            pre_filter_corners = [0.01, 0.02, 8.0, 9.0]

            [output]
            directory = "/tmp/seismo"
        "#;

        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.acquisition.radius_deg, 0.5);
        assert_eq!(config.acquisition.providers, vec!["ETH", "RESIF"]);
        assert_eq!(config.acquisition.latitude, 46.234233);
        assert_eq!(config.processing.output_unit, OutputUnit::Displacement);
        assert_eq!(config.output.directory, PathBuf::from("/tmp/seismo"));
        assert!(config.output.write_parquet);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = Config::from_toml_str("[acquisition]\nradius_deg = \"wide\"");
        assert!(matches!(result, Err(SeismoError::ConfigFile(_))));
    }

    #[test]
    fn test_validation_rejects_descending_corners() {
        let mut config = Config::default();
        config.processing.pre_filter_corners = [0.05, 0.08, 45.0, 40.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_site() {
        let config = Config::default().with_site(95.0, 6.0);
        assert!(config.validate().is_err());

        let config = Config::default().with_radius(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_provider_list_is_valid() {
        // An empty pool is reported per station at run time
        let config = Config::default().with_providers(vec![]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_unrepresentable_window() {
        let mut config = Config::default();
        config.acquisition.duration_secs = 10_000_000_000_000;
        assert!(matches!(
            config.validate(),
            Err(SeismoError::Configuration { .. })
        ));
        assert!(config.acquisition.end().is_err());

        config.acquisition.duration_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_timezone() {
        let mut config = Config::default();
        config.telemetry.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_layered_missing_file() {
        let result = Config::load_layered(Some(Path::new("/nonexistent/seismo.toml")));
        assert!(matches!(result, Err(SeismoError::Configuration { .. })));
    }

    #[test]
    fn test_load_layered_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[acquisition]\nduration_secs = 1800\n").unwrap();

        let config = Config::load_layered(Some(&path)).unwrap();
        assert_eq!(config.acquisition.duration_minutes(), 30);
    }
}
