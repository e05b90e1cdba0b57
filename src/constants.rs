//! Application constants for the seismo_cern acquisition tool
//!
//! Default site coordinates, FDSN provider registry, processing parameters
//! and accelerator signal names.

// =============================================================================
// Site and Query Defaults
// =============================================================================

/// Approximate CERN Meyrin site latitude (degrees)
pub const DEFAULT_LATITUDE: f64 = 46.234233;

/// Approximate CERN Meyrin site longitude (degrees)
pub const DEFAULT_LONGITUDE: f64 = 6.055018;

/// Search radius around the site in degrees
pub const DEFAULT_RADIUS_DEG: f64 = 0.01;

/// Broadband, high-gain and short-period channel families
pub const DEFAULT_CHANNELS: &str = "HH?,BH?,EH?";

/// Start of the default acquisition window (UTC, RFC 3339)
pub const DEFAULT_START: &str = "2025-07-29T23:24:00Z";

/// Length of the default acquisition window (3 hours)
pub const DEFAULT_DURATION_SECS: u64 = 180 * 60;

/// Per-connection timeout for provider clients
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Location wildcard used for every dataselect request
pub const ALL_LOCATIONS: &str = "*";

// =============================================================================
// FDSN Services
// =============================================================================

/// EIDA routing service endpoint
pub const EIDA_ROUTING_URL: &str = "https://www.orfeus-eu.org/eidaws/routing/1/query";

/// Providers tried in fallback order (most likely for the Geneva area first)
pub const DEFAULT_PROVIDERS: &[&str] = &["RESIF", "ETH", "ORFEUS", "INGV", "GFZ", "ODC"];

/// Known FDSN data centres keyed by short identifier
pub const PROVIDER_BASE_URLS: &[(&str, &str)] = &[
    ("RESIF", "https://ws.resif.fr"),
    ("ETH", "https://eida.ethz.ch"),
    ("ORFEUS", "https://www.orfeus-eu.org"),
    ("INGV", "https://webservices.ingv.it"),
    ("GFZ", "https://geofon.gfz.de"),
    ("ODC", "https://www.orfeus-eu.org"),
    ("BGR", "https://eida.bgr.de"),
    ("NOA", "https://eida.gein.noa.gr"),
    ("IRIS", "https://service.iris.edu"),
];

/// Path of the dataselect query endpoint relative to a provider base URL
pub const DATASELECT_QUERY_PATH: &str = "/fdsnws/dataselect/1/query";

/// Path of the dataselect version endpoint, used to probe a provider
pub const DATASELECT_VERSION_PATH: &str = "/fdsnws/dataselect/1/version";

/// Time format accepted by FDSN web services
pub const FDSN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// =============================================================================
// Post-processing Defaults
// =============================================================================

/// Four-corner pre-filter for deconvolution (Hz)
pub const DEFAULT_PRE_FILTER: [f64; 4] = [0.05, 0.08, 40.0, 45.0];

/// Fraction of each trace end tapered before response removal
pub const DEFAULT_TAPER_MAX_PERCENTAGE: f64 = 0.01;

/// Cosine taper fraction applied inside response removal
pub const DEFAULT_RESPONSE_TAPER_FRACTION: f64 = 0.05;

/// Water level for spectrum inversion (dB below the maximum)
pub const DEFAULT_WATER_LEVEL_DB: f64 = 60.0;

// =============================================================================
// miniSEED
// =============================================================================

pub mod mseed {
    /// Fixed section of data header length in bytes
    pub const FIXED_HEADER_LEN: usize = 48;

    /// Record length written by the persister (2^12)
    pub const WRITE_RECORD_LEN: usize = 4096;

    /// Record length exponent matching `WRITE_RECORD_LEN`
    pub const WRITE_RECORD_LEN_EXP: u8 = 12;

    /// Offset of the data section in written records (header + 1000 + 1001)
    pub const WRITE_DATA_OFFSET: usize = 64;

    /// Steim frame length in bytes
    pub const STEIM_FRAME_LEN: usize = 64;

    pub const ENCODING_ASCII: u8 = 0;
    pub const ENCODING_INT16: u8 = 1;
    pub const ENCODING_INT32: u8 = 3;
    pub const ENCODING_FLOAT32: u8 = 4;
    pub const ENCODING_FLOAT64: u8 = 5;
    pub const ENCODING_STEIM1: u8 = 10;
    pub const ENCODING_STEIM2: u8 = 11;
}

// =============================================================================
// Output
// =============================================================================

/// Output directory for persisted waveform files
pub const DEFAULT_OUTPUT_DIR: &str = "seismo_cern";

// =============================================================================
// Accelerator Telemetry
// =============================================================================

/// Start of the default telemetry window (CET)
pub const DEFAULT_TELEMETRY_START: &str = "2025-07-29T00:00:00+01:00";

/// End of the default telemetry window (CET)
pub const DEFAULT_TELEMETRY_END: &str = "2025-08-01T23:59:00+01:00";

/// Local zone used when restoring telemetry timestamps
pub const DEFAULT_TELEMETRY_TIMEZONE: &str = "Europe/Zurich";

/// Default telemetry output file
pub const DEFAULT_TELEMETRY_OUTPUT: &str = "LHC_data_jul29_to_aug1_2025.parquet";

/// Name of the integer-nanosecond index column in telemetry files
pub const TELEMETRY_INDEX_COLUMN: &str = "timestamp_ns";

/// Fill number signal, used as the join key with seismic samples
pub const FILL_NUMBER_SIGNAL: &str = "HX:FILLN";

/// Beam mode signal
pub const BEAM_MODE_SIGNAL: &str = "HX:BMODE";

/// Signals downloaded by default
pub const DEFAULT_TELEMETRY_SIGNALS: &[&str] = &[
    "LHC.BCTDC.A6R4.B1:BEAM_INTENSITY",
    "LHC.BCTDC.A6R4.B2:BEAM_INTENSITY",
    "VGI.77.6L2.R.PR",
    "VGI.77.6R8.B.PR",
    "VGI.79.6L2.B.PR",
    "VGI.79.6R8.R.PR",
    "VITCE.DUMMY.6L2.3.TEMPERATURE",
    "VITCE.DUMMY.6L2.4.TEMPERATURE",
    "VITCE.DUMMY.6L2.5.TEMPERATURE",
    "VITCE.DUMMY.6L2.6.TEMPERATURE",
    FILL_NUMBER_SIGNAL,
    BEAM_MODE_SIGNAL,
];

/// Look up the base URL for a provider identifier.
///
/// Identifiers are matched case-insensitively; anything starting with
/// `http://` or `https://` is taken as a base URL as-is.
pub fn provider_base_url(provider: &str) -> Option<String> {
    let trimmed = provider.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(trimmed.trim_end_matches('/').to_string());
    }
    PROVIDER_BASE_URLS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map(|(_, url)| url.to_string())
}
