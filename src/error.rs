//! Error handling for seismic acquisition and telemetry operations.
//!
//! Provides error types with context for provider construction, waveform
//! retrieval, miniSEED/StationXML decoding, post-processing stages and
//! persistence failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeismoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("StationXML decoding failed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Configuration file parsing failed: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("JSON decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider {provider} could not be initialised: {reason}")]
    ProviderInit { provider: String, reason: String },

    #[error("Fetch from {provider} failed for {station}: {reason}")]
    Fetch {
        provider: String,
        station: String,
        reason: String,
    },

    #[error("{provider} has no data for {station}")]
    NoData { provider: String, station: String },

    #[error("No provider available to fetch {station}")]
    NoProviderAvailable { station: String },

    #[error("All {attempts} providers failed for {station}, last error: {source}")]
    RetrievalFailure {
        station: String,
        attempts: usize,
        #[source]
        source: Box<SeismoError>,
    },

    #[error(
        "No data obtained from any station: try widening the radius, changing the time window or the provider list"
    )]
    EmptyResult,

    #[error("Station discovery failed: {reason}")]
    StationDiscovery { reason: String },

    #[error("Post-processing stage '{stage}' failed: {reason}")]
    PostProcessing { stage: String, reason: String },

    #[error("No response metadata for {trace_id} at {time}")]
    ResponseNotFound { trace_id: String, time: String },

    #[error("Invalid miniSEED data: {reason}")]
    MiniSeed { reason: String },

    #[error("Output file error: {path} - {reason}")]
    Output { path: PathBuf, reason: String },

    #[error("Telemetry error: {message}")]
    Telemetry { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl SeismoError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn mseed(reason: impl Into<String>) -> Self {
        Self::MiniSeed {
            reason: reason.into(),
        }
    }

    pub fn post_processing(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PostProcessing {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SeismoError>;
