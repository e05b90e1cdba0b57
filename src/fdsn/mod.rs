//! FDSN web service access
//!
//! Station discovery goes through the EIDA routing service and the station
//! endpoints it names; waveforms come from each provider's dataselect
//! endpoint. The traits here are the seams the acquisition pipeline is
//! generic over, so tests can substitute in-memory implementations.

pub mod client;
pub mod routing;
pub mod stationxml;

pub use client::{FdsnClient, FdsnConnector};
pub use routing::EidaRoutingLocator;
pub use stationxml::parse_station_xml;

use crate::config::AcquisitionConfig;
use crate::error::{Result, SeismoError};
use crate::models::{Inventory, WaveformCollection};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::future::Future;
use std::time::Duration;

/// Geographic station search around the site of interest
#[derive(Debug, Clone)]
pub struct StationQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_deg: f64,
    pub channels: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StationQuery {
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self> {
        Ok(Self {
            latitude: config.latitude,
            longitude: config.longitude,
            radius_deg: config.radius_deg,
            channels: config.channels.clone(),
            start: config.start,
            end: config.end()?,
        })
    }
}

/// Waveform request for one station
#[derive(Debug, Clone)]
pub struct WaveformRequest {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channels: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WaveformRequest {
    /// "NET.STA" label used in logs and errors
    pub fn station_label(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }
}

/// Finds stations and their responses
pub trait StationLocator {
    fn locate(&self, query: &StationQuery) -> impl Future<Output = Result<Inventory>> + Send;
}

/// A data provider able to serve waveforms
pub trait WaveformSource {
    fn name(&self) -> &str;

    /// Fetch waveforms; an empty result must be reported as `NoData`
    fn get_waveforms(
        &self,
        request: &WaveformRequest,
    ) -> impl Future<Output = Result<WaveformCollection>> + Send;
}

/// Builds a [`WaveformSource`] from a provider name
pub trait ProviderConnector {
    type Source: WaveformSource + Send + Sync;

    fn connect(
        &self,
        provider: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Source>> + Send;
}

/// Comma separated FDSN channel patterns (`?` one character, `*` any run)
#[derive(Debug, Clone)]
pub struct ChannelPattern {
    regex: Regex,
}

impl ChannelPattern {
    pub fn new(patterns: &str) -> Result<Self> {
        let alternatives: Vec<String> = patterns
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                regex::escape(&p.to_ascii_uppercase())
                    .replace(r"\?", ".")
                    .replace(r"\*", ".*")
            })
            .collect();
        if alternatives.is_empty() {
            return Err(SeismoError::configuration(format!(
                "channel pattern '{}' is empty",
                patterns
            )));
        }

        let regex = Regex::new(&format!("^(?:{})$", alternatives.join("|"))).map_err(|e| {
            SeismoError::configuration(format!("invalid channel pattern '{}': {}", patterns, e))
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, channel: &str) -> bool {
        self.regex.is_match(&channel.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_pattern_wildcards() {
        let pattern = ChannelPattern::new("HH?,BH?,EH?").unwrap();
        assert!(pattern.matches("HHZ"));
        assert!(pattern.matches("bhn"));
        assert!(pattern.matches("EHE"));
        assert!(!pattern.matches("LHZ"));
        assert!(!pattern.matches("HHZZ"));

        let star = ChannelPattern::new("H*").unwrap();
        assert!(star.matches("HNZ"));
        assert!(!star.matches("BHZ"));
    }

    #[test]
    fn test_channel_pattern_rejects_empty() {
        assert!(ChannelPattern::new(" , ").is_err());
    }

    #[test]
    fn test_request_label() {
        let request = WaveformRequest {
            network: "CH".to_string(),
            station: "GE01".to_string(),
            location: "*".to_string(),
            channels: "HH?".to_string(),
            start: Utc::now(),
            end: Utc::now(),
        };
        assert_eq!(request.station_label(), "CH.GE01");
    }
}
