//! Core data structures for seismic acquisition.
//!
//! Defines the station inventory with instrument response metadata, the
//! waveform collection and its traces, per-trace post-processing status,
//! and run statistics used throughout the library.

use chrono::{DateTime, Duration, Utc};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// Station Inventory
// =============================================================================

/// Networks, stations and channels returned by station discovery
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub networks: Vec<Network>,
}

#[derive(Debug, Clone)]
pub struct Network {
    pub code: String,
    pub description: Option<String>,
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone)]
pub struct Station {
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub site_name: Option<String>,
    pub channels: Vec<Channel>,
}

/// One channel epoch with its response
#[derive(Debug, Clone)]
pub struct Channel {
    pub location_code: String,
    pub code: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub sample_rate: Option<f64>,
    pub response: Option<ChannelResponse>,
}

impl Channel {
    /// Whether this channel epoch covers the given instant
    pub fn is_active_at(&self, time: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| start <= time) && self.end.is_none_or(|end| time <= end)
    }
}

impl Inventory {
    /// Distinct (network, station) pairs in inventory order
    pub fn station_pairs(&self) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for network in &self.networks {
            for station in &network.stations {
                let pair = (network.code.clone(), station.code.clone());
                if seen.insert(pair.clone()) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    pub fn station_count(&self) -> usize {
        self.station_pairs().len()
    }

    pub fn channel_count(&self) -> usize {
        self.networks
            .iter()
            .flat_map(|n| &n.stations)
            .map(|s| s.channels.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.iter().all(|n| n.stations.is_empty())
    }

    /// Merge another inventory into this one.
    ///
    /// Networks and stations with the same code are combined; channels
    /// already present (same location, code and start) are not duplicated.
    pub fn merge(&mut self, other: Inventory) {
        for network in other.networks {
            match self.networks.iter_mut().find(|n| n.code == network.code) {
                Some(existing) => {
                    for station in network.stations {
                        match existing.stations.iter_mut().find(|s| s.code == station.code) {
                            Some(existing_station) => {
                                for channel in station.channels {
                                    let duplicate = existing_station.channels.iter().any(|c| {
                                        c.code == channel.code
                                            && c.location_code == channel.location_code
                                            && c.start == channel.start
                                    });
                                    if !duplicate {
                                        existing_station.channels.push(channel);
                                    }
                                }
                            }
                            None => existing.stations.push(station),
                        }
                    }
                }
                None => self.networks.push(network),
            }
        }
    }

    /// Drop channels whose code is rejected by `keep`, then empty stations
    pub fn retain_channels(&mut self, keep: impl Fn(&str) -> bool) {
        for network in &mut self.networks {
            for station in &mut network.stations {
                station.channels.retain(|c| keep(&c.code));
            }
            network.stations.retain(|s| !s.channels.is_empty());
        }
        self.networks.retain(|n| !n.stations.is_empty());
    }

    /// Find the response for a trace id active at `time`
    pub fn find_response(&self, id: &TraceId, time: DateTime<Utc>) -> Option<&ChannelResponse> {
        self.networks
            .iter()
            .filter(|n| n.code == id.network)
            .flat_map(|n| &n.stations)
            .filter(|s| s.code == id.station)
            .flat_map(|s| &s.channels)
            .filter(|c| c.code == id.channel && c.location_code == id.location)
            .find(|c| c.is_active_at(time))
            .and_then(|c| c.response.as_ref())
    }
}

// =============================================================================
// Instrument Response
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ChannelResponse {
    pub sensitivity: Option<Sensitivity>,
    pub stages: Vec<ResponseStage>,
}

impl ChannelResponse {
    /// Physical input units of the whole response chain (e.g. "M/S")
    pub fn input_units(&self) -> Option<&str> {
        self.stages
            .first()
            .and_then(|s| s.input_units.as_deref())
            .or_else(|| self.sensitivity.as_ref().map(|s| s.input_units.as_str()))
    }
}

/// Overall instrument sensitivity
#[derive(Debug, Clone)]
pub struct Sensitivity {
    pub value: f64,
    pub frequency: f64,
    pub input_units: String,
    pub output_units: String,
}

#[derive(Debug, Clone)]
pub struct ResponseStage {
    pub number: u32,
    pub gain: Option<StageGain>,
    pub input_units: Option<String>,
    pub output_units: Option<String>,
    pub transfer: StageTransfer,
}

#[derive(Debug, Clone, Copy)]
pub struct StageGain {
    pub value: f64,
    pub frequency: f64,
}

#[derive(Debug, Clone)]
pub enum StageTransfer {
    PolesZeros(PolesZeros),
    Coefficients,
    Fir,
    GainOnly,
}

#[derive(Debug, Clone)]
pub struct PolesZeros {
    pub function: TransferFunction,
    pub normalization_factor: f64,
    pub normalization_frequency: f64,
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFunction {
    /// Laplace transform, poles and zeros in rad/s
    LaplaceRadians,
    /// Laplace transform, poles and zeros in Hz
    LaplaceHertz,
    /// Z-transform (digital)
    Digital,
}

// =============================================================================
// Waveforms
// =============================================================================

/// Network/station/location/channel identifier of a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl TraceId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Physical unit carried by trace samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleUnit {
    Counts,
    Displacement,
    Velocity,
    Acceleration,
}

impl SampleUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleUnit::Counts => "COUNTS",
            SampleUnit::Displacement => "M",
            SampleUnit::Velocity => "M/S",
            SampleUnit::Acceleration => "M/S**2",
        }
    }

    /// Parse a StationXML/SEED unit name
    pub fn from_units_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "M" | "NM" | "CM" | "MM" => Some(SampleUnit::Displacement),
            "M/S" | "NM/S" | "CM/S" | "MM/S" | "M/SEC" => Some(SampleUnit::Velocity),
            "M/S**2" | "M/S2" | "M/S/S" | "NM/S**2" | "CM/S**2" | "MM/S**2" | "M/SEC**2" => {
                Some(SampleUnit::Acceleration)
            }
            "COUNTS" | "COUNT" => Some(SampleUnit::Counts),
            _ => None,
        }
    }

    /// Order of time derivative relative to displacement
    pub fn derivative_order(&self) -> Option<i32> {
        match self {
            SampleUnit::Displacement => Some(0),
            SampleUnit::Velocity => Some(1),
            SampleUnit::Acceleration => Some(2),
            SampleUnit::Counts => None,
        }
    }
}

/// Output quantity requested from response removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputUnit {
    #[serde(rename = "DISP")]
    Displacement,
    #[default]
    #[serde(rename = "VEL")]
    Velocity,
    #[serde(rename = "ACC")]
    Acceleration,
}

impl OutputUnit {
    pub fn sample_unit(&self) -> SampleUnit {
        match self {
            OutputUnit::Displacement => SampleUnit::Displacement,
            OutputUnit::Velocity => SampleUnit::Velocity,
            OutputUnit::Acceleration => SampleUnit::Acceleration,
        }
    }
}

impl FromStr for OutputUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISP" => Ok(OutputUnit::Displacement),
            "VEL" => Ok(OutputUnit::Velocity),
            "ACC" => Ok(OutputUnit::Acceleration),
            other => Err(format!(
                "unknown output unit '{}', expected DISP, VEL or ACC",
                other
            )),
        }
    }
}

impl fmt::Display for OutputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputUnit::Displacement => "DISP",
            OutputUnit::Velocity => "VEL",
            OutputUnit::Acceleration => "ACC",
        };
        f.write_str(name)
    }
}

/// Post-processing stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    Merge,
    Detrend,
    Taper,
    RemoveResponse,
}

impl ProcessingStage {
    pub const ALL: [ProcessingStage; 4] = [
        ProcessingStage::Merge,
        ProcessingStage::Detrend,
        ProcessingStage::Taper,
        ProcessingStage::RemoveResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Merge => "merge",
            ProcessingStage::Detrend => "detrend",
            ProcessingStage::Taper => "taper",
            ProcessingStage::RemoveResponse => "remove_response",
        }
    }
}

/// Result of one post-processing stage on one trace
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: ProcessingStage,
    pub succeeded: bool,
    pub detail: Option<String>,
}

/// Stage outcomes accumulated by a trace as it moves through post-processing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceStatus {
    pub outcomes: Vec<StageOutcome>,
}

impl TraceStatus {
    pub fn record_success(&mut self, stage: ProcessingStage) {
        self.outcomes.push(StageOutcome {
            stage,
            succeeded: true,
            detail: None,
        });
    }

    pub fn record_failure(&mut self, stage: ProcessingStage, detail: impl Into<String>) {
        self.outcomes.push(StageOutcome {
            stage,
            succeeded: false,
            detail: Some(detail.into()),
        });
    }

    /// Latest outcome recorded for `stage`
    pub fn outcome(&self, stage: ProcessingStage) -> Option<&StageOutcome> {
        self.outcomes.iter().rev().find(|o| o.stage == stage)
    }

    pub fn succeeded(&self, stage: ProcessingStage) -> bool {
        self.outcome(stage).is_some_and(|o| o.succeeded)
    }

    /// True when any stage failed
    pub fn is_degraded(&self) -> bool {
        self.outcomes.iter().any(|o| !o.succeeded)
    }
}

/// One continuous, uniformly sampled channel recording
#[derive(Debug, Clone)]
pub struct Trace {
    pub id: TraceId,
    pub start: DateTime<Utc>,
    pub sampling_rate: f64,
    pub data: Vec<f64>,
    pub unit: SampleUnit,
    pub provider: Option<String>,
    pub status: TraceStatus,
}

impl Trace {
    pub fn new(id: TraceId, start: DateTime<Utc>, sampling_rate: f64, data: Vec<f64>) -> Self {
        Self {
            id,
            start,
            sampling_rate,
            data,
            unit: SampleUnit::Counts,
            provider: None,
            status: TraceStatus::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time of sample `index`
    pub fn time_of(&self, index: usize) -> DateTime<Utc> {
        self.start + sample_offset(index, self.sampling_rate)
    }

    /// Time of the last sample (equal to start for empty traces)
    pub fn end(&self) -> DateTime<Utc> {
        self.time_of(self.data.len().saturating_sub(1))
    }

    /// Whether response removal succeeded for this trace
    pub fn response_removed(&self) -> bool {
        self.status.succeeded(ProcessingStage::RemoveResponse)
    }
}

/// Offset of sample `index` from the trace start
pub fn sample_offset(index: usize, sampling_rate: f64) -> Duration {
    Duration::nanoseconds((index as f64 * 1e9 / sampling_rate).round() as i64)
}

/// Nanoseconds since the Unix epoch, saturating outside the representable range
pub fn timestamp_ns(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt().unwrap_or(if time.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Unordered bag of traces
#[derive(Debug, Clone, Default)]
pub struct WaveformCollection {
    pub traces: Vec<Trace>,
}

impl WaveformCollection {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Total number of samples across all traces
    pub fn sample_count(&self) -> usize {
        self.traces.iter().map(Trace::len).sum()
    }

    /// Number of distinct network.station pairs
    pub fn station_count(&self) -> usize {
        self.traces
            .iter()
            .map(|t| (&t.id.network, &t.id.station))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn extend(&mut self, other: WaveformCollection) {
        self.traces.extend(other.traces);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter()
    }

    /// Traces carrying at least one failed stage outcome
    pub fn degraded_count(&self) -> usize {
        self.traces.iter().filter(|t| t.status.is_degraded()).count()
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of fetching one station
#[derive(Debug, Clone)]
pub struct StationReport {
    pub network: String,
    pub station: String,
    pub provider: Option<String>,
    pub attempts: usize,
    pub traces: usize,
    pub error: Option<String>,
}

impl StationReport {
    pub fn succeeded(&self) -> bool {
        self.provider.is_some()
    }
}

/// Statistics for a complete acquisition run
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    pub stations_found: usize,
    pub providers_available: usize,
    pub stations_retrieved: usize,
    pub stations_failed: usize,
    pub traces: usize,
    pub samples: usize,
    pub degraded_traces: usize,
    pub mseed_path: Option<PathBuf>,
    pub parquet_path: Option<PathBuf>,
    pub processing_time_ms: u128,
}
