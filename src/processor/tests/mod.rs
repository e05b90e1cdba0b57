//! Pipeline tests for the processor module
//!
//! Exercises pool construction, fallback retrieval and the complete
//! acquisition pipeline against in-memory providers.

pub mod fallback_chain;
pub mod pipeline;

use crate::error::{Result, SeismoError};
use crate::fdsn::{ProviderConnector, StationLocator, StationQuery, WaveformRequest, WaveformSource};
use crate::models::{
    Channel, ChannelResponse, Inventory, Network, Sensitivity, Station, Trace, TraceId,
    WaveformCollection,
};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared record of "PROVIDER:NET.STA" calls in order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Scripted answer of a mock provider for one station
#[derive(Debug, Clone)]
pub enum Reply {
    /// One trace with this many samples
    Data(usize),
    /// One trace whose samples include a NaN
    Corrupt(usize),
    Empty,
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct MockSource {
    name: String,
    replies: HashMap<String, Reply>,
    log: CallLog,
}

impl MockSource {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            replies: HashMap::new(),
            log: log.clone(),
        }
    }

    pub fn reply(mut self, station: &str, reply: Reply) -> Self {
        self.replies.insert(station.to_string(), reply);
        self
    }
}

pub fn synthetic_trace(request: &WaveformRequest, samples: usize) -> Trace {
    let data = (0..samples)
        .map(|i| 500.0 * (i as f64 * 0.3).sin() + 0.1 * i as f64)
        .collect();
    Trace::new(
        TraceId::new(&request.network, &request.station, "", "HHZ"),
        request.start,
        100.0,
        data,
    )
}

impl WaveformSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_waveforms(&self, request: &WaveformRequest) -> Result<WaveformCollection> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, request.station_label()));

        let reply = self
            .replies
            .get(&request.station)
            .cloned()
            .unwrap_or(Reply::Fail("unscripted".to_string()));
        match reply {
            Reply::Data(samples) => {
                let mut trace = synthetic_trace(request, samples);
                trace.provider = Some(self.name.clone());
                Ok(WaveformCollection::new(vec![trace]))
            }
            Reply::Corrupt(samples) => {
                let mut trace = synthetic_trace(request, samples);
                trace.data[samples / 2] = f64::NAN;
                trace.provider = Some(self.name.clone());
                Ok(WaveformCollection::new(vec![trace]))
            }
            Reply::Empty => Ok(WaveformCollection::default()),
            Reply::Fail(reason) => Err(SeismoError::Fetch {
                provider: self.name.clone(),
                station: request.station_label(),
                reason,
            }),
        }
    }
}

/// Connector handing out pre-built sources; unknown names fail to connect
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    sources: Vec<MockSource>,
}

impl MockConnector {
    pub fn new(sources: Vec<MockSource>) -> Self {
        Self { sources }
    }
}

impl ProviderConnector for MockConnector {
    type Source = MockSource;

    async fn connect(&self, provider: &str, _timeout: Duration) -> Result<MockSource> {
        self.sources
            .iter()
            .find(|s| s.name == provider)
            .cloned()
            .ok_or_else(|| SeismoError::ProviderInit {
                provider: provider.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct MockLocator {
    inventory: Inventory,
}

impl MockLocator {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }
}

impl StationLocator for MockLocator {
    async fn locate(&self, _query: &StationQuery) -> Result<Inventory> {
        Ok(self.inventory.clone())
    }
}

/// Inventory with one HHZ channel per station and a flat velocity response
pub fn inventory(stations: &[(&str, &str)]) -> Inventory {
    let mut inventory = Inventory::default();
    for (network, station) in stations {
        inventory.merge(Inventory {
            networks: vec![Network {
                code: network.to_string(),
                description: None,
                stations: vec![Station {
                    code: station.to_string(),
                    latitude: 46.234,
                    longitude: 6.055,
                    elevation: 440.0,
                    site_name: None,
                    channels: vec![Channel {
                        location_code: String::new(),
                        code: "HHZ".to_string(),
                        start: Some(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap()),
                        end: None,
                        sample_rate: Some(100.0),
                        response: Some(ChannelResponse {
                            sensitivity: Some(Sensitivity {
                                value: 6.0e8,
                                frequency: 1.0,
                                input_units: "M/S".to_string(),
                                output_units: "COUNTS".to_string(),
                            }),
                            stages: Vec::new(),
                        }),
                    }],
                }],
            }],
        });
    }
    inventory
}

pub fn request(network: &str, station: &str) -> WaveformRequest {
    let start = Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap();
    WaveformRequest {
        network: network.to_string(),
        station: station.to_string(),
        location: "*".to_string(),
        channels: "HH?,BH?,EH?".to_string(),
        start,
        end: start + chrono::Duration::minutes(180),
    }
}
