//! Station loop: fetch every inventory station through the fallback chain

use super::fallback::fetch_with_fallback;
use super::pool::ProviderPool;
use crate::config::AcquisitionConfig;
use crate::constants::ALL_LOCATIONS;
use crate::error::{Result, SeismoError};
use crate::fdsn::{WaveformRequest, WaveformSource};
use crate::models::{Inventory, StationReport, WaveformCollection};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Aggregated waveforms plus the outcome for each station
#[derive(Debug, Default)]
pub struct Acquisition {
    pub collection: WaveformCollection,
    pub reports: Vec<StationReport>,
}

impl Acquisition {
    pub fn stations_retrieved(&self) -> usize {
        self.reports.iter().filter(|r| r.succeeded()).count()
    }

    pub fn stations_failed(&self) -> usize {
        self.reports.len() - self.stations_retrieved()
    }
}

fn progress_bar(stations: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(stations as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Fetch all stations of `inventory`; failures are logged and skipped.
///
/// Returns [`SeismoError::EmptyResult`] when no station produced a trace.
pub async fn acquire<S: WaveformSource>(
    pool: &ProviderPool<S>,
    inventory: &Inventory,
    config: &AcquisitionConfig,
    show_progress: bool,
) -> Result<Acquisition> {
    let stations = inventory.station_pairs();
    let pb = progress_bar(stations.len(), show_progress);
    pb.set_message("Fetching stations");

    let end = config.end()?;
    let mut acquisition = Acquisition::default();
    for (network, station) in stations {
        pb.set_message(format!("{}.{}", network, station));
        let request = WaveformRequest {
            network: network.clone(),
            station: station.clone(),
            location: ALL_LOCATIONS.to_string(),
            channels: config.channels.clone(),
            start: config.start,
            end,
        };

        let report = match fetch_with_fallback(pool, &request).await {
            Ok(retrieval) => {
                let report = StationReport {
                    network,
                    station,
                    provider: Some(retrieval.provider),
                    attempts: retrieval.attempts,
                    traces: retrieval.data.len(),
                    error: None,
                };
                acquisition.collection.extend(retrieval.data);
                report
            }
            Err(e) => {
                pb.suspend(|| warn!("Fail {}: {}", request.station_label(), e));
                let attempts = match &e {
                    SeismoError::RetrievalFailure { attempts, .. } => *attempts,
                    _ => 0,
                };
                StationReport {
                    network,
                    station,
                    provider: None,
                    attempts,
                    traces: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        acquisition.reports.push(report);
        pb.inc(1);
    }
    pb.finish_with_message("All stations processed");

    if acquisition.collection.is_empty() {
        return Err(SeismoError::EmptyResult);
    }
    Ok(acquisition)
}
