//! Acquisition pipeline.
//!
//! Orchestrates the complete single-pass workflow: station discovery,
//! provider pool construction, per-station fallback retrieval,
//! post-processing, and persistence to miniSEED and Parquet.

pub mod acquisition;
pub mod fallback;
pub mod pool;
pub mod writer;

#[cfg(test)]
pub mod tests;

pub use acquisition::{Acquisition, acquire};
pub use fallback::{Retrieval, fetch_with_fallback};
pub use pool::ProviderPool;
pub use writer::{TabularRecord, read_tabular, write_tabular};

use crate::config::Config;
use crate::error::Result;
use crate::fdsn::{ProviderConnector, StationLocator, StationQuery};
use crate::models::AcquisitionStats;
use crate::mseed::write_mseed;
use crate::processing::PostProcessor;

use chrono::{DateTime, Utc};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Base file name shared by the miniSEED and Parquet outputs
pub fn output_stem(start: DateTime<Utc>, minutes: u64) -> String {
    format!(
        "waveforms_{}T{}_UTC_{}min",
        start.format("%Y-%m-%d"),
        start.format("%H%M%S"),
        minutes
    )
}

/// miniSEED and Parquet paths for a run
pub fn output_paths(directory: &Path, start: DateTime<Utc>, minutes: u64) -> (PathBuf, PathBuf) {
    let stem = output_stem(start, minutes);
    (
        directory.join(format!("{}.mseed", stem)),
        directory.join(format!("{}.parquet", stem)),
    )
}

/// Single-pass acquisition over a locator and a provider connector
#[derive(Debug)]
pub struct AcquisitionPipeline<L, C> {
    locator: L,
    connector: C,
    config: Config,
    show_progress: bool,
}

impl<L, C> AcquisitionPipeline<L, C>
where
    L: StationLocator,
    C: ProviderConnector,
{
    pub fn new(locator: L, connector: C, config: Config) -> Self {
        Self {
            locator,
            connector,
            config,
            show_progress: true,
        }
    }

    /// Hide the station progress bar
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Run discovery, retrieval, post-processing and persistence
    pub async fn run(&self) -> Result<AcquisitionStats> {
        let start_time = Instant::now();
        let acq = &self.config.acquisition;
        let end = acq.end()?;

        println!("{}", "Starting seismic acquisition".bright_green().bold());
        println!(
            "  {} ({}, {}) within {}°",
            "Site:".bright_cyan(),
            acq.latitude,
            acq.longitude,
            acq.radius_deg
        );
        println!(
            "  {} {} → {} ({})",
            "Window:".bright_cyan(),
            acq.start.to_rfc3339(),
            end.to_rfc3339(),
            acq.channels
        );

        // Step 1: Discover stations
        println!("\n{}", "Discovering stations...".bright_yellow());
        let inventory = self
            .locator
            .locate(&StationQuery::from_config(acq)?)
            .await?;
        println!(
            "  {} {} stations",
            "Found".bright_green(),
            inventory.station_count().to_string().bright_white().bold()
        );

        // Step 2: Build the provider pool
        println!("\n{}", "Connecting to providers...".bright_yellow());
        let pool = ProviderPool::build(&self.connector, &acq.providers, acq.timeout()).await;
        println!(
            "  {} {}",
            "Providers:".bright_cyan(),
            if pool.is_empty() {
                "none".bright_red().to_string()
            } else {
                pool.names().join(", ")
            }
        );

        // Step 3: Fetch every station with fallback
        println!("\n{}", "Fetching waveforms...".bright_yellow());
        let Acquisition {
            mut collection,
            reports,
        } = acquire(&pool, &inventory, acq, self.show_progress).await?;
        let stations_retrieved = reports.iter().filter(|r| r.succeeded()).count();

        // Step 4: Post-process
        println!("\n{}", "Post-processing...".bright_yellow());
        let report = PostProcessor::new(&self.config.processing).run(&mut collection, &inventory);

        // Step 5: Persist
        self.config.ensure_output_directory()?;
        let (mseed_path, parquet_path) = output_paths(
            &self.config.output.directory,
            acq.start,
            acq.duration_minutes(),
        );
        write_mseed(&collection, &mseed_path)?;
        info!("Data saved to {}", mseed_path.display());
        let parquet_path = if self.config.output.write_parquet {
            write_tabular(&collection, &parquet_path)?;
            info!("Tabular data saved to {}", parquet_path.display());
            Some(parquet_path)
        } else {
            None
        };

        let stats = AcquisitionStats {
            stations_found: inventory.station_count(),
            providers_available: pool.len(),
            stations_retrieved,
            stations_failed: reports.len() - stations_retrieved,
            traces: collection.len(),
            samples: collection.sample_count(),
            degraded_traces: collection.degraded_count(),
            mseed_path: Some(mseed_path),
            parquet_path,
            processing_time_ms: start_time.elapsed().as_millis(),
        };

        print_summary(&stats, report.total_failures());
        Ok(stats)
    }
}

fn print_summary(stats: &AcquisitionStats, stage_failures: usize) {
    println!("\n{}", "Acquisition Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}/{}",
        "Stations retrieved:".bright_cyan(),
        stats.stations_retrieved.to_string().bright_white().bold(),
        stats.stations_found
    );
    if stats.stations_failed > 0 {
        println!(
            "  {} {}",
            "Stations failed:".bright_red(),
            stats.stations_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {} ({} samples)",
        "Traces:".bright_cyan(),
        stats.traces.to_string().bright_white().bold(),
        stats.samples
    );
    if stats.degraded_traces > 0 {
        println!(
            "  {} {} traces, {} stage failures",
            "Degraded:".bright_yellow(),
            stats.degraded_traces.to_string().bright_yellow().bold(),
            stage_failures
        );
    }
    if let Some(path) = &stats.mseed_path {
        println!("  {} {}", "miniSEED:".bright_cyan(), path.display());
    }
    if let Some(path) = &stats.parquet_path {
        println!("  {} {}", "Parquet:".bright_cyan(), path.display());
    }
}
