//! Fetch command: station discovery, waveform retrieval, response removal

use crate::cli::args::FetchArgs;
use crate::cli::commands::shared::{load_configuration, setup_logging};
use crate::config::Config;
use crate::error::SeismoError;
use crate::fdsn::{EidaRoutingLocator, FdsnConnector};
use crate::processor::AcquisitionPipeline;
use anyhow::Context;
use tracing::info;

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_fetch_overrides(config: &mut Config, args: &FetchArgs) -> crate::error::Result<()> {
    let acq = &mut config.acquisition;
    if let Some(latitude) = args.latitude {
        acq.latitude = latitude;
    }
    if let Some(longitude) = args.longitude {
        acq.longitude = longitude;
    }
    if let Some(radius) = args.radius_deg {
        acq.radius_deg = radius;
    }
    if let Some(channels) = &args.channels {
        acq.channels = channels.clone();
    }
    if let Some(start) = args.parsed_start()? {
        acq.start = start;
    }
    if let Some(minutes) = args.duration_minutes {
        acq.duration_secs = minutes.checked_mul(60).ok_or_else(|| {
            SeismoError::configuration(format!("duration of {} minutes is too long", minutes))
        })?;
    }
    if let Some(providers) = &args.providers {
        acq.providers = providers
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }
    if let Some(url) = &args.routing_url {
        acq.routing_url = url.clone();
    }
    if let Some(timeout) = args.timeout_secs {
        acq.timeout_secs = timeout;
    }
    if args.no_probe {
        acq.probe_providers = false;
    }

    if let Some(directory) = &args.output_directory {
        config.output.directory = directory.clone();
    }
    if args.no_parquet {
        config.output.write_parquet = false;
    }
    if let Some(unit) = args.output_unit {
        config.processing.output_unit = unit;
    }
    Ok(())
}

/// Run the fetch command
pub async fn run_fetch(args: FetchArgs) -> anyhow::Result<()> {
    setup_logging(&args.common);

    let mut config = load_configuration(&args.common).context("loading configuration")?;
    apply_fetch_overrides(&mut config, &args).context("applying command-line overrides")?;
    config.validate().context("validating configuration")?;

    let acq = &config.acquisition;
    info!(
        "Fetching {} around ({}, {}) from {} for {} minutes",
        acq.channels,
        acq.latitude,
        acq.longitude,
        acq.start,
        acq.duration_minutes()
    );

    let locator = EidaRoutingLocator::new(acq.routing_url.clone(), acq.timeout())
        .context("creating routing client")?;
    let connector = FdsnConnector::new(acq.probe_providers);

    let mut pipeline = AcquisitionPipeline::new(locator, connector, config);
    if !args.common.show_progress() {
        pipeline = pipeline.quiet();
    }
    pipeline.run().await.context("acquisition failed")?;
    Ok(())
}
