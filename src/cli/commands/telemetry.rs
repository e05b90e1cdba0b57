//! Telemetry command: download accelerator signals to Parquet

use crate::cli::args::TelemetryArgs;
use crate::cli::commands::shared::{load_configuration, setup_logging};
use crate::config::Config;
use crate::error::{Result, SeismoError};
use crate::telemetry::{HttpTelemetryStore, TelemetryStore, save_telemetry};
use anyhow::Context;
use chrono::Utc;
use colored::*;
use std::time::Duration;
use tracing::info;

pub fn apply_telemetry_overrides(config: &mut Config, args: &TelemetryArgs) -> Result<()> {
    let tel = &mut config.telemetry;
    if let Some(url) = &args.base_url {
        tel.base_url = Some(url.clone());
    }
    if let Some(start) = args.parsed_start()? {
        tel.start = start;
    }
    if let Some(end) = args.parsed_end()? {
        tel.end = end;
    }
    if let Some(signals) = &args.signals {
        tel.signals = signals.iter().map(|s| s.trim().to_string()).collect();
    }
    if let Some(path) = &args.output_path {
        tel.output_path = path.clone();
    }
    if let Some(zone) = &args.timezone {
        tel.timezone = zone.clone();
    }
    Ok(())
}

/// Run the telemetry command
pub async fn run_telemetry(args: TelemetryArgs) -> anyhow::Result<()> {
    setup_logging(&args.common);

    let mut config = load_configuration(&args.common).context("loading configuration")?;
    apply_telemetry_overrides(&mut config, &args).context("applying command-line overrides")?;
    config.validate().context("validating configuration")?;

    let tel = &config.telemetry;
    let base_url = tel.base_url.clone().ok_or_else(|| {
        SeismoError::configuration("telemetry.base_url is not set (use --url or the config file)")
    })?;
    let store = HttpTelemetryStore::new(base_url, Duration::from_secs(tel.timeout_secs))?;

    info!(
        "Downloading {} signals from {} to {}",
        tel.signals.len(),
        tel.start,
        tel.end
    );
    let telemetry = store
        .query(
            tel.start.with_timezone(&Utc),
            tel.end.with_timezone(&Utc),
            &tel.signals,
        )
        .await
        .context("querying telemetry gateway")?;

    save_telemetry(&telemetry, &tel.output_path).context("saving telemetry")?;

    println!("{}", "Telemetry download complete".bright_green().bold());
    println!(
        "  {} {} rows, {} signals",
        "Rows:".bright_cyan(),
        telemetry.height().to_string().bright_white().bold(),
        telemetry.signal_names().len()
    );
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        tel.output_path.display()
    );
    Ok(())
}
