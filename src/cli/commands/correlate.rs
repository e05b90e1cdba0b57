//! Correlate command: seismic amplitude statistics per fill and beam mode

use crate::cli::args::CorrelateArgs;
use crate::cli::commands::shared::{load_configuration, setup_logging};
use crate::constants::{BEAM_MODE_SIGNAL, FILL_NUMBER_SIGNAL};
use crate::processor::writer::{read_frame, write_frame};
use crate::telemetry::{
    CorrelationRow, correlate, load_telemetry, parse_timezone, summary_rows,
};
use anyhow::Context;
use colored::*;
use tracing::info;

/// Run the correlate command
pub fn run_correlate(args: CorrelateArgs) -> anyhow::Result<()> {
    setup_logging(&args.common);

    let config = load_configuration(&args.common).context("loading configuration")?;
    let telemetry_path = args
        .telemetry_path
        .clone()
        .unwrap_or_else(|| config.telemetry.output_path.clone());
    let zone_name = args
        .timezone
        .clone()
        .unwrap_or_else(|| config.telemetry.timezone.clone());
    let timezone = parse_timezone(&zone_name)?;
    let fill_signal = args.fill_signal.as_deref().unwrap_or(FILL_NUMBER_SIGNAL);
    let mode_signal = args.mode_signal.as_deref().unwrap_or(BEAM_MODE_SIGNAL);

    let seismic = read_frame(&args.seismic_path)
        .with_context(|| format!("reading {}", args.seismic_path.display()))?;
    let telemetry = load_telemetry(&telemetry_path, timezone)
        .with_context(|| format!("reading {}", telemetry_path.display()))?;
    info!(
        "Correlating {} seismic samples with {} telemetry rows",
        seismic.height(),
        telemetry.height()
    );

    let mut summary = correlate(&seismic, &telemetry, fill_signal, mode_signal)
        .context("correlating seismic samples with telemetry")?;
    let rows = summary_rows(&summary)?;
    print_rows(&rows);

    if let Some(path) = &args.output_path {
        write_frame(&mut summary, path).context("writing correlation summary")?;
        println!("  {} {}", "Summary:".bright_cyan(), path.display());
    }
    Ok(())
}

fn print_rows(rows: &[CorrelationRow]) {
    println!(
        "{}",
        "Seismic activity by accelerator state".bright_green().bold()
    );
    println!(
        "  {:>8} {:<16} {:<14} {:<8} {:>10} {:>14} {:>14} {:>14}",
        "fill", "beam mode", "channel", "unit", "samples", "rms", "min", "max"
    );
    for row in rows {
        let fill = row
            .fill_number
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mode = row.beam_mode.as_deref().unwrap_or("-");
        let channel = format!("{}.{}.{}", row.network, row.station, row.channel);
        let line = format!(
            "  {:>8} {:<16} {:<14} {:<8} {:>10} {:>14.6e} {:>14.6e} {:>14.6e}",
            fill, mode, channel, row.unit, row.samples, row.rms, row.min, row.max
        );
        if row.response_removed {
            println!("{}", line);
        } else {
            // Still in raw counts
            println!("{}", line.bright_yellow());
        }
    }
    if rows.is_empty() {
        println!("  {}", "no samples".bright_yellow());
    }
}
