//! Command implementations for the seismo-cern CLI
//!
//! Each subcommand lives in its own module. Library errors are wrapped with
//! `anyhow` context here, at the edge of the program.

pub mod correlate;
pub mod fetch;
pub mod shared;
pub mod telemetry;

use crate::cli::args::{Args, Commands};

/// Dispatch to the selected subcommand
pub async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Some(Commands::Fetch(fetch_args)) => fetch::run_fetch(fetch_args).await,
        Some(Commands::Telemetry(telemetry_args)) => {
            telemetry::run_telemetry(telemetry_args).await
        }
        Some(Commands::Correlate(correlate_args)) => correlate::run_correlate(correlate_args),
        None => Ok(()),
    }
}
