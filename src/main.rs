use clap::Parser;
use seismo_cern::SeismoError;
use seismo_cern::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = commands::run(args) => result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    eprintln!("Failed to listen for CTRL+C: {}", e);
                }
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(SeismoError::interrupted("interrupted by user").into())
            }
        }
    });

    match result {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("seismo-cern - Seismic monitoring around CERN");
    println!("============================================");
    println!();
    println!("Fetch seismic waveforms near the CERN site from FDSN data centres,");
    println!("remove instrument response and relate them to LHC telemetry.");
    println!();
    println!("USAGE:");
    println!("    seismo-cern <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    fetch        Discover stations, fetch waveforms, remove response");
    println!("    telemetry    Download accelerator telemetry to Parquet");
    println!("    correlate    Aggregate seismic samples per fill and beam mode");
    println!("    help         Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Three hours of data around Meyrin from the default providers:");
    println!("    seismo-cern fetch -v");
    println!();
    println!("    # Wider search, 30 minutes, two providers:");
    println!("    seismo-cern fetch --radius 0.1 --duration 30 --providers ETH,RESIF");
    println!();
    println!("    # Telemetry and correlation:");
    println!("    seismo-cern telemetry --url http://gateway.example/export");
    println!("    seismo-cern correlate --seismic seismo_cern/waveforms_2025-07-29T232400_UTC_180min.parquet");
    println!();
    println!("For detailed help on any command, use:");
    println!("    seismo-cern <COMMAND> --help");
}
