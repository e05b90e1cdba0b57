//! seismo_cern library
//!
//! Acquisition and analysis of seismic data recorded around the CERN site.
//!
//! This library provides tools for:
//! - Discovering stations through the EIDA routing service
//! - Fetching waveforms from FDSN data centres with ordered provider fallback
//! - Decoding and encoding miniSEED records
//! - Merging, detrending, tapering and instrument response removal
//! - Writing miniSEED and one-row-per-sample Parquet outputs
//! - Downloading accelerator telemetry and aggregating seismic samples by
//!   fill number and beam mode

pub mod config;
pub mod constants;
pub mod error;
pub mod fdsn;
pub mod models;
pub mod mseed;
pub mod processing;
pub mod processor;
pub mod telemetry;

pub mod cli {
    pub mod args;
    pub mod commands;
}

pub use config::Config;
pub use error::{Result, SeismoError};
pub use models::{Inventory, OutputUnit, Trace, TraceId, WaveformCollection};
pub use processor::AcquisitionPipeline;
