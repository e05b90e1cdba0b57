//! Parquet writing and reading of the per-sample tabular view
//!
//! One row per sample with the trace identity repeated on every row, so the
//! file can be filtered and grouped directly by analysis tools.

use crate::error::{Result, SeismoError};
use crate::models::{WaveformCollection, timestamp_ns};
use chrono::{DateTime, Utc};
use polars::prelude::{
    Column, DataFrame, DataType, ParquetCompression, ParquetReader, ParquetWriter, SerReader,
    TimeUnit,
};
use std::fs::File;
use std::path::Path;
use tracing::debug;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_VALUE: &str = "value";
pub const COL_NETWORK: &str = "network";
pub const COL_STATION: &str = "station";
pub const COL_LOCATION: &str = "location";
pub const COL_CHANNEL: &str = "channel";
pub const COL_SAMPLING_RATE: &str = "sampling_rate";
pub const COL_UNIT: &str = "unit";
pub const COL_RESPONSE_REMOVED: &str = "response_removed";

/// One sample of one trace
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRecord {
    pub timestamp_ns: i64,
    pub value: f64,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub sampling_rate: f64,
    pub unit: String,
    pub response_removed: bool,
}

impl TabularRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp_ns)
    }
}

/// Build the tabular frame for a collection
pub fn collection_to_frame(collection: &WaveformCollection) -> Result<DataFrame> {
    let rows = collection.sample_count();
    let mut timestamps = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);
    let mut networks = Vec::with_capacity(rows);
    let mut stations = Vec::with_capacity(rows);
    let mut locations = Vec::with_capacity(rows);
    let mut channels = Vec::with_capacity(rows);
    let mut rates = Vec::with_capacity(rows);
    let mut units = Vec::with_capacity(rows);
    let mut removed = Vec::with_capacity(rows);

    for trace in collection.iter() {
        let response_removed = trace.response_removed();
        for (i, value) in trace.data.iter().enumerate() {
            timestamps.push(timestamp_ns(trace.time_of(i)));
            values.push(*value);
            networks.push(trace.id.network.clone());
            stations.push(trace.id.station.clone());
            locations.push(trace.id.location.clone());
            channels.push(trace.id.channel.clone());
            rates.push(trace.sampling_rate);
            units.push(trace.unit.as_str().to_string());
            removed.push(response_removed);
        }
    }

    let mut df = DataFrame::new(vec![
        Column::new(COL_TIMESTAMP.into(), timestamps),
        Column::new(COL_VALUE.into(), values),
        Column::new(COL_NETWORK.into(), networks),
        Column::new(COL_STATION.into(), stations),
        Column::new(COL_LOCATION.into(), locations),
        Column::new(COL_CHANNEL.into(), channels),
        Column::new(COL_SAMPLING_RATE.into(), rates),
        Column::new(COL_UNIT.into(), units),
        Column::new(COL_RESPONSE_REMOVED.into(), removed),
    ])?;
    let timestamp = df
        .column(COL_TIMESTAMP)?
        .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?;
    df.with_column(timestamp)?;
    Ok(df)
}

/// Write `frame` to `path` with Snappy compression
pub fn write_frame(frame: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| SeismoError::Output {
        path: path.to_path_buf(),
        reason: format!("Failed to create parquet file: {}", e),
    })?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(frame)
        .map_err(|e| SeismoError::Output {
            path: path.to_path_buf(),
            reason: format!("Failed to write parquet: {}", e),
        })?;
    Ok(())
}

pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Write the collection as one row per sample; returns the row count
pub fn write_tabular(collection: &WaveformCollection, path: &Path) -> Result<usize> {
    let mut df = collection_to_frame(collection)?;
    write_frame(&mut df, path)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(df.height())
}

/// Convert a tabular frame back into records
pub fn frame_to_records(df: &DataFrame) -> Result<Vec<TabularRecord>> {
    let timestamps = df.column(COL_TIMESTAMP)?.cast(&DataType::Int64)?;
    let timestamps = timestamps.i64()?;
    let values = df.column(COL_VALUE)?.f64()?;
    let networks = df.column(COL_NETWORK)?.str()?;
    let stations = df.column(COL_STATION)?.str()?;
    let locations = df.column(COL_LOCATION)?.str()?;
    let channels = df.column(COL_CHANNEL)?.str()?;
    let rates = df.column(COL_SAMPLING_RATE)?.f64()?;
    let units = df.column(COL_UNIT)?.str()?;
    let removed = df.column(COL_RESPONSE_REMOVED)?.bool()?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let missing = |column: &str| SeismoError::Output {
            path: Default::default(),
            reason: format!("null {} in row {}", column, row),
        };
        records.push(TabularRecord {
            timestamp_ns: timestamps.get(row).ok_or_else(|| missing(COL_TIMESTAMP))?,
            value: values.get(row).unwrap_or(f64::NAN),
            network: networks.get(row).ok_or_else(|| missing(COL_NETWORK))?.to_string(),
            station: stations.get(row).ok_or_else(|| missing(COL_STATION))?.to_string(),
            location: locations.get(row).unwrap_or_default().to_string(),
            channel: channels.get(row).ok_or_else(|| missing(COL_CHANNEL))?.to_string(),
            sampling_rate: rates.get(row).ok_or_else(|| missing(COL_SAMPLING_RATE))?,
            unit: units.get(row).unwrap_or_default().to_string(),
            response_removed: removed.get(row).unwrap_or(false),
        });
    }
    Ok(records)
}

/// Reload a file written by [`write_tabular`]
pub fn read_tabular(path: &Path) -> Result<Vec<TabularRecord>> {
    frame_to_records(&read_frame(path)?)
}
