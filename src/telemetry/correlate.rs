//! Seismic activity per accelerator state
//!
//! Every seismic sample is tagged with the latest fill number and beam mode
//! known at or before its timestamp, then samples are aggregated per
//! (fill, beam mode, network, station, channel, unit, response removed).
//! Traces left in counts never share a row with corrected ones.

use super::TelemetryFrame;
use crate::error::{Result, SeismoError};
use crate::processor::writer::{
    COL_CHANNEL, COL_NETWORK, COL_RESPONSE_REMOVED, COL_STATION, COL_TIMESTAMP, COL_UNIT,
    COL_VALUE,
};
use polars::prelude::{Column, DataFrame, DataType, IntoLazy, SortMultipleOptions, col, len};
use tracing::{debug, warn};

pub const COL_FILL: &str = "fill_number";
pub const COL_BEAM_MODE: &str = "beam_mode";
pub const COL_SAMPLES: &str = "samples";
pub const COL_MEAN_SQUARE: &str = "mean_square";
pub const COL_RMS: &str = "rms";
pub const COL_MIN: &str = "min";
pub const COL_MAX: &str = "max";

/// One aggregated row of the correlation summary
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRow {
    pub fill_number: Option<i64>,
    pub beam_mode: Option<String>,
    pub network: String,
    pub station: String,
    pub channel: String,
    pub unit: String,
    pub response_removed: bool,
    pub samples: u64,
    pub mean_square: f64,
    pub rms: f64,
    pub min: f64,
    pub max: f64,
}

/// Latest value at or before `t` from time-sorted `(timestamp, value)` pairs
fn as_of<T: Clone>(series: &[(i64, T)], t: i64) -> Option<T> {
    let idx = series.partition_point(|(ts, _)| *ts <= t);
    idx.checked_sub(1).map(|i| series[i].1.clone())
}

/// Integral fill number, `None` for NaN, infinities and out-of-range values
fn fill_number(value: f64) -> Option<i64> {
    let rounded = value.round();
    if rounded.is_finite() && rounded.abs() < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        warn!("Ignoring fill number sample {}", value);
        None
    }
}

/// Aggregate the tabular seismic frame by accelerator state
pub fn correlate(
    seismic: &DataFrame,
    telemetry: &TelemetryFrame,
    fill_signal: &str,
    mode_signal: &str,
) -> Result<DataFrame> {
    let mut fills: Vec<(i64, i64)> = telemetry
        .numeric_signal(fill_signal)?
        .into_iter()
        .filter_map(|(t, v)| fill_number(v).map(|fill| (t, fill)))
        .collect();
    fills.sort_by_key(|(t, _)| *t);
    let mut modes = telemetry.text_signal(mode_signal)?;
    modes.sort_by_key(|(t, _)| *t);
    if fills.is_empty() {
        warn!("No {} samples, fill numbers will be null", fill_signal);
    }

    let timestamps = seismic.column(COL_TIMESTAMP)?.cast(&DataType::Int64)?;
    let timestamps = timestamps.i64()?;
    let mut fill_column: Vec<Option<i64>> = Vec::with_capacity(seismic.height());
    let mut mode_column: Vec<Option<String>> = Vec::with_capacity(seismic.height());
    for t in timestamps.into_iter() {
        let Some(t) = t else {
            fill_column.push(None);
            mode_column.push(None);
            continue;
        };
        fill_column.push(as_of(&fills, t));
        mode_column.push(as_of(&modes, t));
    }
    let tagged = fill_column.iter().filter(|f| f.is_some()).count();
    debug!(
        "Tagged {}/{} seismic samples with a fill number",
        tagged,
        seismic.height()
    );

    let mut tagged_frame = seismic.clone();
    tagged_frame.with_column(Column::new(COL_FILL.into(), fill_column))?;
    tagged_frame.with_column(Column::new(COL_BEAM_MODE.into(), mode_column))?;

    let keys = [
        COL_FILL,
        COL_BEAM_MODE,
        COL_NETWORK,
        COL_STATION,
        COL_CHANNEL,
        COL_UNIT,
        COL_RESPONSE_REMOVED,
    ];
    let mut summary = tagged_frame
        .lazy()
        .group_by(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg([
            len().alias(COL_SAMPLES),
            (col(COL_VALUE) * col(COL_VALUE))
                .mean()
                .alias(COL_MEAN_SQUARE),
            col(COL_VALUE).min().alias(COL_MIN),
            col(COL_VALUE).max().alias(COL_MAX),
        ])
        .sort_by_exprs(
            keys.iter().map(|k| col(*k)).collect::<Vec<_>>(),
            SortMultipleOptions::default(),
        )
        .collect()?;

    let rms: Vec<Option<f64>> = summary
        .column(COL_MEAN_SQUARE)?
        .f64()?
        .into_iter()
        .map(|ms| ms.map(f64::sqrt))
        .collect();
    summary.with_column(Column::new(COL_RMS.into(), rms))?;
    Ok(summary)
}

/// Read a correlation summary back into rows
pub fn summary_rows(summary: &DataFrame) -> Result<Vec<CorrelationRow>> {
    let fills = summary.column(COL_FILL)?.cast(&DataType::Int64)?;
    let fills = fills.i64()?;
    let modes = summary.column(COL_BEAM_MODE)?.cast(&DataType::String)?;
    let modes = modes.str()?;
    let networks = summary.column(COL_NETWORK)?.str()?;
    let stations = summary.column(COL_STATION)?.str()?;
    let channels = summary.column(COL_CHANNEL)?.str()?;
    let units = summary.column(COL_UNIT)?.str()?;
    let removed = summary.column(COL_RESPONSE_REMOVED)?.bool()?;
    let samples = summary.column(COL_SAMPLES)?.cast(&DataType::UInt64)?;
    let samples = samples.u64()?;
    let mean_square = summary.column(COL_MEAN_SQUARE)?.f64()?;
    let rms = summary.column(COL_RMS)?.f64()?;
    let min = summary.column(COL_MIN)?.f64()?;
    let max = summary.column(COL_MAX)?.f64()?;

    let text = |value: Option<&str>, row: usize, column: &str| {
        value.map(str::to_string).ok_or_else(|| {
            SeismoError::telemetry(format!("null {} in summary row {}", column, row))
        })
    };

    (0..summary.height())
        .map(|row| {
            Ok(CorrelationRow {
                fill_number: fills.get(row),
                beam_mode: modes.get(row).map(str::to_string),
                network: text(networks.get(row), row, COL_NETWORK)?,
                station: text(stations.get(row), row, COL_STATION)?,
                channel: text(channels.get(row), row, COL_CHANNEL)?,
                unit: text(units.get(row), row, COL_UNIT)?,
                response_removed: removed.get(row).unwrap_or(false),
                samples: samples.get(row).unwrap_or(0),
                mean_square: mean_square.get(row).unwrap_or(f64::NAN),
                rms: rms.get(row).unwrap_or(f64::NAN),
                min: min.get(row).unwrap_or(f64::NAN),
                max: max.get(row).unwrap_or(f64::NAN),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ProcessingStage, SampleUnit, Trace, TraceId, WaveformCollection, timestamp_ns,
    };
    use crate::processor::writer::collection_to_frame;
    use crate::telemetry::{SignalSeries, frame_from_series};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_as_of_lookup() {
        let series = vec![(10, "A"), (20, "B"), (30, "C")];
        assert_eq!(as_of(&series, 5), None);
        assert_eq!(as_of(&series, 10), Some("A"));
        assert_eq!(as_of(&series, 25), Some("B"));
        assert_eq!(as_of(&series, 99), Some("C"));
    }

    #[test]
    fn test_correlation_groups_by_accelerator_state() {
        let start = Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap();
        // 1 Hz trace, 10 samples: values 1..=10
        let mut trace = Trace::new(
            TraceId::new("CH", "GE01", "", "HHZ"),
            start,
            1.0,
            (1..=10).map(f64::from).collect(),
        );
        trace.unit = SampleUnit::Velocity;
        let seismic = collection_to_frame(&WaveformCollection::new(vec![trace])).unwrap();

        let at = |secs: i64| timestamp_ns(start + Duration::seconds(secs));
        let telemetry = frame_from_series(vec![
            SignalSeries {
                name: "HX:FILLN".to_string(),
                timestamps_ns: vec![at(-60), at(6)],
                values: vec![json!(10950), json!(10951)],
            },
            SignalSeries {
                name: "HX:BMODE".to_string(),
                timestamps_ns: vec![at(-60), at(3)],
                values: vec![json!("RAMP"), json!("STABLE")],
            },
        ])
        .unwrap();

        let summary = correlate(&seismic, &telemetry, "HX:FILLN", "HX:BMODE").unwrap();
        let rows = summary_rows(&summary).unwrap();

        // samples 0..3 -> (10950, RAMP), 3..6 -> (10950, STABLE), 6..10 -> (10951, STABLE)
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fill_number, Some(10950));
        assert_eq!(rows[0].beam_mode.as_deref(), Some("RAMP"));
        assert_eq!(rows[0].samples, 3);
        assert_eq!(rows[0].min, 1.0);
        assert_eq!(rows[0].max, 3.0);
        assert!((rows[0].mean_square - 14.0 / 3.0).abs() < 1e-12);
        assert!((rows[0].rms - (14.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert_eq!(rows[1].beam_mode.as_deref(), Some("STABLE"));
        assert_eq!(rows[1].fill_number, Some(10950));
        assert_eq!(rows[1].samples, 3);

        assert_eq!(rows[2].fill_number, Some(10951));
        assert_eq!(rows[2].samples, 4);
        assert_eq!(rows[2].max, 10.0);
    }

    #[test]
    fn test_uncorrected_traces_get_their_own_rows() {
        let start = Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap();
        let mut corrected = Trace::new(
            TraceId::new("CH", "GE01", "", "HHZ"),
            start,
            1.0,
            vec![1.0e-6, -1.0e-6, 1.0e-6, -1.0e-6],
        );
        corrected.unit = SampleUnit::Velocity;
        corrected
            .status
            .record_success(ProcessingStage::RemoveResponse);
        let mut raw = Trace::new(
            TraceId::new("CH", "GE02", "", "HHZ"),
            start,
            1.0,
            vec![600.0, -600.0, 600.0, -600.0],
        );
        raw.status
            .record_failure(ProcessingStage::RemoveResponse, "no response metadata");
        let seismic =
            collection_to_frame(&WaveformCollection::new(vec![corrected, raw])).unwrap();

        let telemetry = frame_from_series(vec![
            SignalSeries {
                name: "HX:FILLN".to_string(),
                timestamps_ns: vec![timestamp_ns(start)],
                values: vec![json!(10950)],
            },
            SignalSeries {
                name: "HX:BMODE".to_string(),
                timestamps_ns: vec![timestamp_ns(start)],
                values: vec![json!("STABLE")],
            },
        ])
        .unwrap();

        let summary = correlate(&seismic, &telemetry, "HX:FILLN", "HX:BMODE").unwrap();
        assert!(summary.column(COL_UNIT).is_ok());
        assert!(summary.column(COL_RESPONSE_REMOVED).is_ok());

        let rows = summary_rows(&summary).unwrap();
        assert_eq!(rows.len(), 2);
        let ge01 = rows.iter().find(|r| r.station == "GE01").unwrap();
        assert_eq!(ge01.unit, "M/S");
        assert!(ge01.response_removed);
        assert!((ge01.rms - 1.0e-6).abs() < 1e-15);
        let ge02 = rows.iter().find(|r| r.station == "GE02").unwrap();
        assert_eq!(ge02.unit, "COUNTS");
        assert!(!ge02.response_removed);
        assert!((ge02.rms - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_fill_numbers_are_skipped() {
        assert_eq!(fill_number(10950.4), Some(10950));
        assert_eq!(fill_number(f64::NAN), None);
        assert_eq!(fill_number(f64::INFINITY), None);
        assert_eq!(fill_number(1.0e30), None);
    }

    #[test]
    fn test_missing_signal_fails() {
        let telemetry = frame_from_series(vec![SignalSeries {
            name: "HX:FILLN".to_string(),
            timestamps_ns: vec![0],
            values: vec![json!(1)],
        }])
        .unwrap();
        let seismic = collection_to_frame(&WaveformCollection::default()).unwrap();
        assert!(correlate(&seismic, &telemetry, "HX:FILLN", "HX:BMODE").is_err());
    }
}
