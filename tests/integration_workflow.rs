//! Integration tests for the post-processing and persistence workflow
//!
//! These tests drive the public API from StationXML metadata through
//! response removal to the miniSEED and Parquet outputs, then correlate the
//! tabular output with saved telemetry.

use chrono::{Duration, TimeZone, Utc};
use seismo_cern::config::Config;
use seismo_cern::fdsn::parse_station_xml;
use seismo_cern::models::{ProcessingStage, SampleUnit, Trace, TraceId, WaveformCollection, timestamp_ns};
use seismo_cern::mseed::{decode_records, write_mseed};
use seismo_cern::processing::PostProcessor;
use seismo_cern::processor::writer::{read_frame, read_tabular, write_tabular};
use seismo_cern::processor::output_paths;
use seismo_cern::telemetry::{
    SignalSeries, correlate, frame_from_series, load_telemetry, parse_timezone, save_telemetry,
    summary_rows,
};
use serde_json::json;
use tempfile::TempDir;

const SENSITIVITY: f64 = 6.0e8;

/// StationXML for a single velocity sensor with a flat response
const MEYRIN_STATIONXML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FDSNStationXML xmlns="http://www.fdsn.org/xml/station/1" schemaVersion="1.1">
  <Source>Test</Source>
  <Created>2025-07-30T08:00:00</Created>
  <Network code="CH">
    <Station code="MEY" startDate="2012-01-01T00:00:00">
      <Latitude>46.2342</Latitude>
      <Longitude>6.0550</Longitude>
      <Elevation>430.0</Elevation>
      <Channel code="HHZ" locationCode="" startDate="2012-01-01T00:00:00">
        <Latitude>46.2342</Latitude>
        <Longitude>6.0550</Longitude>
        <Elevation>430.0</Elevation>
        <Depth>0</Depth>
        <SampleRate>100</SampleRate>
        <Response>
          <InstrumentSensitivity>
            <Value>6.0e8</Value>
            <Frequency>1.0</Frequency>
            <InputUnits><Name>M/S</Name></InputUnits>
            <OutputUnits><Name>COUNTS</Name></OutputUnits>
          </InstrumentSensitivity>
        </Response>
      </Channel>
    </Station>
  </Network>
</FDSNStationXML>"#;

/// One minute of a 2 Hz sine recorded in counts, 1 µm/s peak ground velocity
fn recorded_collection() -> WaveformCollection {
    let start = Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap();
    let data: Vec<f64> = (0..6000)
        .map(|i| {
            let t = i as f64 / 100.0;
            1.0e-6 * SENSITIVITY * (2.0 * std::f64::consts::PI * 2.0 * t).sin()
        })
        .collect();
    let mut trace = Trace::new(TraceId::new("CH", "MEY", "", "HHZ"), start, 100.0, data);
    trace.provider = Some("ETH".to_string());
    WaveformCollection::new(vec![trace])
}

#[test]
fn test_response_removal_recovers_ground_velocity() {
    let inventory = parse_station_xml(MEYRIN_STATIONXML).unwrap();
    let mut collection = recorded_collection();
    let config = Config::default();

    let report = PostProcessor::new(&config.processing).run(&mut collection, &inventory);

    assert!(report.is_clean());
    let trace = &collection.traces[0];
    assert_eq!(trace.unit, SampleUnit::Velocity);
    assert!(trace.status.succeeded(ProcessingStage::RemoveResponse));

    // Away from the tapered ends the amplitude is the true ground velocity
    let peak = trace.data[1000..5000]
        .iter()
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    assert!(
        (peak - 1.0e-6).abs() < 0.05e-6,
        "peak velocity {} should be close to 1e-6 m/s",
        peak
    );
}

#[test]
fn test_outputs_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let inventory = parse_station_xml(MEYRIN_STATIONXML).unwrap();
    let mut collection = recorded_collection();
    let config = Config::default();
    PostProcessor::new(&config.processing).run(&mut collection, &inventory);

    let start = collection.traces[0].start;
    let (mseed_path, parquet_path) = output_paths(temp_dir.path(), start, 1);
    write_mseed(&collection, &mseed_path).unwrap();
    let rows = write_tabular(&collection, &parquet_path).unwrap();
    assert_eq!(rows, 6000);

    let decoded = decode_records(&std::fs::read(&mseed_path).unwrap()).unwrap();
    assert_eq!(decoded.len(), 1);
    let restored = &decoded.traces[0];
    assert_eq!(restored.id, collection.traces[0].id);
    assert_eq!(restored.start, start);
    assert_eq!(restored.data, collection.traces[0].data);

    let records = read_tabular(&parquet_path).unwrap();
    assert_eq!(records.len(), 6000);
    assert_eq!(records[0].timestamp(), start);
    assert_eq!(records[100].timestamp(), start + Duration::seconds(1));
    assert!(records.iter().all(|r| r.unit == "M/S" && r.response_removed));
    assert_eq!(records[42].value, collection.traces[0].data[42]);
}

#[test]
fn test_correlation_against_saved_telemetry() {
    let temp_dir = TempDir::new().unwrap();
    let inventory = parse_station_xml(MEYRIN_STATIONXML).unwrap();
    let mut collection = recorded_collection();
    PostProcessor::new(&Config::default().processing).run(&mut collection, &inventory);

    let parquet_path = temp_dir.path().join("waveforms.parquet");
    write_tabular(&collection, &parquet_path).unwrap();

    let start = collection.traces[0].start;
    let at = |secs: i64| timestamp_ns(start + Duration::seconds(secs));
    let telemetry = frame_from_series(vec![
        SignalSeries {
            name: "HX:FILLN".to_string(),
            timestamps_ns: vec![at(-3600)],
            values: vec![json!(10950)],
        },
        SignalSeries {
            name: "HX:BMODE".to_string(),
            timestamps_ns: vec![at(-3600), at(30)],
            values: vec![json!("ADJUST"), json!("STABLE")],
        },
    ])
    .unwrap();
    let telemetry_path = temp_dir.path().join("lhc").join("telemetry.parquet");
    save_telemetry(&telemetry, &telemetry_path).unwrap();

    let seismic = read_frame(&parquet_path).unwrap();
    let telemetry = load_telemetry(&telemetry_path, parse_timezone("Europe/Zurich").unwrap()).unwrap();
    let summary = correlate(&seismic, &telemetry, "HX:FILLN", "HX:BMODE").unwrap();
    let rows = summary_rows(&summary).unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.fill_number == Some(10950)));
    assert_eq!(rows[0].beam_mode.as_deref(), Some("ADJUST"));
    assert_eq!(rows[0].samples, 3000);
    assert_eq!(rows[1].beam_mode.as_deref(), Some("STABLE"));
    assert_eq!(rows[1].samples, 3000);
    assert!(rows.iter().all(|r| r.rms > 0.0 && r.min < 0.0 && r.max > 0.0));
}
