//! End-to-end acquisition pipeline tests

use super::{MockConnector, MockLocator, MockSource, Reply, call_log, calls, inventory};
use crate::config::Config;
use crate::error::SeismoError;
use crate::mseed::decode_records;
use crate::processor::{AcquisitionPipeline, output_stem, read_tabular};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn config(temp_dir: &TempDir, providers: &[&str]) -> Config {
    Config::default()
        .with_providers(providers.iter().map(|p| p.to_string()).collect())
        .with_output_directory(temp_dir.path().join("seismo_cern"))
}

#[tokio::test]
async fn test_pipeline_writes_both_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let log = call_log();
    let connector = MockConnector::new(vec![
        MockSource::new("P1", &log)
            .reply("STAX", Reply::Fail("503".to_string()))
            .reply("STAY", Reply::Data(3000)),
        MockSource::new("P2", &log).reply("STAX", Reply::Data(3000)),
    ]);
    let locator = MockLocator::new(inventory(&[("XX", "STAX"), ("XX", "STAY")]));

    let pipeline = AcquisitionPipeline::new(locator, connector, config(&temp_dir, &["P1", "P2"])).quiet();
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.stations_found, 2);
    assert_eq!(stats.providers_available, 2);
    assert_eq!(stats.stations_retrieved, 2);
    assert_eq!(stats.stations_failed, 0);
    assert_eq!(stats.traces, 2);
    assert_eq!(stats.degraded_traces, 0);

    let mseed_path = stats.mseed_path.unwrap();
    assert!(
        mseed_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("waveforms_2025-07-29T232400_UTC_180min")
    );
    let decoded = decode_records(&std::fs::read(&mseed_path).unwrap()).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.sample_count(), 6000);

    let records = read_tabular(&stats.parquet_path.unwrap()).unwrap();
    assert_eq!(records.len(), 6000);
    assert!(records.iter().all(|r| r.response_removed && r.unit == "M/S"));
    assert_eq!(calls(&log).len(), 3);
}

#[tokio::test]
async fn test_empty_pool_ends_in_empty_result() {
    let temp_dir = TempDir::new().unwrap();
    let log = call_log();
    let connector = MockConnector::new(Vec::new());
    let locator = MockLocator::new(inventory(&[("CH", "GE01"), ("CH", "GE02")]));

    let pipeline =
        AcquisitionPipeline::new(locator, connector, config(&temp_dir, &["RESIF", "ETH"])).quiet();
    let result = pipeline.run().await;

    assert!(matches!(result, Err(SeismoError::EmptyResult)));
    assert!(calls(&log).is_empty());
    assert!(!temp_dir.path().join("seismo_cern").exists());
}

#[tokio::test]
async fn test_detrend_failure_still_writes_output() {
    let temp_dir = TempDir::new().unwrap();
    let log = call_log();
    let connector = MockConnector::new(vec![
        MockSource::new("P1", &log)
            .reply("GE01", Reply::Corrupt(2000))
            .reply("GE02", Reply::Data(2000)),
    ]);
    let locator = MockLocator::new(inventory(&[("CH", "GE01"), ("CH", "GE02")]));

    let pipeline = AcquisitionPipeline::new(locator, connector, config(&temp_dir, &["P1"])).quiet();
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.traces, 2);
    assert_eq!(stats.degraded_traces, 1);
    let mseed_path = stats.mseed_path.unwrap();
    assert!(mseed_path.exists());

    let records = read_tabular(&stats.parquet_path.unwrap()).unwrap();
    let corrupt: Vec<_> = records.iter().filter(|r| r.station == "GE01").collect();
    assert_eq!(corrupt.len(), 2000);
    assert!(corrupt.iter().all(|r| !r.response_removed));
    assert!(
        records
            .iter()
            .filter(|r| r.station == "GE02")
            .all(|r| r.response_removed)
    );
}

#[tokio::test]
async fn test_parquet_output_can_be_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let log = call_log();
    let connector = MockConnector::new(vec![MockSource::new("P1", &log).reply("GE01", Reply::Data(500))]);
    let locator = MockLocator::new(inventory(&[("CH", "GE01")]));

    let pipeline = AcquisitionPipeline::new(
        locator,
        connector,
        config(&temp_dir, &["P1"]).without_parquet(),
    )
    .quiet();
    let stats = pipeline.run().await.unwrap();

    assert!(stats.parquet_path.is_none());
    assert!(stats.mseed_path.unwrap().exists());
}

#[test]
fn test_output_stem() {
    let start = Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap();
    assert_eq!(
        output_stem(start, 30),
        "waveforms_2025-07-29T232400_UTC_30min"
    );
}
