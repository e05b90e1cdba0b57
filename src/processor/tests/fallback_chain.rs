//! Fallback retrieval tests

use super::{MockSource, Reply, call_log, calls, inventory, request};
use crate::config::Config;
use crate::error::SeismoError;
use crate::processor::{ProviderPool, acquire, fetch_with_fallback};

#[tokio::test]
async fn test_first_success_wins_and_later_providers_are_not_queried() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log).reply("GE01", Reply::Data(100)),
        MockSource::new("P2", &log).reply("GE01", Reply::Data(100)),
    ]);

    let retrieval = fetch_with_fallback(&pool, &request("CH", "GE01")).await.unwrap();

    assert_eq!(retrieval.provider, "P1");
    assert_eq!(retrieval.attempts, 1);
    assert_eq!(retrieval.data.len(), 1);
    assert_eq!(calls(&log), vec!["P1:CH.GE01"]);
}

#[tokio::test]
async fn test_falls_through_failures_and_empty_results() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log).reply("GE01", Reply::Fail("HTTP 503".to_string())),
        MockSource::new("P2", &log).reply("GE01", Reply::Empty),
        MockSource::new("P3", &log).reply("GE01", Reply::Data(50)),
        MockSource::new("P4", &log).reply("GE01", Reply::Data(50)),
    ]);

    let retrieval = fetch_with_fallback(&pool, &request("CH", "GE01")).await.unwrap();

    assert_eq!(retrieval.provider, "P3");
    assert_eq!(retrieval.attempts, 3);
    assert_eq!(calls(&log), vec!["P1:CH.GE01", "P2:CH.GE01", "P3:CH.GE01"]);
}

#[tokio::test]
async fn test_exhausted_pool_reports_last_error() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log).reply("GE01", Reply::Fail("first".to_string())),
        MockSource::new("P2", &log).reply("GE01", Reply::Fail("second".to_string())),
    ]);

    let error = fetch_with_fallback(&pool, &request("CH", "GE01"))
        .await
        .unwrap_err();

    match error {
        SeismoError::RetrievalFailure {
            station,
            attempts,
            source,
        } => {
            assert_eq!(station, "CH.GE01");
            assert_eq!(attempts, 2);
            match *source {
                SeismoError::Fetch {
                    provider, reason, ..
                } => {
                    assert_eq!(provider, "P2");
                    assert_eq!(reason, "second");
                }
                other => panic!("Expected Fetch error, got {:?}", other),
            }
        }
        other => panic!("Expected RetrievalFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_result_as_last_attempt_is_reported_as_no_data() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log).reply("GE01", Reply::Fail("timeout".to_string())),
        MockSource::new("P2", &log).reply("GE01", Reply::Empty),
    ]);

    let error = fetch_with_fallback(&pool, &request("CH", "GE01"))
        .await
        .unwrap_err();
    match error {
        SeismoError::RetrievalFailure { source, .. } => {
            assert!(matches!(*source, SeismoError::NoData { ref provider, .. } if provider == "P2"));
        }
        other => panic!("Expected RetrievalFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_pool_makes_no_calls() {
    let pool: ProviderPool<MockSource> = ProviderPool::from_clients(Vec::new());

    let error = fetch_with_fallback(&pool, &request("CH", "GE01"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        SeismoError::NoProviderAvailable { ref station } if station == "CH.GE01"
    ));
}

#[tokio::test]
async fn test_two_stations_served_by_different_providers() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log)
            .reply("STAX", Reply::Fail("no such station".to_string()))
            .reply("STAY", Reply::Data(200)),
        MockSource::new("P2", &log)
            .reply("STAX", Reply::Data(200))
            .reply("STAY", Reply::Data(200)),
    ]);
    let config = Config::default();

    let acquisition = acquire(
        &pool,
        &inventory(&[("XX", "STAX"), ("XX", "STAY")]),
        &config.acquisition,
        false,
    )
    .await
    .unwrap();

    assert_eq!(acquisition.stations_retrieved(), 2);
    assert_eq!(acquisition.collection.station_count(), 2);

    let provider_of = |station: &str| {
        acquisition
            .collection
            .iter()
            .find(|t| t.id.station == station)
            .and_then(|t| t.provider.clone())
    };
    assert_eq!(provider_of("STAX").as_deref(), Some("P2"));
    assert_eq!(provider_of("STAY").as_deref(), Some("P1"));
    assert_eq!(
        calls(&log),
        vec!["P1:XX.STAX", "P2:XX.STAX", "P1:XX.STAY"]
    );
}

#[tokio::test]
async fn test_failed_station_is_skipped() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log)
            .reply("GOOD", Reply::Data(100))
            .reply("BAD", Reply::Fail("404".to_string())),
    ]);
    let config = Config::default();

    let acquisition = acquire(
        &pool,
        &inventory(&[("CH", "BAD"), ("CH", "GOOD")]),
        &config.acquisition,
        false,
    )
    .await
    .unwrap();

    assert_eq!(acquisition.stations_retrieved(), 1);
    assert_eq!(acquisition.stations_failed(), 1);
    let bad = &acquisition.reports[0];
    assert_eq!(bad.station, "BAD");
    assert_eq!(bad.attempts, 1);
    assert!(bad.error.as_deref().unwrap().contains("404"));
}

#[tokio::test]
async fn test_no_data_anywhere_is_empty_result() {
    let log = call_log();
    let pool = ProviderPool::from_clients(vec![
        MockSource::new("P1", &log).reply("GE01", Reply::Empty),
    ]);
    let config = Config::default();

    let result = acquire(&pool, &inventory(&[("CH", "GE01")]), &config.acquisition, false).await;

    assert!(matches!(result, Err(SeismoError::EmptyResult)));
}
