//! Post-processing of acquired waveforms
//!
//! Stages run in a fixed order: merge, detrend, taper, remove_response.
//! Every stage is best effort. A failure is logged, recorded as a failed
//! [`StageOutcome`](crate::models::StageOutcome) on the affected traces and
//! the pipeline moves on; successes are recorded too, so each trace carries
//! a complete account of what was done to it.

pub mod detrend;
pub mod merge;
pub mod response;
pub mod taper;

pub use detrend::detrend_linear;
pub use merge::merge_segments;
pub use response::{ResponseRemoval, evaluate_response, prefilter_weight};
pub use taper::{cosine_taper, hann_taper};

use crate::config::ProcessingConfig;
use crate::error::{Result, SeismoError};
use crate::models::{Inventory, ProcessingStage, Trace, TraceId, WaveformCollection};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Per-stage failure counts of one post-processing run
#[derive(Debug, Clone, Default)]
pub struct PostProcessingReport {
    pub traces: usize,
    failures: HashMap<ProcessingStage, usize>,
}

impl PostProcessingReport {
    pub fn failures(&self, stage: ProcessingStage) -> usize {
        self.failures.get(&stage).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total_failures() == 0
    }

    fn record(&mut self, trace: &mut Trace, stage: ProcessingStage, result: Result<()>) {
        match result {
            Ok(()) => trace.status.record_success(stage),
            Err(e) => self.record_failure(trace, stage, &e),
        }
    }

    fn record_failure(&mut self, trace: &mut Trace, stage: ProcessingStage, error: &SeismoError) {
        warn!("{} failed for {}: {}", stage.as_str(), trace.id, error);
        trace.status.record_failure(stage, error.to_string());
        *self.failures.entry(stage).or_insert(0) += 1;
    }
}

/// Runs the post-processing stages over a collection
#[derive(Debug, Clone)]
pub struct PostProcessor {
    taper_max_percentage: f64,
    removal: ResponseRemoval,
}

impl PostProcessor {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            taper_max_percentage: config.taper_max_percentage,
            removal: ResponseRemoval::from_config(config),
        }
    }

    /// Process `collection` in place using responses from `inventory`
    pub fn run(
        &self,
        collection: &mut WaveformCollection,
        inventory: &Inventory,
    ) -> PostProcessingReport {
        let mut report = PostProcessingReport::default();

        self.merge(collection, &mut report);
        for trace in &mut collection.traces {
            let result = detrend_linear(&mut trace.data);
            report.record(trace, ProcessingStage::Detrend, result);
        }
        for trace in &mut collection.traces {
            let result = hann_taper(&mut trace.data, self.taper_max_percentage);
            report.record(trace, ProcessingStage::Taper, result);
        }
        for trace in &mut collection.traces {
            let result = self.remove_response(trace, inventory);
            report.record(trace, ProcessingStage::RemoveResponse, result);
        }

        report.traces = collection.len();
        if report.is_clean() {
            info!(
                "Post-processing complete: {} traces, output {}",
                report.traces, self.removal.output
            );
        } else {
            warn!(
                "Post-processing complete with {} stage failures over {} traces",
                report.total_failures(),
                report.traces
            );
        }
        report
    }

    fn merge(&self, collection: &mut WaveformCollection, report: &mut PostProcessingReport) {
        let mut order: Vec<TraceId> = Vec::new();
        let mut groups: HashMap<TraceId, Vec<Trace>> = HashMap::new();
        for trace in collection.traces.drain(..) {
            if !groups.contains_key(&trace.id) {
                order.push(trace.id.clone());
            }
            groups.entry(trace.id.clone()).or_default().push(trace);
        }

        for id in order {
            let Some(segments) = groups.remove(&id) else {
                continue;
            };
            match merge_segments(&segments) {
                Ok(mut merged) => {
                    if segments.len() > 1 {
                        debug!("Merged {} segments of {}", segments.len(), id);
                    }
                    merged.status.record_success(ProcessingStage::Merge);
                    collection.traces.push(merged);
                }
                Err(e) => {
                    for mut segment in segments {
                        report.record_failure(&mut segment, ProcessingStage::Merge, &e);
                        collection.traces.push(segment);
                    }
                }
            }
        }
    }

    fn remove_response(&self, trace: &mut Trace, inventory: &Inventory) -> Result<()> {
        let response = inventory.find_response(&trace.id, trace.start).ok_or_else(|| {
            SeismoError::ResponseNotFound {
                trace_id: trace.id.to_string(),
                time: trace.start.to_rfc3339(),
            }
        })?;
        self.removal.apply(trace, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{
        Channel, ChannelResponse, Network, SampleUnit, Sensitivity, Station,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn inventory_for(station: &str) -> Inventory {
        Inventory {
            networks: vec![Network {
                code: "CH".to_string(),
                description: None,
                stations: vec![Station {
                    code: station.to_string(),
                    latitude: 46.23,
                    longitude: 6.05,
                    elevation: 440.0,
                    site_name: None,
                    channels: vec![Channel {
                        location_code: String::new(),
                        code: "HHZ".to_string(),
                        start: None,
                        end: None,
                        sample_rate: Some(100.0),
                        response: Some(ChannelResponse {
                            sensitivity: Some(Sensitivity {
                                value: 1.0e9,
                                frequency: 1.0,
                                input_units: "M/S".to_string(),
                                output_units: "COUNTS".to_string(),
                            }),
                            stages: Vec::new(),
                        }),
                    }],
                }],
            }],
        }
    }

    fn trace(station: &str, offset_secs: i64, samples: usize) -> Trace {
        let data = (0..samples)
            .map(|i| 1000.0 * (i as f64 * 0.2).sin() + 0.5 * i as f64)
            .collect();
        Trace::new(
            TraceId::new("CH", station, "", "HHZ"),
            Utc.with_ymd_and_hms(2025, 7, 29, 23, 24, 0).unwrap() + Duration::seconds(offset_secs),
            100.0,
            data,
        )
    }

    fn processor() -> PostProcessor {
        PostProcessor::new(&Config::default().processing)
    }

    #[test]
    fn test_clean_run_records_every_stage() {
        let mut collection = WaveformCollection::new(vec![trace("GE01", 0, 2000)]);
        let report = processor().run(&mut collection, &inventory_for("GE01"));

        assert!(report.is_clean());
        let processed = &collection.traces[0];
        for stage in ProcessingStage::ALL {
            assert!(processed.status.succeeded(stage), "{} not recorded", stage.as_str());
        }
        assert_eq!(processed.unit, SampleUnit::Velocity);
        assert!(processed.response_removed());
    }

    #[test]
    fn test_segments_are_merged() {
        let mut collection =
            WaveformCollection::new(vec![trace("GE01", 0, 1000), trace("GE01", 12, 1000)]);
        let report = processor().run(&mut collection, &inventory_for("GE01"));

        assert!(report.is_clean());
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.traces[0].len(), 2200);
    }

    #[test]
    fn test_missing_response_is_recorded_not_fatal() {
        let mut collection =
            WaveformCollection::new(vec![trace("GE01", 0, 2000), trace("GE02", 0, 2000)]);
        let report = processor().run(&mut collection, &inventory_for("GE01"));

        assert_eq!(report.failures(ProcessingStage::RemoveResponse), 1);
        assert_eq!(collection.len(), 2);

        let orphan = collection
            .iter()
            .find(|t| t.id.station == "GE02")
            .unwrap();
        assert!(!orphan.response_removed());
        assert_eq!(orphan.unit, SampleUnit::Counts);
        let outcome = orphan.status.outcome(ProcessingStage::RemoveResponse).unwrap();
        assert!(outcome.detail.as_deref().unwrap().contains("No response metadata"));
        assert_eq!(collection.degraded_count(), 1);
    }

    #[test]
    fn test_detrend_failure_does_not_stop_pipeline() {
        let mut bad = trace("GE01", 0, 2000);
        bad.data[100] = f64::NAN;
        let mut collection = WaveformCollection::new(vec![bad, trace("GE02", 0, 2000)]);
        let mut inventory = inventory_for("GE01");
        inventory.merge(inventory_for("GE02"));

        let report = processor().run(&mut collection, &inventory);

        assert_eq!(report.failures(ProcessingStage::Detrend), 1);
        let bad = collection.iter().find(|t| t.id.station == "GE01").unwrap();
        assert!(!bad.status.succeeded(ProcessingStage::Detrend));
        assert!(bad.status.succeeded(ProcessingStage::Taper));
        let good = collection.iter().find(|t| t.id.station == "GE02").unwrap();
        assert!(!good.status.is_degraded());
    }

    #[test]
    fn test_merge_failure_keeps_segments() {
        let mut other_rate = trace("GE01", 30, 500);
        other_rate.sampling_rate = 50.0;
        let mut collection = WaveformCollection::new(vec![trace("GE01", 0, 1000), other_rate]);
        let report = processor().run(&mut collection, &inventory_for("GE01"));

        assert_eq!(report.failures(ProcessingStage::Merge), 2);
        assert_eq!(collection.len(), 2);
        assert!(
            collection
                .iter()
                .all(|t| !t.status.succeeded(ProcessingStage::Merge))
        );
    }
}
