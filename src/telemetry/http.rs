//! JSON gateway client for the accelerator logging store
//!
//! `GET {base_url}?start=..&end=..&signals=a,b` answers
//! `{"signals":[{"name":..,"timestamps_ns":[..],"values":[..]}]}`.

use super::{TelemetryFrame, TelemetryStore};
use crate::constants::TELEMETRY_INDEX_COLUMN;
use crate::error::{Result, SeismoError};
use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::{Column, DataFrame};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    signals: Vec<SignalSeries>,
}

/// Samples of one signal as delivered by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct SignalSeries {
    pub name: String,
    pub timestamps_ns: Vec<i64>,
    pub values: Vec<Value>,
}

fn is_numeric(series: &SignalSeries) -> bool {
    series.values.iter().all(|v| v.is_null() || v.is_number())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Align signal series on the sorted union of their timestamps
pub fn frame_from_series(series: Vec<SignalSeries>) -> Result<TelemetryFrame> {
    for s in &series {
        if s.timestamps_ns.len() != s.values.len() {
            return Err(SeismoError::telemetry(format!(
                "signal '{}' has {} timestamps but {} values",
                s.name,
                s.timestamps_ns.len(),
                s.values.len()
            )));
        }
    }

    let index: Vec<i64> = series
        .iter()
        .flat_map(|s| s.timestamps_ns.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let position: HashMap<i64, usize> = index.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut columns = vec![Column::new(TELEMETRY_INDEX_COLUMN.into(), index.clone())];
    for s in &series {
        if s.values.is_empty() {
            warn!("Signal {} has no samples in the requested window", s.name);
        }
        let rows = s
            .timestamps_ns
            .iter()
            .zip(&s.values)
            .filter_map(|(t, v)| position.get(t).map(|row| (*row, v)));
        if is_numeric(s) {
            let mut values: Vec<Option<f64>> = vec![None; index.len()];
            for (row, value) in rows {
                values[row] = value.as_f64();
            }
            columns.push(Column::new(s.name.as_str().into(), values));
        } else {
            let mut values: Vec<Option<String>> = vec![None; index.len()];
            for (row, value) in rows {
                values[row] = as_text(value);
            }
            columns.push(Column::new(s.name.as_str().into(), values));
        }
    }

    TelemetryFrame::new(DataFrame::new(columns)?)
}

/// [`TelemetryStore`] backed by the HTTP JSON gateway
#[derive(Debug, Clone)]
pub struct HttpTelemetryStore {
    http: Client,
    base_url: String,
}

impl HttpTelemetryStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SeismoError::telemetry(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

impl TelemetryStore for HttpTelemetryStore {
    async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: &[String],
    ) -> Result<TelemetryFrame> {
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let signal_list = signals.join(",");
        debug!("Querying {} signals from {} to {}", signals.len(), start, end);

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("signals", signal_list.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SeismoError::telemetry(format!(
                "gateway answered {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let gateway: GatewayResponse = serde_json::from_str(&body)?;
        for requested in signals {
            if !gateway.signals.iter().any(|s| &s.name == requested) {
                warn!("Signal {} missing from gateway response", requested);
            }
        }
        frame_from_series(gateway.signals)
    }
}
