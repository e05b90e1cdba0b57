//! Accelerator telemetry
//!
//! Signals are held in a wide frame: one nullable column per signal plus
//! an Int64 `timestamp_ns` index (UTC nanoseconds). Numeric signals become
//! Float64 columns and textual ones (beam mode) String columns.

pub mod correlate;
pub mod http;

pub use correlate::{CorrelationRow, correlate, summary_rows};
pub use http::{HttpTelemetryStore, SignalSeries, frame_from_series};

use crate::constants::TELEMETRY_INDEX_COLUMN;
use crate::error::{Result, SeismoError};
use crate::processor::writer::{read_frame, write_frame};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use polars::prelude::{DataFrame, DataType};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info};

/// Time-series store holding accelerator signals
pub trait TelemetryStore {
    fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        signals: &[String],
    ) -> impl Future<Output = Result<TelemetryFrame>> + Send;
}

/// Wide telemetry frame indexed by UTC nanoseconds
#[derive(Debug, Clone)]
pub struct TelemetryFrame {
    frame: DataFrame,
    timezone: Tz,
}

impl TelemetryFrame {
    pub fn new(frame: DataFrame) -> Result<Self> {
        if frame.column(TELEMETRY_INDEX_COLUMN).is_err() {
            return Err(SeismoError::telemetry(format!(
                "telemetry frame has no '{}' column",
                TELEMETRY_INDEX_COLUMN
            )));
        }
        Ok(Self {
            frame,
            timezone: Tz::UTC,
        })
    }

    /// Present local times in `timezone`
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| name != TELEMETRY_INDEX_COLUMN)
            .collect()
    }

    pub fn index(&self) -> Result<Vec<i64>> {
        let index = self
            .frame
            .column(TELEMETRY_INDEX_COLUMN)?
            .cast(&DataType::Int64)?;
        Ok(index.i64()?.into_iter().flatten().collect())
    }

    /// Index converted to the frame's timezone
    pub fn local_times(&self) -> Result<Vec<DateTime<Tz>>> {
        Ok(self
            .index()?
            .into_iter()
            .map(|ns| DateTime::from_timestamp_nanos(ns).with_timezone(&self.timezone))
            .collect())
    }

    fn signal_column(&self, name: &str) -> Result<polars::prelude::Column> {
        self.frame
            .column(name)
            .cloned()
            .map_err(|_| SeismoError::telemetry(format!("signal '{}' not in telemetry", name)))
    }

    /// Non-null (timestamp, value) pairs of a numeric signal
    pub fn numeric_signal(&self, name: &str) -> Result<Vec<(i64, f64)>> {
        let values = self.signal_column(name)?.cast(&DataType::Float64)?;
        let index = self
            .frame
            .column(TELEMETRY_INDEX_COLUMN)?
            .cast(&DataType::Int64)?;
        Ok(index
            .i64()?
            .into_iter()
            .zip(values.f64()?)
            .filter_map(|(t, v)| Some((t?, v?)))
            .collect())
    }

    /// Non-null (timestamp, text) pairs of a signal, numbers rendered as text
    pub fn text_signal(&self, name: &str) -> Result<Vec<(i64, String)>> {
        let values = self.signal_column(name)?.cast(&DataType::String)?;
        let index = self
            .frame
            .column(TELEMETRY_INDEX_COLUMN)?
            .cast(&DataType::Int64)?;
        Ok(index
            .i64()?
            .into_iter()
            .zip(values.str()?)
            .filter_map(|(t, v)| Some((t?, v?.to_string())))
            .collect())
    }
}

/// Persist telemetry to Parquet
pub fn save_telemetry(telemetry: &TelemetryFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut frame = telemetry.frame.clone();
    write_frame(&mut frame, path)?;
    info!(
        "Saved {} telemetry rows ({} signals) to {}",
        frame.height(),
        telemetry.signal_names().len(),
        path.display()
    );
    Ok(())
}

/// Reload telemetry saved by [`save_telemetry`], presenting times in `timezone`
pub fn load_telemetry(path: &Path, timezone: Tz) -> Result<TelemetryFrame> {
    let frame = read_frame(path)?;
    let telemetry = TelemetryFrame::new(frame)?.with_timezone(timezone);
    debug!(
        "Loaded {} telemetry rows from {} ({})",
        telemetry.height(),
        path.display(),
        timezone
    );
    Ok(telemetry)
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SeismoError::configuration(format!("unknown timezone '{}'", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_frame() -> TelemetryFrame {
        let base = Utc.with_ymd_and_hms(2025, 7, 29, 22, 0, 0).unwrap();
        let ns = |minutes: i64| (base + chrono::Duration::minutes(minutes)).timestamp_nanos_opt().unwrap();
        frame_from_series(vec![
            SignalSeries {
                name: "HX:FILLN".to_string(),
                timestamps_ns: vec![ns(0), ns(30)],
                values: vec![json!(10950), json!(10951)],
            },
            SignalSeries {
                name: "HX:BMODE".to_string(),
                timestamps_ns: vec![ns(0), ns(15)],
                values: vec![json!("INJPROT"), json!("STABLE")],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_signal_accessors() {
        let telemetry = sample_frame();
        assert_eq!(telemetry.height(), 3);
        assert_eq!(telemetry.signal_names(), vec!["HX:FILLN", "HX:BMODE"]);

        let fills = telemetry.numeric_signal("HX:FILLN").unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[1].1, 10951.0);

        let modes = telemetry.text_signal("HX:BMODE").unwrap();
        assert_eq!(modes[1].1, "STABLE");
        assert!(telemetry.numeric_signal("MISSING").is_err());
    }

    #[test]
    fn test_save_and_load_converts_timezone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lhc.parquet");
        let telemetry = sample_frame();

        save_telemetry(&telemetry, &path).unwrap();
        let loaded = load_telemetry(&path, parse_timezone("Europe/Zurich").unwrap()).unwrap();

        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.index().unwrap(), telemetry.index().unwrap());
        // 22:00 UTC is midnight in Zurich during summer time
        let local = loaded.local_times().unwrap();
        assert_eq!(local[0].hour(), 0);
        assert_eq!(loaded.text_signal("HX:BMODE").unwrap().len(), 2);
    }

    #[test]
    fn test_frame_requires_index() {
        let frame = DataFrame::empty();
        assert!(TelemetryFrame::new(frame).is_err());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
