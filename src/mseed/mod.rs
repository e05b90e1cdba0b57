//! miniSEED 2.4 codec
//!
//! Decodes the record streams returned by FDSN dataselect services into a
//! [`WaveformCollection`](crate::models::WaveformCollection) and encodes
//! processed traces back into big-endian FLOAT64 records for archival.

pub mod decode;
pub mod encode;

pub use decode::decode_records;
pub use encode::{encode_collection, write_mseed};

use crate::error::{Result, SeismoError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

/// SEED BTIME structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BTime {
    pub year: u16,
    pub day_of_year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Ten-thousandths of a second
    pub fract: u16,
}

impl BTime {
    pub fn to_datetime(self) -> Result<DateTime<Utc>> {
        let date = NaiveDate::from_yo_opt(self.year as i32, self.day_of_year as u32)
            .ok_or_else(|| {
                SeismoError::mseed(format!(
                    "invalid record date {}-{:03}",
                    self.year, self.day_of_year
                ))
            })?;
        // Leap seconds are folded into the following minute.
        let base = date
            .and_hms_opt(self.hour as u32, self.minute as u32, 0)
            .ok_or_else(|| {
                SeismoError::mseed(format!(
                    "invalid record time {:02}:{:02}",
                    self.hour, self.minute
                ))
            })?
            .and_utc();
        Ok(base
            + Duration::seconds(self.second as i64)
            + Duration::microseconds(self.fract as i64 * 100))
    }

    /// Split a timestamp into BTIME and the residual microseconds (0..100)
    pub fn from_datetime(time: DateTime<Utc>) -> (Self, i8) {
        let nanos = time.nanosecond().min(999_999_999);
        let micros = nanos / 1_000;
        let btime = BTime {
            year: time.year() as u16,
            day_of_year: time.ordinal() as u16,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
            fract: (micros / 100) as u16,
        };
        (btime, (micros % 100) as i8)
    }
}

/// Convert a SEED sample rate factor/multiplier pair to Hz
pub(crate) fn sample_rate_from_factors(factor: i16, multiplier: i16) -> f64 {
    let f = factor as f64;
    let m = multiplier as f64;
    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (fa, mu) if fa > 0 && mu > 0 => f * m,
        (fa, _) if fa > 0 => -f / m,
        (_, mu) if mu > 0 => -m / f,
        _ => 1.0 / (f * m),
    }
}

/// Find a factor/multiplier pair representing `rate` exactly enough
pub(crate) fn factors_from_sample_rate(rate: f64) -> Result<(i16, i16)> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(SeismoError::mseed(format!("invalid sampling rate {}", rate)));
    }
    let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(1.0);

    if rate >= 1.0 && close(rate, rate.round()) && rate.round() <= i16::MAX as f64 {
        return Ok((rate.round() as i16, 1));
    }
    let period = 1.0 / rate;
    if rate < 1.0 && close(period, period.round()) && period.round() <= i16::MAX as f64 {
        return Ok((-(period.round() as i16), 1));
    }
    for divisor in [10.0, 100.0, 1_000.0, 10_000.0] {
        let scaled = rate * divisor;
        if close(scaled, scaled.round()) && scaled.round() <= i16::MAX as f64 {
            return Ok((scaled.round() as i16, -(divisor as i16)));
        }
    }
    Err(SeismoError::mseed(format!(
        "sampling rate {} cannot be represented in a SEED header",
        rate
    )))
}
