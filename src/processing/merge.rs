//! Joining segments of the same channel into one continuous trace
//!
//! Segments are laid out on the sample grid of the earliest one. Where
//! segments overlap, the segment starting later overwrites the earlier
//! samples; gaps are filled by linear interpolation between the samples
//! bounding them.

use crate::error::{Result, SeismoError};
use crate::models::Trace;

fn rates_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs())
}

/// Merge segments sharing one trace id.
///
/// The returned trace keeps the id, unit, provider and status of the
/// earliest segment.
pub fn merge_segments(segments: &[Trace]) -> Result<Trace> {
    let Some(first) = segments.first() else {
        return Err(SeismoError::post_processing("merge", "no segments to merge"));
    };
    if segments.len() == 1 {
        return Ok(first.clone());
    }

    let rate = first.sampling_rate;
    if let Some(other) = segments
        .iter()
        .find(|s| s.id != first.id || !rates_match(s.sampling_rate, rate))
    {
        return Err(SeismoError::post_processing(
            "merge",
            format!(
                "cannot merge {} ({} Hz) with {} ({} Hz)",
                first.id, rate, other.id, other.sampling_rate
            ),
        ));
    }

    let mut ordered: Vec<&Trace> = segments.iter().filter(|s| !s.is_empty()).collect();
    ordered.sort_by_key(|s| s.start);
    let Some(earliest) = ordered.first().copied() else {
        return Ok(first.clone());
    };
    let origin = earliest.start;

    let offset_of = |segment: &Trace| -> usize {
        let seconds = (segment.start - origin)
            .num_nanoseconds()
            .map_or(0.0, |ns| ns as f64 / 1e9);
        (seconds * rate).round().max(0.0) as usize
    };

    let total = ordered
        .iter()
        .map(|s| offset_of(s) + s.len())
        .max()
        .unwrap_or(0);
    let mut samples: Vec<Option<f64>> = vec![None; total];
    for segment in &ordered {
        let offset = offset_of(segment);
        for (i, value) in segment.data.iter().enumerate() {
            samples[offset + i] = Some(*value);
        }
    }

    let mut merged = earliest.clone();
    merged.start = origin;
    merged.data = fill_gaps(&samples);
    Ok(merged)
}

/// Linear interpolation across missing samples; leading or trailing gaps
/// take the nearest known value
fn fill_gaps(samples: &[Option<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut previous: Option<(usize, f64)> = None;

    let mut i = 0;
    while i < samples.len() {
        match samples[i] {
            Some(value) => {
                out.push(value);
                previous = Some((i, value));
                i += 1;
            }
            None => {
                let next = samples[i..]
                    .iter()
                    .position(Option::is_some)
                    .map(|p| (i + p, samples[i + p].unwrap_or_default()));
                let gap_end = next.map_or(samples.len(), |(j, _)| j);
                for k in i..gap_end {
                    let value = match (previous, next) {
                        (Some((a, va)), Some((b, vb))) => {
                            va + (vb - va) * (k - a) as f64 / (b - a) as f64
                        }
                        (Some((_, va)), None) => va,
                        (None, Some((_, vb))) => vb,
                        (None, None) => 0.0,
                    };
                    out.push(value);
                }
                i = gap_end;
            }
        }
    }
    out
}
