//! Symmetric Hann tapers applied to both ends of a trace

use crate::error::{Result, SeismoError};

fn apply_hann_sides(data: &mut [f64], side: usize) {
    let npts = data.len();
    let side = side.min(npts / 2);
    if side == 0 {
        return;
    }
    for i in 0..side {
        let weight = 0.5 * (1.0 - (std::f64::consts::PI * i as f64 / side as f64).cos());
        data[i] *= weight;
        data[npts - 1 - i] *= weight;
    }
}

/// Taper `max_percentage` of the samples at each end with a Hann window.
///
/// `max_percentage` must be in (0, 0.5].
pub fn hann_taper(data: &mut [f64], max_percentage: f64) -> Result<()> {
    if !(max_percentage > 0.0 && max_percentage <= 0.5) {
        return Err(SeismoError::post_processing(
            "taper",
            format!("max_percentage {} outside (0, 0.5]", max_percentage),
        ));
    }
    let side = (max_percentage * data.len() as f64).floor() as usize;
    apply_hann_sides(data, side);
    Ok(())
}

/// Cosine taper over `fraction` of the trace in total, half at each end
pub fn cosine_taper(data: &mut [f64], fraction: f64) {
    let side = (fraction.clamp(0.0, 1.0) * data.len() as f64 / 2.0).floor() as usize;
    apply_hann_sides(data, side);
}
