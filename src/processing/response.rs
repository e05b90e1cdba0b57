//! Instrument response evaluation and deconvolution
//!
//! The trace is demeaned and tapered, transformed with a zero-padded FFT,
//! divided by the channel response expressed in the requested output unit,
//! band-limited by a four-corner cosine pre-filter and transformed back.
//! Small response values are clamped to a water level below the response
//! maximum before inversion.

use crate::config::ProcessingConfig;
use crate::error::{Result, SeismoError};
use crate::models::{
    ChannelResponse, OutputUnit, PolesZeros, SampleUnit, StageTransfer, Trace, TransferFunction,
};
use crate::processing::taper::cosine_taper;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;
use tracing::warn;

fn stage_error(reason: impl Into<String>) -> SeismoError {
    SeismoError::post_processing("remove_response", reason)
}

/// Factor converting a response with input in `units` to one in SI metres
fn unit_scale(units: &str) -> f64 {
    let upper = units.trim().to_ascii_uppercase();
    if upper.starts_with("NM") {
        1e9
    } else if upper.starts_with("MM") {
        1e3
    } else if upper.starts_with("CM") {
        1e2
    } else {
        1.0
    }
}

fn poles_zeros_value(pz: &PolesZeros, frequency: f64) -> Complex64 {
    let s = match pz.function {
        TransferFunction::LaplaceRadians => Complex64::new(0.0, 2.0 * PI * frequency),
        TransferFunction::LaplaceHertz => Complex64::new(0.0, frequency),
        // Digital poles/zeros contribute their gain only
        TransferFunction::Digital => return Complex64::new(1.0, 0.0),
    };
    let numerator = pz
        .zeros
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, z| acc * (s - z));
    let denominator = pz
        .poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, p| acc * (s - p));
    numerator / denominator * pz.normalization_factor
}

/// Evaluate the response at non-negative `frequencies`, converted so that it
/// maps the requested `output` quantity to counts.
pub fn evaluate_response(
    response: &ChannelResponse,
    frequencies: &[f64],
    output: OutputUnit,
) -> Result<Vec<Complex64>> {
    let input_units = response
        .input_units()
        .ok_or_else(|| stage_error("response has no input units"))?;
    let input_order = SampleUnit::from_units_name(input_units)
        .and_then(|u| u.derivative_order())
        .ok_or_else(|| stage_error(format!("unsupported input units '{}'", input_units)))?;
    let output_order = output.sample_unit().derivative_order().unwrap_or(1);
    let power = input_order - output_order;
    let scale = unit_scale(input_units);

    let flat_gain = if response.stages.is_empty() {
        let sensitivity = response
            .sensitivity
            .as_ref()
            .ok_or_else(|| stage_error("response has neither stages nor sensitivity"))?;
        Some(sensitivity.value)
    } else {
        None
    };

    let values = frequencies
        .iter()
        .map(|&frequency| {
            let mut value = match flat_gain {
                Some(gain) => Complex64::new(gain, 0.0),
                None => response.stages.iter().fold(Complex64::new(1.0, 0.0), |acc, stage| {
                    let gain = stage.gain.map_or(1.0, |g| g.value);
                    match &stage.transfer {
                        StageTransfer::PolesZeros(pz) => acc * poles_zeros_value(pz, frequency) * gain,
                        StageTransfer::Coefficients | StageTransfer::Fir | StageTransfer::GainOnly => {
                            acc * gain
                        }
                    }
                }),
            };
            value *= scale;

            let iw = Complex64::new(0.0, 2.0 * PI * frequency);
            if power > 0 {
                value *= iw.powi(power);
            } else if power < 0 {
                value = if frequency == 0.0 {
                    Complex64::new(0.0, 0.0)
                } else {
                    value / iw.powi(-power)
                };
            }
            value
        })
        .collect();
    Ok(values)
}

/// Four-corner cosine band-pass weight at `frequency`
pub fn prefilter_weight(frequency: f64, corners: [f64; 4]) -> f64 {
    let [f1, f2, f3, f4] = corners;
    let f = frequency.abs();
    if f <= f1 || f >= f4 {
        0.0
    } else if f < f2 {
        0.5 * (1.0 - (PI * (f - f1) / (f2 - f1)).cos())
    } else if f <= f3 {
        1.0
    } else {
        0.5 * (1.0 + (PI * (f - f3) / (f4 - f3)).cos())
    }
}

/// Invert a spectrum with water-level regularisation
fn invert_with_water_level(spectrum: &mut [Complex64], water_level_db: Option<f64>) {
    if let Some(db) = water_level_db {
        let peak = spectrum.iter().map(|v| v.norm()).fold(0.0f64, f64::max);
        let level = peak * 10f64.powf(-db / 20.0);
        for value in spectrum.iter_mut() {
            let magnitude = value.norm();
            if magnitude > 0.0 && magnitude < level {
                *value *= level / magnitude;
            }
        }
    }
    for value in spectrum.iter_mut() {
        *value = if value.norm() > 0.0 {
            value.inv()
        } else {
            Complex64::new(0.0, 0.0)
        };
    }
}

/// Response removal settings
#[derive(Debug, Clone)]
pub struct ResponseRemoval {
    pub pre_filter: [f64; 4],
    pub output: OutputUnit,
    pub water_level_db: Option<f64>,
    pub taper_fraction: f64,
}

impl ResponseRemoval {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            pre_filter: config.pre_filter_corners,
            output: config.output_unit,
            water_level_db: config.water_level_db,
            taper_fraction: config.response_taper_fraction,
        }
    }

    /// Deconvolve `response` from `trace` in place
    pub fn apply(&self, trace: &mut Trace, response: &ChannelResponse) -> Result<()> {
        let npts = trace.len();
        if npts < 2 {
            return Err(stage_error(format!("{} has fewer than two samples", trace.id)));
        }
        if trace.data.iter().any(|v| !v.is_finite()) {
            return Err(stage_error(format!("{} contains non-finite samples", trace.id)));
        }
        if !(trace.sampling_rate.is_finite() && trace.sampling_rate > 0.0) {
            return Err(stage_error(format!(
                "{} has invalid sampling rate {}",
                trace.id, trace.sampling_rate
            )));
        }

        let nyquist = trace.sampling_rate / 2.0;
        if self.pre_filter[3] > nyquist {
            warn!(
                "{}: pre-filter corner {} Hz is above Nyquist ({} Hz)",
                trace.id, self.pre_filter[3], nyquist
            );
        }

        let mut data = trace.data.clone();
        let mean = data.iter().sum::<f64>() / npts as f64;
        data.iter_mut().for_each(|v| *v -= mean);
        cosine_taper(&mut data, self.taper_fraction);

        let nfft = (2 * npts).next_power_of_two();
        let mut buffer: Vec<Complex64> = data
            .iter()
            .map(|&v| Complex64::new(v, 0.0))
            .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
            .take(nfft)
            .collect();

        let half = nfft / 2;
        let frequencies: Vec<f64> = (0..=half)
            .map(|k| k as f64 * trace.sampling_rate / nfft as f64)
            .collect();
        let mut inverse = evaluate_response(response, &frequencies, self.output)?;
        invert_with_water_level(&mut inverse, self.water_level_db);
        for (value, frequency) in inverse.iter_mut().zip(&frequencies) {
            *value *= prefilter_weight(*frequency, self.pre_filter);
        }

        let mut planner = FftPlanner::<f64>::new();
        planner.plan_fft_forward(nfft).process(&mut buffer);
        for (k, value) in buffer.iter_mut().enumerate() {
            let factor = if k <= half {
                inverse[k]
            } else {
                inverse[nfft - k].conj()
            };
            *value *= factor;
        }
        planner.plan_fft_inverse(nfft).process(&mut buffer);

        let scale = 1.0 / nfft as f64;
        trace.data = buffer.iter().take(npts).map(|v| v.re * scale).collect();
        trace.unit = self.output.sample_unit();
        Ok(())
    }
}
