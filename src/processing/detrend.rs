use crate::error::{Result, SeismoError};

/// Remove the least-squares linear trend from `data` in place
pub fn detrend_linear(data: &mut [f64]) -> Result<()> {
    if data.is_empty() {
        return Err(SeismoError::post_processing("detrend", "trace has no samples"));
    }
    if let Some(index) = data.iter().position(|v| !v.is_finite()) {
        return Err(SeismoError::post_processing(
            "detrend",
            format!("non-finite sample at index {}", index),
        ));
    }
    if data.len() == 1 {
        data[0] = 0.0;
        return Ok(());
    }

    let n = data.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = data.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in data.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    for (i, y) in data.iter_mut().enumerate() {
        *y -= intercept + slope * i as f64;
    }
    Ok(())
}
