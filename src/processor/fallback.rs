//! Multi-provider fallback retrieval for one station

use super::pool::ProviderPool;
use crate::error::{Result, SeismoError};
use crate::fdsn::{WaveformRequest, WaveformSource};
use crate::models::WaveformCollection;
use tracing::{info, warn};

/// Data obtained for one station and where it came from
#[derive(Debug)]
pub struct Retrieval {
    pub provider: String,
    pub data: WaveformCollection,
    /// Providers queried, the winning one included
    pub attempts: usize,
}

/// Try each provider of `pool` in order until one returns data.
///
/// Providers after the first success are never queried. When every
/// provider fails, the error of the last one is reported.
pub async fn fetch_with_fallback<S: WaveformSource>(
    pool: &ProviderPool<S>,
    request: &WaveformRequest,
) -> Result<Retrieval> {
    let station = request.station_label();
    if pool.is_empty() {
        return Err(SeismoError::NoProviderAvailable { station });
    }

    let mut last_error = None;
    let mut attempts = 0;
    for client in pool.iter() {
        attempts += 1;
        match client.get_waveforms(request).await {
            Ok(data) if !data.is_empty() => {
                info!(
                    "Downloaded {} from {} ({} traces)",
                    station,
                    client.name(),
                    data.len()
                );
                return Ok(Retrieval {
                    provider: client.name().to_string(),
                    data,
                    attempts,
                });
            }
            Ok(_) => {
                warn!("{} returned no traces for {}", client.name(), station);
                last_error = Some(SeismoError::NoData {
                    provider: client.name().to_string(),
                    station: station.clone(),
                });
            }
            Err(e) => {
                warn!("{} failed for {}: {}", client.name(), station, e);
                last_error = Some(e);
            }
        }
    }

    let source = last_error.unwrap_or(SeismoError::NoProviderAvailable {
        station: station.clone(),
    });
    Err(SeismoError::RetrievalFailure {
        station,
        attempts,
        source: Box::new(source),
    })
}
