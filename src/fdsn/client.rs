//! FDSN dataselect client
//!
//! Waveforms are requested per station with `location=*`; the response is a
//! miniSEED stream. HTTP 204 and 404 are how FDSN services say "no data".

use super::{ProviderConnector, WaveformRequest, WaveformSource};
use crate::constants::{
    DATASELECT_QUERY_PATH, DATASELECT_VERSION_PATH, FDSN_TIME_FORMAT, provider_base_url,
};
use crate::error::{Result, SeismoError};
use crate::models::WaveformCollection;
use crate::mseed::decode_records;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("seismo-cern/", env!("CARGO_PKG_VERSION"));

/// Dataselect client bound to one provider
#[derive(Debug, Clone)]
pub struct FdsnClient {
    name: String,
    base_url: String,
    http: Client,
}

impl FdsnClient {
    /// Resolve `provider` (short name or base URL) and build the HTTP client
    pub fn new(provider: &str, timeout: Duration) -> Result<Self> {
        let base_url = provider_base_url(provider).ok_or_else(|| SeismoError::ProviderInit {
            provider: provider.to_string(),
            reason: "unknown provider name".to_string(),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SeismoError::ProviderInit {
                provider: provider.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: provider.to_string(),
            base_url,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the provider answers its dataselect version endpoint
    pub async fn probe(&self) -> Result<()> {
        let url = format!("{}{}", self.base_url, DATASELECT_VERSION_PATH);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.init_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(self.init_error(format!("{} answered {}", url, response.status())));
        }
        let version = response.text().await.unwrap_or_default();
        debug!("{} dataselect version {}", self.name, version.trim());
        Ok(())
    }

    fn init_error(&self, reason: String) -> SeismoError {
        SeismoError::ProviderInit {
            provider: self.name.clone(),
            reason,
        }
    }

    fn fetch_error(&self, request: &WaveformRequest, reason: String) -> SeismoError {
        SeismoError::Fetch {
            provider: self.name.clone(),
            station: request.station_label(),
            reason,
        }
    }

    fn no_data(&self, request: &WaveformRequest) -> SeismoError {
        SeismoError::NoData {
            provider: self.name.clone(),
            station: request.station_label(),
        }
    }
}

impl WaveformSource for FdsnClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_waveforms(&self, request: &WaveformRequest) -> Result<WaveformCollection> {
        let url = format!("{}{}", self.base_url, DATASELECT_QUERY_PATH);
        let start = request.start.format(FDSN_TIME_FORMAT).to_string();
        let end = request.end.format(FDSN_TIME_FORMAT).to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("network", request.network.as_str()),
                ("station", request.station.as_str()),
                ("location", request.location.as_str()),
                ("channel", request.channels.as_str()),
                ("starttime", start.as_str()),
                ("endtime", end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.fetch_error(request, e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Err(self.no_data(request)),
            status if !status.is_success() => {
                return Err(self.fetch_error(request, format!("HTTP {}", status)));
            }
            _ => {}
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.fetch_error(request, e.to_string()))?;
        let mut collection =
            decode_records(&bytes).map_err(|e| self.fetch_error(request, e.to_string()))?;
        if collection.is_empty() {
            return Err(self.no_data(request));
        }

        for trace in &mut collection.traces {
            trace.provider = Some(self.name.clone());
        }
        debug!(
            "{} returned {} traces for {}",
            self.name,
            collection.len(),
            request.station_label()
        );
        Ok(collection)
    }
}

/// Connects to FDSN providers by registry name, optionally probing them
#[derive(Debug, Clone, Copy)]
pub struct FdsnConnector {
    probe: bool,
}

impl FdsnConnector {
    pub fn new(probe: bool) -> Self {
        Self { probe }
    }
}

impl ProviderConnector for FdsnConnector {
    type Source = FdsnClient;

    async fn connect(&self, provider: &str, timeout: Duration) -> Result<FdsnClient> {
        let client = FdsnClient::new(provider, timeout)?;
        if self.probe {
            client.probe().await?;
        }
        Ok(client)
    }
}
