//! Station discovery through the EIDA routing service
//!
//! The router is asked which data centres serve station metadata for the
//! requested channels and window (`format=post`). Each data centre is then
//! queried with the geographic constraint at response level, and the
//! inventories are merged.

use super::{ChannelPattern, StationLocator, StationQuery, stationxml::parse_station_xml};
use crate::constants::FDSN_TIME_FORMAT;
use crate::error::{Result, SeismoError};
use crate::models::Inventory;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extract the endpoint URLs from a routing response in `post` format
pub fn parse_post_routes(body: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for line in body.lines().map(str::trim) {
        if (line.starts_with("http://") || line.starts_with("https://"))
            && !urls.iter().any(|u| u == line)
        {
            urls.push(line.to_string());
        }
    }
    urls
}

/// [`StationLocator`] backed by the EIDA routing service
#[derive(Debug, Clone)]
pub struct EidaRoutingLocator {
    http: Client,
    routing_url: String,
}

impl EidaRoutingLocator {
    pub fn new(routing_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SeismoError::StationDiscovery {
                reason: format!("HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            routing_url: routing_url.into(),
        })
    }

    async fn routes(&self, query: &StationQuery) -> Result<Vec<String>> {
        let start = query.start.format(FDSN_TIME_FORMAT).to_string();
        let end = query.end.format(FDSN_TIME_FORMAT).to_string();
        let response = self
            .http
            .get(&self.routing_url)
            .query(&[
                ("service", "station"),
                ("format", "post"),
                ("channel", query.channels.as_str()),
                ("starttime", start.as_str()),
                ("endtime", end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SeismoError::StationDiscovery {
                reason: format!("routing request failed: {}", e),
            })?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if !status.is_success() => Err(SeismoError::StationDiscovery {
                reason: format!("routing service answered {}", status),
            }),
            _ => {
                let body = response.text().await?;
                Ok(parse_post_routes(&body))
            }
        }
    }

    async fn query_station_endpoint(
        &self,
        url: &str,
        query: &StationQuery,
    ) -> Result<Option<Inventory>> {
        let start = query.start.format(FDSN_TIME_FORMAT).to_string();
        let end = query.end.format(FDSN_TIME_FORMAT).to_string();
        let latitude = query.latitude.to_string();
        let longitude = query.longitude.to_string();
        let radius = query.radius_deg.to_string();

        let response = self
            .http
            .get(url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("maxradius", radius.as_str()),
                ("channel", query.channels.as_str()),
                ("starttime", start.as_str()),
                ("endtime", end.as_str()),
                ("level", "response"),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(SeismoError::StationDiscovery {
                reason: format!("{} answered {}", url, status),
            }),
            _ => {
                let body = response.text().await?;
                parse_station_xml(&body).map(Some)
            }
        }
    }
}

impl StationLocator for EidaRoutingLocator {
    async fn locate(&self, query: &StationQuery) -> Result<Inventory> {
        let pattern = ChannelPattern::new(&query.channels)?;
        let routes = self.routes(query).await?;
        debug!("Routing service returned {} station endpoints", routes.len());

        let mut inventory = Inventory::default();
        for url in &routes {
            match self.query_station_endpoint(url, query).await {
                Ok(Some(found)) => {
                    debug!("{}: {} stations", url, found.station_count());
                    inventory.merge(found);
                }
                Ok(None) => debug!("{}: no matching stations", url),
                Err(e) => warn!("Station query to {} failed: {}", url, e),
            }
        }

        inventory.retain_channels(|code| pattern.matches(code));
        info!(
            "Found {} stations ({} channels) within {}° of ({}, {})",
            inventory.station_count(),
            inventory.channel_count(),
            query.radius_deg,
            query.latitude,
            query.longitude
        );
        Ok(inventory)
    }
}
