//! Ordered pool of provider clients

use crate::fdsn::{ProviderConnector, WaveformSource};
use std::time::Duration;
use tracing::{info, warn};

/// Provider clients in fallback order
#[derive(Debug, Clone)]
pub struct ProviderPool<S> {
    clients: Vec<S>,
}

impl<S: WaveformSource> ProviderPool<S> {
    /// Connect to every provider in order, skipping the ones that fail.
    ///
    /// An empty pool is returned as-is; it only becomes an error when a
    /// station is fetched from it.
    pub async fn build<C>(connector: &C, providers: &[String], timeout: Duration) -> Self
    where
        C: ProviderConnector<Source = S>,
    {
        let mut clients = Vec::with_capacity(providers.len());
        for provider in providers {
            match connector.connect(provider, timeout).await {
                Ok(client) => {
                    info!("Provider {} available", provider);
                    clients.push(client);
                }
                Err(e) => warn!("Skipping provider {}: {}", provider, e),
            }
        }
        Self { clients }
    }

    pub fn from_clients(clients: Vec<S>) -> Self {
        Self { clients }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.clients.iter()
    }
}
