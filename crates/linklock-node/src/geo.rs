//! Geolocation lookup with graceful degradation.
//!
//! Maps the visitor's network address to a country code via an external
//! service. Lookup failure must never block a visit: callers substitute
//! the configured fallback country instead.

use crate::config::GeoConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country: Option<String>,
}

pub struct HttpGeoLocator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGeoLocator {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build geolocation HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn lookup(&self, ip: &str) -> Result<String> {
        let url = format!("{}/{}/json/", self.endpoint, ip);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Geolocation request failed")?
            .error_for_status()
            .context("Geolocation service returned an error status")?;

        let body: GeoResponse = response
            .json()
            .await
            .context("Failed to decode geolocation response")?;
        body.country
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("Geolocation response carried no country"))
    }
}

/// Fixed-answer locator for tests and offline deployments. `None` makes
/// every lookup fail, exercising the fallback path.
pub struct StaticGeoLocator {
    country: Option<String>,
}

impl StaticGeoLocator {
    pub fn new(country: Option<&str>) -> Self {
        Self {
            country: country.map(str::to_string),
        }
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn lookup(&self, _ip: &str) -> Result<String> {
        self.country
            .clone()
            .ok_or_else(|| anyhow!("Geolocation unavailable"))
    }
}
