//! Nominatim Geocoding Provider
//!
//! Implementation of `GeocodingProvider` for any Nominatim-compatible search
//! API (OpenStreetMap's public instance or a self-hosted one).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use tow_core::{Coordinate, GeocodingProvider, Result, TowError};

/// Default suggestion bias: lower Manhattan
pub const DEFAULT_BIAS: Coordinate = Coordinate::new(-74.0060, 40.7128);

/// Half-width in degrees of the box suggestions are biased toward
const BIAS_SPAN_DEGREES: f64 = 0.5;

/// Nominatim provider configuration
#[derive(Clone, Debug)]
pub struct NominatimConfig {
    /// Base URL, without a trailing slash
    pub base_url: String,

    /// Sent as `User-Agent`; the public instance requires one that
    /// identifies the application
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Where suggestions are biased toward when the caller gives no position
    pub bias: Coordinate,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".into(),
            user_agent: concat!("tow-dispatch/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 10,
            bias: DEFAULT_BIAS,
        }
    }
}

impl NominatimConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("NOMINATIM_URL").unwrap_or(defaults.base_url),
            user_agent: std::env::var("NOMINATIM_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout_secs: std::env::var("NOMINATIM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            bias: defaults.bias,
        }
    }
}

/// One search hit; Nominatim encodes coordinates as strings
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    display_name: String,
}

impl Place {
    fn coordinate(&self) -> Option<Coordinate> {
        let latitude: f64 = self.lat.parse().ok()?;
        let longitude: f64 = self.lon.parse().ok()?;
        (latitude.is_finite() && longitude.is_finite())
            .then(|| Coordinate::new(longitude, latitude))
    }
}

/// Nominatim geocoder
pub struct NominatimGeocoder {
    client: reqwest::Client,
    config: NominatimConfig,
}

impl NominatimGeocoder {
    pub fn from_config(config: NominatimConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TowError::GeocodingFailed(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(NominatimConfig::from_env())
    }

    async fn search(&self, query: &[(&str, String)]) -> Result<Vec<Place>> {
        let url = format!("{}/search", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("format", "jsonv2")])
            .query(query)
            .send()
            .await
            .map_err(|e| TowError::GeocodingFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TowError::GeocodingFailed(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TowError::GeocodingFailed(format!("unreadable response: {e}")))
    }
}

/// First usable coordinate of a result list
fn first_coordinate(places: &[Place], address: &str) -> Result<Coordinate> {
    places
        .iter()
        .find_map(Place::coordinate)
        .ok_or_else(|| TowError::GeocodingFailed(format!("no match for '{address}'")))
}

/// `viewbox` parameter centered on `bias`
fn viewbox(bias: Coordinate) -> String {
    format!(
        "{},{},{},{}",
        bias.longitude - BIAS_SPAN_DEGREES,
        bias.latitude + BIAS_SPAN_DEGREES,
        bias.longitude + BIAS_SPAN_DEGREES,
        bias.latitude - BIAS_SPAN_DEGREES,
    )
}

#[async_trait]
impl GeocodingProvider for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinate> {
        let places = self
            .search(&[("q", address.to_string()), ("limit", "1".to_string())])
            .await?;
        let found = first_coordinate(&places, address)?;
        debug!(address, lon = found.longitude, lat = found.latitude, "Geocoded address");
        Ok(found)
    }

    async fn suggest(
        &self,
        query: &str,
        bias: Option<Coordinate>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let bias = bias.unwrap_or(self.config.bias);
        let places = self
            .search(&[
                ("q", query.to_string()),
                ("limit", limit.to_string()),
                ("viewbox", viewbox(bias)),
                ("bounded", "0".to_string()),
            ])
            .await?;

        Ok(places
            .into_iter()
            .map(|p| p.display_name)
            .take(limit)
            .collect())
    }

    fn name(&self) -> &str {
        "Nominatim"
    }
}
