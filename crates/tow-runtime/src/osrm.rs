//! OSRM Routing Provider
//!
//! Driving distance from an OSRM-compatible `route/v1` service. OSRM reports
//! meters; results are converted with `Miles::from_meters`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use tow_core::{Coordinate, Miles, Result, RoutingProvider, TowError};

/// OSRM provider configuration
#[derive(Clone, Debug)]
pub struct OsrmConfig {
    /// Base URL, without a trailing slash
    pub base_url: String,

    /// Routing profile (`driving` for tow trucks)
    pub profile: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".into(),
            profile: "driving".into(),
            timeout_secs: 10,
        }
    }
}

impl OsrmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OSRM_URL").unwrap_or(defaults.base_url),
            profile: std::env::var("OSRM_PROFILE").unwrap_or(defaults.profile),
            timeout_secs: std::env::var("OSRM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// Meters
    distance: f64,
}

/// OSRM router
pub struct OsrmRouter {
    client: reqwest::Client,
    config: OsrmConfig,
}

impl OsrmRouter {
    pub fn from_config(config: OsrmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TowError::RoutingFailed(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(OsrmConfig::from_env())
    }

    fn route_url(&self, from: Coordinate, to: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.config.base_url,
            self.config.profile,
            from.longitude,
            from.latitude,
            to.longitude,
            to.latitude
        )
    }
}

/// Distance of the first route
fn route_distance(response: RouteResponse) -> Result<Miles> {
    if response.code != "Ok" {
        return Err(TowError::RoutingFailed(format!(
            "{}: {}",
            response.code,
            response.message.unwrap_or_default()
        )));
    }

    let meters = response
        .routes
        .first()
        .map(|r| r.distance)
        .ok_or_else(|| TowError::RoutingFailed("no route between coordinates".into()))?;

    Miles::from_meters(meters)
        .ok_or_else(|| TowError::RoutingFailed(format!("invalid route distance {meters}")))
}

#[async_trait]
impl RoutingProvider for OsrmRouter {
    async fn distance(&self, from: Coordinate, to: Coordinate) -> Result<Miles> {
        let response = self
            .client
            .get(self.route_url(from, to))
            .query(&[("overview", "false")])
            .send()
            .await
            .map_err(|e| TowError::RoutingFailed(e.to_string()))?;

        // OSRM answers 400 with a JSON body for unroutable pairs
        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| TowError::RoutingFailed(format!("unreadable response: {e}")))?;

        let miles = route_distance(body)?;
        debug!(miles = miles.value(), "Routed");
        Ok(miles)
    }

    fn name(&self) -> &str {
        "OSRM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RouteResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_meters_become_miles() {
        let response = parse(
            r#"{"code": "Ok", "routes": [{"distance": 5148.8, "duration": 420.1}],
                "waypoints": []}"#,
        );
        let miles = route_distance(response).unwrap();
        assert!((miles.value() - 3.2).abs() < 1e-9);
        assert_eq!(miles.billable_units(), 4);
    }

    #[test]
    fn test_no_route() {
        let err = route_distance(parse(r#"{"code": "NoRoute", "message": "Impossible route"}"#))
            .unwrap_err();
        assert!(matches!(err, TowError::RoutingFailed(ref m) if m.contains("NoRoute")));

        let err = route_distance(parse(r#"{"code": "Ok", "routes": []}"#)).unwrap_err();
        assert!(matches!(err, TowError::RoutingFailed(_)));
    }

    #[test]
    fn test_route_url_is_lon_lat() {
        let router = OsrmRouter::from_config(OsrmConfig {
            base_url: "http://osrm.local".into(),
            ..Default::default()
        })
        .unwrap();
        let url = router.route_url(Coordinate::new(-74.0, 40.7), Coordinate::new(-73.9, 40.6));
        assert_eq!(url, "http://osrm.local/route/v1/driving/-74,40.7;-73.9,40.6");
    }
}
