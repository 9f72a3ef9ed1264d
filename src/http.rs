//! HTTP collaborators: map matching, elevation lookup and current weather.
//!
//! - [`MapboxMatcher`]: Mapbox Directions, falling back to the Map Matching API
//! - [`OpenElevationClient`]: Open-Elevation batch lookup
//! - [`OpenWeatherClient`]: OpenWeatherMap current conditions
//!
//! Every client owns an [`HttpTransport`]: a pooled `reqwest::Client` plus a
//! dispatch rate limiter that spaces out request starts and backs off on 429.
//! Base URLs are configurable so the clients can point at self-hosted services or
//! test servers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{OptionExt, PlannerError, Result};
use crate::generator::TrainingGoal;
use crate::providers::{
    ElevationProvider, ElevationSample, MapMatcher, MatchedRoute, WeatherConditions,
    WeatherProvider,
};
use crate::GpsPoint;

const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 100;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Confidence assigned to a route produced by the directions engine.
pub const DIRECTIONS_CONFIDENCE: f64 = 0.9;

/// Mapbox limits directions and matching requests to this many coordinates.
pub const MAPBOX_MAX_WAYPOINTS: usize = 25;

/// Open-Elevation locations per lookup.
pub const DEFAULT_MAX_ELEVATION_LOCATIONS: usize = 100;

impl From<reqwest::Error> for PlannerError {
    fn from(e: reqwest::Error) -> Self {
        PlannerError::Http {
            message: e.to_string(),
            status_code: e.status().map(|s| s.as_u16()),
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Spaces out when requests start. Each caller reserves the next free slot.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    async fn wait_for_dispatch_slot(&self) {
        let wait = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();
            let dispatch_at = (*next).max(now);
            *next = dispatch_at + self.interval;
            dispatch_at - now
        };

        // Sleep outside the lock
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // 500ms, 1s, 2s, 4s max
        let backoff = Duration::from_millis(250 * (1 << count.min(4)));
        warn!("[Dispatch] 429 #{} in a row, backing off {:?}", count, backoff);
        backoff
    }
}

/// Pooled HTTP client with request spacing.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    limiter: Arc<DispatchRateLimiter>,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_dispatch_interval(Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS))
    }

    pub fn with_dispatch_interval(interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PlannerError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            limiter: Arc::new(DispatchRateLimiter::new(interval)),
        })
    }

    /// Send a request built by `build`, retrying on 429, and decode a JSON body.
    async fn send_json<T, F>(&self, provider: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        loop {
            self.limiter.wait_for_dispatch_slot().await;
            let started = Instant::now();
            let response = build(&self.client).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(PlannerError::Http {
                        message: format!("{}: max retries exceeded", provider),
                        status_code: Some(status.as_u16()),
                    });
                }
                let wait = self.limiter.record_429();
                tokio::time::sleep(wait).await;
                continue;
            }
            self.limiter.record_success();

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PlannerError::Http {
                    message: format!("{}: {}", provider, body.chars().take(200).collect::<String>()),
                    status_code: Some(status.as_u16()),
                });
            }

            let parsed = response.json::<T>().await.map_err(|e| PlannerError::Provider {
                provider: provider.to_string(),
                message: format!("invalid response body: {}", e),
            })?;
            debug!("[{}] Response in {:?}", provider, started.elapsed());
            return Ok(parsed);
        }
    }
}

/// Keep at most `max` points, evenly spaced, always including both ends.
fn downsample(points: &[GpsPoint], max: usize) -> Vec<GpsPoint> {
    if points.len() <= max || max < 2 {
        return points.to_vec();
    }
    let step = (points.len() - 1) as f64 / (max - 1) as f64;
    (0..max)
        .map(|i| points[((i as f64 * step).round() as usize).min(points.len() - 1)])
        .collect()
}

// =============================================================================
// Mapbox
// =============================================================================

#[derive(Debug, Deserialize)]
struct GeoJsonLine {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: GeoJsonLine,
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct MatchingResponse {
    code: String,
    #[serde(default)]
    matchings: Vec<Matching>,
}

#[derive(Debug, Deserialize)]
struct Matching {
    geometry: GeoJsonLine,
    distance: f64,
    duration: f64,
    confidence: f64,
}

/// Mapbox directions with a map-matching fallback.
///
/// Directions produce a routable path through the waypoints and are trusted at
/// [`DIRECTIONS_CONFIDENCE`]. If directions fail or return no route, the Map
/// Matching API is tried and its own confidence is reported.
#[derive(Clone)]
pub struct MapboxMatcher {
    transport: HttpTransport,
    access_token: String,
    base_url: String,
}

impl MapboxMatcher {
    pub fn new(access_token: &str) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new()?,
            access_token: access_token.to_string(),
            base_url: "https://api.mapbox.com".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    fn coordinate_path(waypoints: &[GpsPoint]) -> String {
        waypoints
            .iter()
            .map(|p| format!("{:.6},{:.6}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";")
    }

    async fn directions(&self, path: &str, profile: &str) -> Result<MatchedRoute> {
        let url = format!("{}/directions/v5/mapbox/{}/{}", self.base_url, profile, path);
        let response: DirectionsResponse = self
            .transport
            .send_json("Mapbox", |client| {
                client.get(&url).query(&[
                    ("geometries", "geojson"),
                    ("overview", "full"),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await?;

        let route = response
            .routes
            .into_iter()
            .next()
            .filter(|_| response.code == "Ok")
            .ok_or_provider("mapbox_directions", &format!("no route (code {})", response.code))?;

        Ok(MatchedRoute {
            coordinates: route.geometry.coordinates.into_iter().map(GpsPoint::from_lon_lat).collect(),
            distance_m: route.distance,
            duration_s: route.duration,
            confidence: DIRECTIONS_CONFIDENCE,
        })
    }

    async fn map_matching(&self, path: &str, profile: &str) -> Result<MatchedRoute> {
        let url = format!("{}/matching/v5/mapbox/{}/{}", self.base_url, profile, path);
        let response: MatchingResponse = self
            .transport
            .send_json("Mapbox", |client| {
                client.get(&url).query(&[
                    ("geometries", "geojson"),
                    ("overview", "full"),
                    ("tidy", "true"),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await?;

        let matching = response
            .matchings
            .into_iter()
            .next()
            .filter(|_| response.code == "Ok")
            .ok_or_provider("mapbox_matching", &format!("no matching (code {})", response.code))?;

        Ok(MatchedRoute {
            coordinates: matching.geometry.coordinates.into_iter().map(GpsPoint::from_lon_lat).collect(),
            distance_m: matching.distance,
            duration_s: matching.duration,
            confidence: matching.confidence.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl MapMatcher for MapboxMatcher {
    async fn match_route(&self, waypoints: &[GpsPoint], profile: &str) -> Result<MatchedRoute> {
        if waypoints.len() < 2 {
            return Err(PlannerError::InsufficientPoints {
                ride_id: "waypoints".to_string(),
                point_count: waypoints.len(),
                minimum_required: 2,
            });
        }
        let path = Self::coordinate_path(&downsample(waypoints, MAPBOX_MAX_WAYPOINTS));

        match self.directions(&path, profile).await {
            Ok(route) if !route.coordinates.is_empty() => Ok(route),
            Ok(_) => {
                warn!("[Mapbox] Directions returned an empty geometry, trying map matching");
                self.map_matching(&path, profile).await
            }
            Err(e) => {
                warn!("[Mapbox] Directions failed ({}), trying map matching", e);
                self.map_matching(&path, profile).await
            }
        }
    }
}

// =============================================================================
// Open-Elevation
// =============================================================================

#[derive(Debug, Serialize)]
struct LookupLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    locations: Vec<LookupLocation>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    latitude: f64,
    longitude: f64,
    elevation: f64,
}

/// Open-Elevation batch lookup. Long polylines are downsampled before lookup.
#[derive(Clone)]
pub struct OpenElevationClient {
    transport: HttpTransport,
    base_url: String,
    max_locations: usize,
}

impl OpenElevationClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new()?,
            base_url: "https://api.open-elevation.com".to_string(),
            max_locations: DEFAULT_MAX_ELEVATION_LOCATIONS,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_max_locations(mut self, max_locations: usize) -> Self {
        self.max_locations = max_locations.max(2);
        self
    }
}

#[async_trait]
impl ElevationProvider for OpenElevationClient {
    async fn sample(&self, polyline: &[GpsPoint]) -> Result<Vec<ElevationSample>> {
        if polyline.is_empty() {
            return Ok(Vec::new());
        }

        let body = LookupRequest {
            locations: downsample(polyline, self.max_locations)
                .into_iter()
                .map(|p| LookupLocation {
                    latitude: p.latitude,
                    longitude: p.longitude,
                })
                .collect(),
        };
        let url = format!("{}/api/v1/lookup", self.base_url);
        let response: LookupResponse = self
            .transport
            .send_json("OpenElevation", |client| client.post(&url).json(&body))
            .await?;

        info!("[OpenElevation] {} samples", response.results.len());
        Ok(response
            .results
            .into_iter()
            .map(|r| ElevationSample {
                coordinate: GpsPoint::new(r.latitude, r.longitude),
                elevation_m: r.elevation,
            })
            .collect())
    }
}

// =============================================================================
// OpenWeatherMap
// =============================================================================

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
    #[serde(default)]
    deg: f64,
}

/// OpenWeatherMap current conditions, rated for the training goal.
#[derive(Clone)]
pub struct OpenWeatherClient {
    transport: HttpTransport,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new()?,
            api_key: api_key.to_string(),
            base_url: "https://api.openweathermap.org".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn conditions(&self, location: GpsPoint, goal: TrainingGoal) -> Result<WeatherConditions> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let lat = location.latitude.to_string();
        let lon = location.longitude.to_string();
        let response: CurrentWeather = self
            .transport
            .send_json("OpenWeather", |client| {
                client.get(&url).query(&[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("units", "metric"),
                    ("appid", self.api_key.as_str()),
                ])
            })
            .await?;

        Ok(WeatherConditions::rated(response.wind.speed, response.wind.deg, goal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_keeps_ends() {
        let points: Vec<GpsPoint> = (0..101).map(|i| GpsPoint::new(i as f64 * 0.001, 0.0)).collect();
        let reduced = downsample(&points, 25);
        assert_eq!(reduced.len(), 25);
        assert_eq!(reduced[0], points[0]);
        assert_eq!(reduced[24], points[100]);
        assert_eq!(downsample(&points[..10], 25).len(), 10);
    }

    #[test]
    fn test_coordinate_path_is_lon_lat() {
        let path = MapboxMatcher::coordinate_path(&[GpsPoint::new(46.5, 7.25), GpsPoint::new(46.6, 7.3)]);
        assert_eq!(path, "7.250000,46.500000;7.300000,46.600000");
    }
}
