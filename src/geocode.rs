//! Geocoding client for the backend maps proxy.
//!
//! Resolves a place name to coordinates via
//! `GET {base}/api/maps/geocode?address=<name>`. Every client owns its own
//! rate limiter (minimum spacing between outbound requests) and an
//! injected [`LocationCache`], so independent sessions never share timing
//! state and tests can swap the storage layer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::{cache_key, LocationCache};
use crate::{EngineConfig, Location, ZeroResultsPolicy};

/// Geocoder-specific error types
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Geocoding proxy returned HTTP {0}")]
    ProxyStatus(u16),

    #[error("Malformed geocoding response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Geocoding proxy returned {status}: {message}")]
    ApiError { status: String, message: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Enforces a minimum spacing between outbound geocoding requests.
///
/// Timing state lives inside the limiter value, not in module globals, so
/// each client (and each test) gets an independent window.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    /// Wait out the remainder of the spacing window without claiming it.
    /// Cache hits pass through here, so a lookup scheduled right after a
    /// network call may still pay the delay, but it never pushes the
    /// window forward.
    pub async fn wait(&self) {
        let last = *self.last_request.lock().await;
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
    }

    /// Claim the window for a request about to be issued: waits out any
    /// remaining delay, then advances the timestamp before the call is
    /// made rather than after, so consecutive requests are spaced
    /// call-start to call-start regardless of call latency. The lock is
    /// held across the sleep so concurrent callers cannot both read a
    /// stale timestamp.
    pub async fn mark_request_start(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Response envelope from the geocoding proxy (Google Geocoding shape).
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Client for the backend geocoding proxy.
pub struct GeocodeClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    cache: Arc<dyn LocationCache>,
    limiter: RateLimiter,
    on_zero_results: ZeroResultsPolicy,
}

impl GeocodeClient {
    /// Create a new geocoding client from engine configuration and an
    /// injected cache.
    pub fn new(
        config: &EngineConfig,
        cache: Arc<dyn LocationCache>,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent("trip-pins/0.1.0")
            .build()?;

        // The base URL must end in exactly one slash, otherwise join()
        // replaces the last path segment instead of appending.
        let normalized = format!("{}/", config.base_url.trim_end_matches('/'));
        let base = Url::parse(&normalized).map_err(|e| {
            GeocodeError::ConfigError(format!(
                "Invalid proxy base URL '{}': {}",
                config.base_url, e
            ))
        })?;
        let endpoint = base.join("api/maps/geocode").map_err(|e| {
            GeocodeError::ConfigError(format!("Invalid geocode endpoint: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            cache,
            limiter: RateLimiter::new(config.min_request_delay),
            on_zero_results: config.on_zero_results,
        })
    }

    /// Resolve a place name to a [`Location`].
    ///
    /// Returns `Ok(Some)` on success (or a mock placeholder under the
    /// [`ZeroResultsPolicy::Mock`] policy), `Ok(None)` when the provider
    /// legitimately finds nothing and the policy is `Drop`, and `Err` on
    /// transport or provider failures. At most one network request is made
    /// per call; a cache hit makes none.
    pub async fn geocode(&self, name: &str) -> Result<Option<Location>, GeocodeError> {
        self.limiter.wait().await;

        let key = cache_key(name);
        if let Some(raw) = self.cache.get(&key) {
            match serde_json::from_str::<Location>(&raw) {
                Ok(location) => {
                    debug!(name = name, "Geocode cache hit");
                    return Ok(Some(location));
                }
                Err(e) => {
                    // Corrupt entry reads as a miss; the network result
                    // overwrites it below
                    warn!(name = name, error = %e, "Discarding unparsable cache entry");
                }
            }
        }

        self.limiter.mark_request_start().await;

        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("address", name)]);
        if let Some(ref api_key) = self.api_key {
            request = request.query(&[("key", api_key.as_str())]);
        }

        let start_time = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        info!(
            name = name,
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Geocoding request completed"
        );

        if !status.is_success() {
            error!(name = name, status = %status, "Geocoding request failed");
            return Err(GeocodeError::ProxyStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: GeocodeResponse = serde_json::from_str(&body)?;

        match parsed.status.as_str() {
            "OK" => {
                let Some(first) = parsed.results.into_iter().next() else {
                    return Err(GeocodeError::ApiError {
                        status: "OK".to_string(),
                        message: "Status OK with empty results".to_string(),
                    });
                };
                let location = Location::resolved(
                    name,
                    first.geometry.location.lat,
                    first.geometry.location.lng,
                    first.formatted_address,
                    first.place_id,
                );
                if let Ok(json) = serde_json::to_string(&location) {
                    self.cache.set(&key, json);
                }
                debug!(
                    name = name,
                    lat = location.lat,
                    lng = location.lng,
                    "Geocoding succeeded"
                );
                Ok(Some(location))
            }
            "ZERO_RESULTS" => {
                // A legitimate negative outcome, not an error
                info!(name = name, "No geocoding results");
                match self.on_zero_results {
                    ZeroResultsPolicy::Drop => Ok(None),
                    ZeroResultsPolicy::Mock => Ok(Some(Location::mock(
                        name,
                        format!("Unable to geocode: {}", name),
                    ))),
                }
            }
            other => Err(GeocodeError::ApiError {
                status: other.to_string(),
                message: parsed
                    .error_message
                    .unwrap_or_else(|| "Geocoding failed".to_string()),
            }),
        }
    }
}
