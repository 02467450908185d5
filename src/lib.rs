//! # Trip Pins
//!
//! A location detection and resolution engine for travel chat assistants.
//! Given free-form conversation text, it extracts candidate place names,
//! resolves them to coordinates through a backend geocoding proxy (with
//! caching and rate limiting), scores each place for relevance to the
//! user's intent, and merges the results into a session-scoped store that
//! a map view can subscribe to.

pub mod cache;
pub mod extract;
pub mod geocode;
pub mod pipeline;
pub mod score;
pub mod store;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export main types for convenience
pub use cache::{LocationCache, MemoryCache};
pub use extract::{CandidateExtractor, ExtractError};
pub use geocode::{GeocodeClient, GeocodeError, RateLimiter};
pub use pipeline::DetectionPipeline;
pub use score::{relevance_score, TRAVEL_PREPOSITIONS, TRAVEL_VERBS};
pub use store::LocationStore;

#[cfg(feature = "disk-cache")]
pub use cache::SledCache;

/// Error types for the detection engine
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("extraction failed: {0}")]
    ExtractError(#[from] ExtractError),

    #[error("geocoding failed: {0}")]
    GeocodeError(#[from] GeocodeError),
}

/// Prominence tier for a detected location, derived from its relevance
/// score. Drives pin styling and priority on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationTier {
    Primary,
    Secondary,
    Reference,
}

impl LocationTier {
    /// Map a relevance score to its tier: >= 80 is primary, 60..80 is
    /// secondary, anything below is reference.
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            LocationTier::Primary
        } else if score >= 60 {
            LocationTier::Secondary
        } else {
            LocationTier::Reference
        }
    }
}

/// A single detected or user-selected place.
///
/// A resolved location carries both coordinates; a mock placeholder
/// (`is_mock = true`) carries neither and exists so the UI can show a
/// dimmed "not found" pin when geocoding fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub formatted_address: Option<String>,
    pub place_id: Option<String>,
    #[serde(rename = "type")]
    pub tier: LocationTier,
    pub relevance_score: u8,
    pub is_mock: bool,
    pub description: Option<String>,
}

impl Location {
    /// Build a resolved location from geocoding output.
    pub fn resolved(
        name: impl Into<String>,
        lat: f64,
        lng: f64,
        formatted_address: Option<String>,
        place_id: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            lat: Some(lat),
            lng: Some(lng),
            formatted_address,
            place_id,
            tier: LocationTier::Primary,
            relevance_score: 50,
            is_mock: false,
            description: None,
        }
    }

    /// Build a placeholder for a candidate that could not be geocoded.
    pub fn mock(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lat: None,
            lng: None,
            formatted_address: None,
            place_id: None,
            tier: LocationTier::Reference,
            relevance_score: 50,
            is_mock: true,
            description: Some(description.into()),
        }
    }

    /// Whether this location carries usable coordinates.
    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// What to do when the geocoding provider finds no match for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroResultsPolicy {
    /// Omit the candidate entirely.
    #[default]
    Drop,
    /// Keep a coordinate-less mock placeholder so the UI can show it.
    Mock,
}

impl FromStr for ZeroResultsPolicy {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(ZeroResultsPolicy::Drop),
            "mock" => Ok(ZeroResultsPolicy::Mock),
            _ => Err(DetectError::GeocodeError(GeocodeError::ConfigError(
                format!("Invalid zero-results policy: {}", s),
            ))),
        }
    }
}

/// Engine configuration shared by the geocoder and pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the backend geocoding proxy.
    pub base_url: String,
    /// API key forwarded to the proxy, if the deployment requires one.
    pub api_key: Option<String>,
    /// Minimum spacing between outbound geocoding requests.
    pub min_request_delay: Duration,
    /// Handling of candidates the provider cannot resolve.
    pub on_zero_results: ZeroResultsPolicy,
    /// Minimum length for bare single-word candidates; words of this
    /// length or shorter are ignored unless part of a longer phrase.
    pub min_single_word_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            min_request_delay: Duration::from_millis(300),
            on_zero_results: ZeroResultsPolicy::default(),
            min_single_word_len: 3,
        }
    }
}

/// One-shot convenience function: run the full detection pipeline over a
/// single piece of text with a throwaway in-memory cache and session.
///
/// # Example
/// ```rust,no_run
/// use trip_pins::{detect_locations, EngineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EngineConfig::default();
/// let locations = detect_locations("I want to visit Paris this summer", config).await?;
/// for location in &locations {
///     println!("{} -> {:?}, {:?}", location.name, location.lat, location.lng);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn detect_locations(
    text: &str,
    config: EngineConfig,
) -> Result<Vec<Location>, DetectError> {
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let pipeline = DetectionPipeline::new(config, cache)?;
    Ok(pipeline.process_message("adhoc", text).await)
}
