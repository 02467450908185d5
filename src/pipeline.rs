//! Message-to-pins orchestration.
//!
//! For each new chat message: extract candidates, resolve them strictly
//! in sequence through the rate-limited geocoder, score each against the
//! message, and merge into the shared store after every resolution so the
//! map can render pins progressively. Failures are absorbed per
//! candidate; the pipeline as a whole never fails outward.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::LocationCache;
use crate::extract::CandidateExtractor;
use crate::geocode::GeocodeClient;
use crate::score::relevance_score;
use crate::store::LocationStore;
use crate::{DetectError, EngineConfig, Location, LocationTier, ZeroResultsPolicy};

/// Drives the detection pipeline for one chat session.
pub struct DetectionPipeline {
    extractor: CandidateExtractor,
    geocoder: GeocodeClient,
    store: Arc<LocationStore>,
    processed: Mutex<HashSet<String>>,
    on_zero_results: ZeroResultsPolicy,
}

impl DetectionPipeline {
    /// Create a pipeline with a fresh location store.
    pub fn new(
        config: EngineConfig,
        cache: Arc<dyn LocationCache>,
    ) -> Result<Self, DetectError> {
        Self::with_store(config, cache, Arc::new(LocationStore::new()))
    }

    /// Create a pipeline that merges into an existing store (e.g. one the
    /// map view already subscribes to).
    pub fn with_store(
        config: EngineConfig,
        cache: Arc<dyn LocationCache>,
        store: Arc<LocationStore>,
    ) -> Result<Self, DetectError> {
        let extractor = CandidateExtractor::with_min_word_len(config.min_single_word_len)?;
        let geocoder = GeocodeClient::new(&config, cache)?;
        Ok(Self {
            extractor,
            geocoder,
            store,
            processed: Mutex::new(HashSet::new()),
            on_zero_results: config.on_zero_results,
        })
    }

    /// The store this pipeline merges into.
    pub fn store(&self) -> &Arc<LocationStore> {
        &self.store
    }

    /// Process one chat message: extract, resolve, score, and merge.
    ///
    /// Returns the locations with usable coordinates that this message
    /// contributed, sorted by descending relevance. Repeated delivery of
    /// the same message content within a session is a no-op; the guard is
    /// claimed before resolution starts, so a re-delivery racing an
    /// in-flight run is also a no-op. Per-candidate failures are logged
    /// and skipped, never propagated.
    pub async fn process_message(&self, message_id: &str, text: &str) -> Vec<Location> {
        let fingerprint = text.trim().to_lowercase();
        if fingerprint.is_empty() {
            return Vec::new();
        }
        {
            let Ok(mut processed) = self.processed.lock() else {
                return Vec::new();
            };
            if !processed.insert(fingerprint) {
                debug!(message_id = message_id, "Message already processed");
                return Vec::new();
            }
        }

        // Runs started before a clear must not write after it
        let generation = self.store.generation();

        let candidates = self.extractor.extract(text);
        if candidates.is_empty() {
            debug!(message_id = message_id, "No location candidates found");
            return Vec::new();
        }
        info!(
            message_id = message_id,
            candidates = candidates.len(),
            "Processing message"
        );

        let mut resolved = Vec::new();
        for candidate in candidates {
            let mut location = match self.geocoder.geocode(&candidate).await {
                Ok(Some(location)) => location,
                Ok(None) => {
                    debug!(candidate = %candidate, "Candidate dropped, no geocoding result");
                    continue;
                }
                Err(e) => {
                    warn!(candidate = %candidate, error = %e, "Geocoding failed, skipping candidate");
                    match self.on_zero_results {
                        ZeroResultsPolicy::Drop => continue,
                        ZeroResultsPolicy::Mock => Location::mock(
                            candidate.clone(),
                            format!("Unable to geocode: {}", candidate),
                        ),
                    }
                }
            };

            let score = relevance_score(&candidate, text);
            location.relevance_score = score;
            location.tier = LocationTier::from_score(score);

            if !self.store.add_detected_for(generation, vec![location.clone()]) {
                info!(message_id = message_id, "Session cleared mid-flight, dropping results");
                break;
            }
            if location.has_coordinates() {
                resolved.push(location);
            }
        }

        resolved.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
        info!(
            message_id = message_id,
            resolved = resolved.len(),
            "Message processing completed"
        );
        resolved
    }

    /// Reset the session: forget processed messages and empty the store.
    /// In-flight resolutions from before the reset are invalidated.
    pub fn clear_session(&self) {
        if let Ok(mut processed) = self.processed.lock() {
            processed.clear();
        }
        self.store.clear();
    }
}
