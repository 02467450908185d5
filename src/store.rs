//! Session-scoped store of detected locations backing the map view.
//!
//! Locations are deduplicated on insert by a composite identity rule:
//! same name (case-insensitive) or coordinates within 0.0001 degrees on
//! both axes. When a duplicate arrives, the stored record keeps all of
//! its fields and only upgrades its relevance score and tier if the
//! incoming record scored strictly higher, so re-adding the same batch is
//! a no-op. Subscribers are notified after every mutating insert and on
//! clear.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::Location;

/// Two coordinates closer than this on both axes are the same place.
const COORD_EPSILON: f64 = 0.0001;

type UpdateCallback = Box<dyn Fn(&[Location]) + Send + Sync>;

#[derive(Default)]
struct StoreState {
    detected: Vec<Location>,
    selected: Option<Location>,
}

/// Shared store of detected locations for one chat session.
#[derive(Default)]
pub struct LocationStore {
    state: Mutex<StoreState>,
    callbacks: Mutex<Vec<UpdateCallback>>,
    generation: AtomicU64,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session generation. Bumped by [`LocationStore::clear`];
    /// writers that captured an older generation are rejected.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Register a callback invoked with a full snapshot after every
    /// change to the detected set.
    pub fn on_update(&self, callback: impl Fn(&[Location]) + Send + Sync + 'static) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(Box::new(callback));
        }
    }

    /// Merge `incoming` locations into the detected set.
    pub fn add_detected(&self, incoming: Vec<Location>) {
        let generation = self.generation();
        self.add_detected_for(generation, incoming);
    }

    /// Merge `incoming` locations on behalf of a pipeline run started at
    /// `generation`. Returns `false` without mutating anything when the
    /// session has been cleared since, so stale in-flight resolutions
    /// cannot resurrect pins.
    pub fn add_detected_for(&self, generation: u64, incoming: Vec<Location>) -> bool {
        let mut changed = false;
        {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            // Generation checked under the state lock; clear() bumps it
            // while holding the same lock
            if generation != self.generation.load(Ordering::SeqCst) {
                debug!(generation = generation, "Rejecting stale merge after session clear");
                return false;
            }
            for location in incoming {
                changed |= merge_into(&mut state.detected, location);
            }
        }
        if changed {
            self.notify();
        }
        true
    }

    /// Empty the detected set and selection, and invalidate in-flight
    /// pipeline runs.
    pub fn clear(&self) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            info!(discarded = state.detected.len(), "Clearing detected locations");
            state.detected.clear();
            state.selected = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.notify();
    }

    /// Set (or unset) the currently focused location used to center the
    /// map. Membership in the detected set is not required.
    pub fn select(&self, location: Option<Location>) {
        if let Ok(mut state) = self.state.lock() {
            state.selected = location;
        }
    }

    pub fn selected(&self) -> Option<Location> {
        self.state
            .lock()
            .map(|state| state.selected.clone())
            .unwrap_or(None)
    }

    /// Snapshot of the detected set in insertion order.
    pub fn snapshot(&self) -> Vec<Location> {
        self.state
            .lock()
            .map(|state| state.detected.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.detected.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                callback(&snapshot);
            }
        }
    }
}

/// Merge one location into the set. Returns whether anything changed.
fn merge_into(detected: &mut Vec<Location>, incoming: Location) -> bool {
    if let Some(existing) = detected.iter_mut().find(|e| same_identity(e, &incoming)) {
        if incoming.relevance_score > existing.relevance_score {
            existing.relevance_score = incoming.relevance_score;
            existing.tier = incoming.tier;
            return true;
        }
        return false;
    }
    detected.push(incoming);
    true
}

/// Composite identity: same name ignoring case, or both resolved to
/// near-equal coordinates.
fn same_identity(a: &Location, b: &Location) -> bool {
    if a.name.to_lowercase() == b.name.to_lowercase() {
        return true;
    }
    match (a.lat, a.lng, b.lat, b.lng) {
        (Some(a_lat), Some(a_lng), Some(b_lat), Some(b_lng)) => {
            (a_lat - b_lat).abs() <= COORD_EPSILON && (a_lng - b_lng).abs() <= COORD_EPSILON
        }
        _ => false,
    }
}
