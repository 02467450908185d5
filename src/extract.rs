//! Candidate place-name extraction from free-form chat text.
//!
//! Four independent pattern families run over the text and their matches
//! are unioned into one deduplicated candidate list: preposition-led
//! phrases ("to Paris"), travel-verb-led phrases ("visiting Tokyo"), bare
//! multi-word capitalized phrases ("New York"), and bare single
//! capitalized words above a length threshold ("Portugal"). A stop-word
//! post-filter then removes conversational noise that happens to be
//! capitalized.

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

use crate::score::{TRAVEL_PREPOSITIONS, TRAVEL_VERBS};

/// Extractor-specific error types
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid extraction pattern: {0}")]
    PatternError(#[from] regex::Error),
}

/// Candidates matching one of these (case-insensitive, whole string) are
/// discarded: articles, conjunctions, interrogatives, and travel-discourse
/// words that are not themselves places.
const STOP_WORDS: &[&str] = &[
    // Articles, conjunctions, pronouns
    "the", "a", "an", "and", "or", "but", "if", "so", "then", "this", "that", "these",
    "those", "there", "here", "it", "its", "i", "we", "you", "they", "he", "she", "my",
    "our", "your", "their", "me", "us",
    // Interrogatives
    "what", "where", "when", "why", "how", "who", "whom", "which",
    // Auxiliaries and conversational filler
    "is", "are", "was", "were", "be", "been", "am", "do", "does", "did", "can", "could",
    "should", "would", "will", "want", "wants", "like", "likes", "need", "thanks",
    "thank", "hello", "hi", "hey", "please", "yes", "no", "ok", "okay", "sure", "great",
    "good", "nice", "also", "maybe", "really",
    // Travel discourse that is not a place
    "visit", "visiting", "go", "going", "travel", "traveling", "travelling", "fly",
    "flying", "explore", "exploring", "see", "seeing", "discover", "discovering",
    "stay", "staying", "recommend", "recommendation", "recommendations", "trip",
    "trips", "vacation", "holiday", "holidays", "itinerary", "destination",
    "destinations", "place", "places", "city", "cities", "country", "countries",
    "beach", "beaches", "hotel", "hotels", "restaurant", "restaurants", "flight",
    "flights", "airport", "museum", "museums", "food", "weather", "summer", "winter",
    "spring", "autumn", "near", "around", "about", "some", "any", "best", "top",
    "cheap", "budget", "week", "weekend", "month", "day", "days", "time", "today",
    "tomorrow", "tonight",
];

/// Candidates this short are never place names worth resolving.
const MIN_CANDIDATE_LEN: usize = 3;

/// Extracts candidate place names from chat text using pre-compiled
/// heuristic patterns.
pub struct CandidateExtractor {
    preposition_led: Regex,
    verb_led: Regex,
    multi_word: Regex,
    single_word: Regex,
}

impl CandidateExtractor {
    /// Create an extractor with the default single-word length threshold.
    pub fn new() -> Result<Self, ExtractError> {
        Self::with_min_word_len(3)
    }

    /// Create an extractor that ignores bare single capitalized words of
    /// `min_word_len` characters or fewer (they can still surface through
    /// the trigger-word and multi-word families).
    pub fn with_min_word_len(min_word_len: usize) -> Result<Self, ExtractError> {
        // One or more consecutive capitalized words
        let phrase = r"[A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*";

        let prepositions = TRAVEL_PREPOSITIONS.join("|");
        let preposition_led = Regex::new(&format!(r"\b(?i:{})\s+({})", prepositions, phrase))?;

        let verbs = TRAVEL_VERBS
            .iter()
            .map(|verb| verb_with_gerund(verb))
            .collect::<Vec<_>>()
            .join("|");
        let verb_led = Regex::new(&format!(r"\b(?i:{})\s+({})", verbs, phrase))?;

        let multi_word = Regex::new(r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)+)")?;

        let single_word = Regex::new(&format!(r"\b([A-Z][a-zA-Z]{{{},}})\b", min_word_len))?;

        Ok(Self {
            preposition_led,
            verb_led,
            multi_word,
            single_word,
        })
    }

    /// Extract candidate place names from `text`.
    ///
    /// Matches from all four pattern families are unioned; duplicates
    /// (case-insensitive) are kept once, first spelling wins. Output order
    /// carries no meaning — relevance is recomputed per candidate
    /// downstream. Empty input yields an empty list.
    pub fn extract(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        let families = [
            &self.preposition_led,
            &self.verb_led,
            &self.multi_word,
            &self.single_word,
        ];

        for family in families {
            for captures in family.captures_iter(text) {
                if let Some(matched) = captures.get(1) {
                    // Collapse any run of whitespace inside a phrase
                    let candidate = matched
                        .as_str()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ");

                    if !self.keep(&candidate) {
                        continue;
                    }
                    if seen.insert(candidate.to_lowercase()) {
                        candidates.push(candidate);
                    }
                }
            }
        }

        candidates
    }

    fn keep(&self, candidate: &str) -> bool {
        if candidate.len() < MIN_CANDIDATE_LEN {
            return false;
        }
        let lowered = candidate.to_lowercase();
        !STOP_WORDS.contains(&lowered.as_str())
    }
}

/// Build the regex alternative for a travel verb plus its gerund form.
/// Verbs ending in a silent "e" drop it ("explore" -> "exploring");
/// British spellings may double a final "l" ("travelling").
fn verb_with_gerund(verb: &str) -> String {
    if verb.ends_with('e') && !verb.ends_with("ee") {
        let stem = &verb[..verb.len() - 1];
        format!("{}(?:e|ing)", stem)
    } else {
        format!("{}(?:ing|ling)?", verb)
    }
}
