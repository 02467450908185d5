//! Relevance scoring for candidate place names.
//!
//! The score estimates how central a place is to the user's travel intent,
//! based on its proximity to travel verbs/prepositions in the source text,
//! how often it is repeated, and whether it appears early in the message.

/// Travel verbs that signal intent toward a following place name.
pub const TRAVEL_VERBS: &[&str] = &[
    "visit", "go", "travel", "fly", "explore", "see", "discover", "stay", "recommend",
];

/// Prepositions that commonly precede a place name in travel talk.
pub const TRAVEL_PREPOSITIONS: &[&str] = &["to", "in", "at", "near", "around", "by", "from"];

/// Starting score before any contextual bonuses.
const BASE_SCORE: u32 = 50;

/// Bonus for each travel verb found directly before the candidate.
const VERB_BONUS: u32 = 20;

/// Bonus for each travel preposition found directly before the candidate.
const PREPOSITION_BONUS: u32 = 15;

/// Per-occurrence bonus when the candidate is mentioned more than once.
const REPEAT_BONUS: u32 = 10;

/// Bonus when the candidate appears in the first half of the text.
const EARLY_MENTION_BONUS: u32 = 10;

/// Score a candidate place name against the message it was extracted from.
///
/// Starts at 50 and adds: 20 for each travel verb immediately preceding
/// the candidate, 15 for each such preposition, `10 * count` when the
/// candidate occurs more than once, and 10 when it appears in the first
/// half of the text. The result is capped at 100, so with the current
/// additive-only rules it always lands in `[50, 100]`.
///
/// All comparisons are case-insensitive substring checks; the caller maps
/// the score to a tier via [`crate::LocationTier::from_score`].
pub fn relevance_score(candidate: &str, source_text: &str) -> u8 {
    let text = source_text.to_lowercase();
    let name = candidate.trim().to_lowercase();
    if name.is_empty() || text.is_empty() {
        return BASE_SCORE as u8;
    }

    let mut score = BASE_SCORE;

    for verb in TRAVEL_VERBS {
        if text.contains(&format!("{} {}", verb, name)) {
            score += VERB_BONUS;
        }
    }

    for preposition in TRAVEL_PREPOSITIONS {
        if text.contains(&format!("{} {}", preposition, name)) {
            score += PREPOSITION_BONUS;
        }
    }

    let occurrences = text.matches(&name).count();
    if occurrences > 1 {
        score += REPEAT_BONUS * occurrences as u32;
    }

    // First half measured in characters, not bytes, so multi-byte names
    // cannot split a codepoint.
    let half_chars = text.chars().count() / 2;
    let first_half: String = text.chars().take(half_chars).collect();
    if first_half.contains(&name) {
        score += EARLY_MENTION_BONUS;
    }

    score.min(100) as u8
}
