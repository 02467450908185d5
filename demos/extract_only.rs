//! Offline walkthrough of the extraction and scoring heuristics.
//! No network access required.

use trip_pins::{relevance_score, CandidateExtractor, LocationTier};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let extractor = CandidateExtractor::new()?;

    let messages = [
        "I want to visit Paris and Rome",
        "what are the best beaches near Barcelona?",
        "we are visiting Tokyo, then staying in Kyoto for a week",
        "no destinations here",
    ];

    for message in messages {
        println!("Message: {}", message);
        let candidates = extractor.extract(message);
        if candidates.is_empty() {
            println!("  (no candidates)\n");
            continue;
        }
        for candidate in candidates {
            let score = relevance_score(&candidate, message);
            println!(
                "  {} -> score {} ({:?})",
                candidate,
                score,
                LocationTier::from_score(score)
            );
        }
        println!();
    }

    Ok(())
}
