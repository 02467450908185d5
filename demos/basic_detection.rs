//! Basic detection demo: run the full pipeline over a chat message.
//!
//! Expects a geocoding proxy (see the repository README) reachable at
//! TRIP_PINS_PROXY_URL, defaulting to http://localhost:8000.

use trip_pins::{detect_locations, EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig {
        base_url: std::env::var("TRIP_PINS_PROXY_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        api_key: std::env::var("GOOGLE_MAPS_API_KEY").ok(),
        ..EngineConfig::default()
    };

    let message = "We are thinking about a trip to Portugal in October, \
                   maybe visit Lisbon and Porto, or fly to Madeira instead";
    println!("Message: {}\n", message);

    let locations = detect_locations(message, config).await?;
    println!("Detected {} locations:", locations.len());
    for location in &locations {
        println!(
            "  {} [{:?}] score={} at ({:?}, {:?})",
            location.name, location.tier, location.relevance_score, location.lat, location.lng
        );
    }

    Ok(())
}
