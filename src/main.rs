//! CLI interface for trip-pins

use clap::{Parser, Subcommand};
use std::fs;
use trip_pins::{
    detect_locations, relevance_score, CandidateExtractor, EngineConfig, LocationTier,
    ZeroResultsPolicy,
};

#[derive(Parser)]
#[command(name = "trip-pins")]
#[command(about = "Detect and geocode travel destinations mentioned in chat text")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full detection pipeline over a piece of text
    Detect {
        /// Message text to scan for destinations
        #[arg(short, long)]
        text: String,
        /// Base URL of the geocoding proxy
        #[arg(long, default_value = "http://localhost:8000")]
        proxy_url: String,
        /// API key forwarded to the proxy (falls back to GOOGLE_MAPS_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Handling of unresolvable places (drop, mock)
        #[arg(long, default_value = "drop")]
        on_zero_results: String,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Extract and score candidates without any network calls
    Extract {
        /// Message text to scan for destinations
        #[arg(short, long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            text,
            proxy_url,
            api_key,
            on_zero_results,
            output,
        } => {
            let config = EngineConfig {
                base_url: proxy_url,
                api_key: api_key.or_else(|| std::env::var("GOOGLE_MAPS_API_KEY").ok()),
                on_zero_results: on_zero_results.parse::<ZeroResultsPolicy>()?,
                ..EngineConfig::default()
            };

            println!("Detecting locations...");
            match detect_locations(&text, config).await {
                Ok(locations) => {
                    let json = serde_json::to_string_pretty(&locations)?;

                    if let Some(output_file) = output {
                        fs::write(&output_file, &json)?;
                        println!("Results saved to {}", output_file);
                    } else {
                        println!("{}", json);
                    }

                    // Print summary
                    println!("\nSummary:");
                    println!("Found {} locations", locations.len());
                    if let Some(best) = locations.first() {
                        println!(
                            "Most relevant: {} (score {})",
                            best.name, best.relevance_score
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error detecting locations: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Extract { text } => {
            let extractor = CandidateExtractor::new()?;
            let candidates = extractor.extract(&text);

            if candidates.is_empty() {
                println!("No candidates found");
                return Ok(());
            }

            for candidate in candidates {
                let score = relevance_score(&candidate, &text);
                println!(
                    "{}  score={}  tier={:?}",
                    candidate,
                    score,
                    LocationTier::from_score(score)
                );
            }
        }
    }

    Ok(())
}
