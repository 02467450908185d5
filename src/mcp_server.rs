// src/mcp_server.rs

use rmcp::{
    ServerHandler, ServiceExt,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
};
use trip_pins::{
    DetectionPipeline, EngineConfig, GeocodeClient, Location, LocationCache, ZeroResultsPolicy,
};
use serde::Deserialize;
use anyhow::Result;
use tracing::{info, error, debug};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender;
use std::path::PathBuf;
use std::sync::Arc;

/// Location detection MCP server
#[derive(Clone)]
pub struct LocationServer {
    pipeline: Arc<DetectionPipeline>,
    geocoder: Arc<GeocodeClient>,
}

impl LocationServer {
    pub fn new() -> Result<Self> {
        let config = config_from_env()?;
        let cache = build_cache()?;
        let pipeline = DetectionPipeline::new(config.clone(), Arc::clone(&cache))?;
        let geocoder = GeocodeClient::new(&config, cache)?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            geocoder: Arc::new(geocoder),
        })
    }

    /// Initialize logging to file
    fn init_logging() -> Result<()> {
        // Create logs directory if it doesn't exist
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        // Create a file appender for rotating logs - using blocking writer for simplicity
        let file_appender = tracing_appender::rolling::daily(&log_dir, "trip-pins-mcp.log");

        tracing_subscriber::registry()
            .with(
                EnvFilter::new("debug")
                    .add_directive("trip_pins=debug".parse()?)
                    .add_directive("reqwest=trace".parse()?)
                    .add_directive("hyper=trace".parse()?)
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json() // Structured JSON logging for easier parsing
            )
            .init();

        info!("Logging initialized - logs will be written to logs/trip-pins-mcp.log.*");
        Ok(())
    }
}

fn config_from_env() -> Result<EngineConfig> {
    let on_zero_results = match std::env::var("TRIP_PINS_ZERO_RESULTS") {
        Ok(raw) => raw.parse::<ZeroResultsPolicy>()?,
        Err(_) => ZeroResultsPolicy::default(),
    };
    Ok(EngineConfig {
        base_url: std::env::var("TRIP_PINS_PROXY_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        api_key: std::env::var("GOOGLE_MAPS_API_KEY").ok(),
        on_zero_results,
        ..EngineConfig::default()
    })
}

#[cfg(feature = "disk-cache")]
fn build_cache() -> Result<Arc<dyn LocationCache>> {
    let cache_dir = std::env::var("TRIP_PINS_CACHE_DIR")
        .unwrap_or_else(|_| "geocode-cache".to_string());
    let cache = trip_pins::SledCache::open(&cache_dir)?;
    info!(cache_dir = cache_dir, "Using durable geocode cache");
    Ok(Arc::new(cache))
}

#[cfg(not(feature = "disk-cache"))]
fn build_cache() -> Result<Arc<dyn LocationCache>> {
    Ok(Arc::new(trip_pins::MemoryCache::new()))
}

/// Parameters for the detect_locations tool
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct DetectLocationsParams {
    #[schemars(description = "Chat message text to scan for travel destinations")]
    pub text: String,
    #[schemars(description = "Identifier of the chat message, used for logging")]
    pub message_id: Option<String>,
}

/// Parameters for the geocode_place tool
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct GeocodePlaceParams {
    #[schemars(description = "Place name to resolve to coordinates (e.g., Paris, New York)")]
    pub name: String,
}

#[tool(tool_box)]
impl LocationServer {
    /// Detect travel destinations in chat text and return session state
    #[tool(description = "Detect travel destinations mentioned in a chat message, geocode them, and return all locations detected in the session so far, sorted by relevance.")]
    async fn detect_locations(
        &self,
        #[tool(aggr)] params: DetectLocationsParams,
    ) -> String {
        let message_id = params.message_id.as_deref().unwrap_or("mcp");
        info!(
            message_id = message_id,
            text_length = params.text.len(),
            "Detect locations request received"
        );

        let new_locations = self
            .pipeline
            .process_message(message_id, &params.text)
            .await;
        debug!(new_locations = new_locations.len(), "Message processed");

        let mut session: Vec<Location> = self.pipeline.store().snapshot();
        session.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

        let response = serde_json::json!({
            "new_locations": new_locations.len(),
            "total_locations": session.len(),
            "locations": session,
        });
        serde_json::to_string_pretty(&response).unwrap_or_else(|e| {
            format!(r#"{{"error": "Failed to serialize results: {}"}}"#, e)
        })
    }

    /// Resolve a single place name to coordinates
    #[tool(description = "Resolve a single place name to geographic coordinates via the geocoding proxy. Results are cached.")]
    async fn geocode_place(
        &self,
        #[tool(aggr)] params: GeocodePlaceParams,
    ) -> String {
        info!(name = params.name, "Geocode place request received");

        match self.geocoder.geocode(&params.name).await {
            Ok(Some(location)) => serde_json::to_string_pretty(&location)
                .unwrap_or_else(|e| {
                    format!(r#"{{"error": "Failed to serialize location: {}"}}"#, e)
                }),
            Ok(None) => {
                info!(name = params.name, "Place not found");
                format!(r#"{{"error": "No results for place: {}"}}"#, params.name)
            }
            Err(e) => {
                error!(name = params.name, error = %e, "Geocoding failed");
                format!(r#"{{"error": "Geocoding failed: {}"}}"#, e)
            }
        }
    }

    /// Reset the detection session
    #[tool(description = "Clear the current detection session: forget processed messages and remove all detected locations.")]
    async fn clear_session(&self) -> String {
        info!("Clear session request received");
        self.pipeline.clear_session();
        r#"{"status": "cleared"}"#.to_string()
    }
}

#[tool(tool_box)]
impl ServerHandler for LocationServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A travel location detection server. Feed it chat messages to extract, geocode, and rank the destinations mentioned; query single places directly; clear the session to start over.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging before anything else
    if let Err(e) = LocationServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        // Continue without logging rather than failing
    }

    info!("Starting MCP Location Server");

    let server = LocationServer::new()?;
    let transport = stdio();

    info!("MCP server initialized, starting service");

    // SDK handles initialization, tool discovery, and message routing
    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    // Wait for shutdown
    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
