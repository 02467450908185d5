//! Integration tests for trip-pins
//!
//! These tests drive the geocoder and the full detection pipeline against
//! a mock geocoding proxy, so they exercise real HTTP handling without
//! touching the network.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use trip_pins::{
    DetectionPipeline, EngineConfig, GeocodeClient, GeocodeError, LocationCache, LocationTier,
    MemoryCache, ZeroResultsPolicy,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build an engine config pointed at the mock proxy, with a
/// short request delay so the suite stays fast.
fn test_config(base_url: &str) -> EngineConfig {
    EngineConfig {
        base_url: base_url.to_string(),
        min_request_delay: Duration::from_millis(10),
        ..EngineConfig::default()
    }
}

/// Helper to build a pipeline with a fresh in-memory cache.
fn test_pipeline(config: EngineConfig) -> DetectionPipeline {
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    DetectionPipeline::new(config, cache).expect("pipeline construction should not fail")
}

/// Helper to build a geocoding client over a given cache.
fn test_client(config: &EngineConfig, cache: Arc<dyn LocationCache>) -> GeocodeClient {
    GeocodeClient::new(config, cache).expect("client construction should not fail")
}

fn ok_body(address: &str, lat: f64, lng: f64) -> serde_json::Value {
    serde_json::json!({
        "status": "OK",
        "results": [{
            "formatted_address": address,
            "geometry": { "location": { "lat": lat, "lng": lng } },
            "place_id": format!("place-{}", address.to_lowercase())
        }]
    })
}

fn zero_results_body() -> serde_json::Value {
    serde_json::json!({ "status": "ZERO_RESULTS", "results": [] })
}

async fn mount_ok(server: &MockServer, name: &str, lat: f64, lng: f64) {
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body(name, lat, lng)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pipeline_detects_and_ranks_locations() {
    let server = MockServer::start().await;
    mount_ok(&server, "Paris", 48.8566, 2.3522).await;
    mount_ok(&server, "Rome", 41.9028, 12.4964).await;

    let pipeline = test_pipeline(test_config(&server.uri()));
    let locations = pipeline
        .process_message("m1", "I want to visit Paris and Rome")
        .await;

    assert_eq!(locations.len(), 2);
    // "visit Paris" fires the verb bonus, so Paris outranks Rome
    assert_eq!(locations[0].name, "Paris");
    assert_eq!(locations[0].relevance_score, 70);
    assert_eq!(locations[0].tier, LocationTier::Secondary);
    assert_eq!(locations[1].name, "Rome");
    assert_eq!(locations[1].relevance_score, 50);
    assert_eq!(locations[1].tier, LocationTier::Reference);

    // Both landed in the shared store
    assert_eq!(pipeline.store().len(), 2);
    let paris = &pipeline.store().snapshot()[0];
    assert_eq!(paris.lat, Some(48.8566));
    assert_eq!(paris.lng, Some(2.3522));
    assert!(!paris.is_mock);
}

#[tokio::test]
async fn test_no_candidates_makes_no_requests() {
    let server = MockServer::start().await;

    let pipeline = test_pipeline(test_config(&server.uri()));
    let locations = pipeline.process_message("m1", "no destinations here").await;

    assert!(locations.is_empty());
    assert!(pipeline.store().is_empty());
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "expected zero proxy requests");
}

#[tokio::test]
async fn test_incremental_updates_fire_per_candidate() {
    let server = MockServer::start().await;
    mount_ok(&server, "Paris", 48.8566, 2.3522).await;
    mount_ok(&server, "Rome", 41.9028, 12.4964).await;

    let pipeline = test_pipeline(test_config(&server.uri()));
    let sizes: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&sizes);
    pipeline.store().on_update(move |locations| {
        recorded.lock().unwrap().push(locations.len());
    });

    pipeline
        .process_message("m1", "I want to visit Paris and Rome")
        .await;

    // One notification per resolved candidate, growing the set each time
    assert_eq!(*sizes.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_cache_round_trip_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Tokyo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Tokyo", 35.6762, 139.6503)))
        .expect(1) // The second lookup must come from the cache
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let client = test_client(&config, cache);

    let first = client.geocode("Tokyo").await.unwrap().unwrap();
    let second = client.geocode("Tokyo").await.unwrap().unwrap();
    assert_eq!(first, second);

    // Case-insensitive key: a different spelling also hits the cache
    let third = client.geocode("tokyo").await.unwrap().unwrap();
    assert_eq!(third.lat, first.lat);

    server.verify().await;
}

#[tokio::test]
async fn test_rate_limit_spaces_uncached_calls() {
    let server = MockServer::start().await;
    mount_ok(&server, "Paris", 48.8566, 2.3522).await;
    mount_ok(&server, "Rome", 41.9028, 12.4964).await;

    let config = EngineConfig {
        base_url: server.uri(),
        ..EngineConfig::default() // Keep the real 300ms spacing
    };
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let client = test_client(&config, cache);

    let start = Instant::now();
    client.geocode("Paris").await.unwrap();
    client.geocode("Rome").await.unwrap();
    assert!(
        start.elapsed() >= Duration::from_millis(300),
        "consecutive uncached calls must be at least 300ms apart"
    );
}

#[tokio::test]
async fn test_zero_results_dropped_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zero_results_body()))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let client = test_client(&config, cache);

    let result = client.geocode("Atlantis").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_zero_results_mocked_under_lenient_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zero_results_body()))
        .mount(&server)
        .await;

    let config = EngineConfig {
        on_zero_results: ZeroResultsPolicy::Mock,
        ..test_config(&server.uri())
    };
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let client = test_client(&config, cache);

    let location = client.geocode("Atlantis").await.unwrap().unwrap();
    assert!(location.is_mock);
    assert_eq!(location.lat, None);
    assert_eq!(location.lng, None);
    assert_eq!(
        location.description.as_deref(),
        Some("Unable to geocode: Atlantis")
    );
}

#[tokio::test]
async fn test_provider_error_surfaces_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid.",
            "results": []
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let client = test_client(&config, cache);

    match client.geocode("Paris").await {
        Err(GeocodeError::ApiError { status, message }) => {
            assert_eq!(status, "REQUEST_DENIED");
            assert!(message.contains("API key"));
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_surfaces_as_proxy_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let cache: Arc<dyn LocationCache> = Arc::new(MemoryCache::new());
    let client = test_client(&config, cache);

    assert!(matches!(
        client.geocode("Paris").await,
        Err(GeocodeError::ProxyStatus(500))
    ));
}

#[tokio::test]
async fn test_candidate_failure_does_not_abort_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Atlantis"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_ok(&server, "Paris", 48.8566, 2.3522).await;

    let pipeline = test_pipeline(test_config(&server.uri()));
    let locations = pipeline
        .process_message("m1", "we should visit Atlantis and then visit Paris")
        .await;

    // Atlantis failed hard but Paris still resolved
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, "Paris");
    assert_eq!(pipeline.store().len(), 1);
}

#[tokio::test]
async fn test_failed_candidate_becomes_mock_pin_under_lenient_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Atlantis"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_ok(&server, "Paris", 48.8566, 2.3522).await;

    let config = EngineConfig {
        on_zero_results: ZeroResultsPolicy::Mock,
        ..test_config(&server.uri())
    };
    let pipeline = test_pipeline(config);
    let locations = pipeline
        .process_message("m1", "we should visit Atlantis and then visit Paris")
        .await;

    // The mock placeholder has no coordinates, so only Paris is returned...
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, "Paris");

    // ...but the store carries both, so the UI can show a dimmed pin
    let snapshot = pipeline.store().snapshot();
    assert_eq!(snapshot.len(), 2);
    let atlantis = snapshot.iter().find(|l| l.name == "Atlantis").unwrap();
    assert!(atlantis.is_mock);
    assert!(!atlantis.has_coordinates());
}

#[tokio::test]
async fn test_duplicate_message_content_processed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Paris", 48.8566, 2.3522)))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = test_pipeline(test_config(&server.uri()));
    let first = pipeline.process_message("m1", "thinking about Paris").await;
    assert_eq!(first.len(), 1);

    // Re-delivery of the same content under a different id is a no-op
    let second = pipeline.process_message("m2", "thinking about Paris").await;
    assert!(second.is_empty());
    assert_eq!(pipeline.store().len(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_clear_session_resets_dedupe_and_reuses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Paris", 48.8566, 2.3522)))
        .expect(1) // The re-run after clear resolves from the cache
        .mount(&server)
        .await;

    let pipeline = test_pipeline(test_config(&server.uri()));
    pipeline.process_message("m1", "thinking about Paris").await;
    assert_eq!(pipeline.store().len(), 1);

    pipeline.clear_session();
    assert!(pipeline.store().is_empty());

    let again = pipeline.process_message("m2", "thinking about Paris").await;
    assert_eq!(again.len(), 1);
    assert_eq!(pipeline.store().len(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_corrupt_cache_entry_treated_as_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Tokyo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Tokyo", 35.6762, 139.6503)))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    cache.set("geocode_tokyo", "{not json at all".to_string());

    let config = test_config(&server.uri());
    let client = test_client(&config, Arc::clone(&cache) as Arc<dyn LocationCache>);

    let location = client.geocode("Tokyo").await.unwrap().unwrap();
    assert_eq!(location.lat, Some(35.6762));

    // The bad entry was overwritten with the fresh result
    let stored = cache.get("geocode_tokyo").unwrap();
    assert!(serde_json::from_str::<trip_pins::Location>(&stored).is_ok());

    server.verify().await;
}

#[tokio::test]
async fn test_repeated_mentions_merge_to_higher_score() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/maps/geocode"))
        .and(query_param("address", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Paris", 48.8566, 2.3522)))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(test_config(&server.uri()));

    // Weak mention first: bare name, no trigger words
    pipeline
        .process_message("m1", "someone once told me about how lovely Paris gets")
        .await;
    let weak = pipeline.store().snapshot()[0].relevance_score;

    // Strong mention second: verb plus preposition context
    pipeline
        .process_message("m2", "lets visit Paris, we could fly to Paris in spring")
        .await;

    let snapshot = pipeline.store().snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].relevance_score > weak);
    assert_eq!(snapshot[0].tier, LocationTier::Primary);
}
