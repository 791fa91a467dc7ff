// Integration tests for `OfflineDataService` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mapasur_data::{
    BuildingFeature, CacheStore, Config, ConnectionStatus, ConnectivityMonitor, DataError,
    LoadOptions, OfflineDataService, PushConnectivitySource, StreetFeature,
};

const BUILDINGS_PATH: &str = "/assets/fonavi.geojson";
const STREETS_PATH: &str = "/assets/calles.geojson";

// ===== Helpers =====

/// Route crate logs through the test writer; `RUST_LOG` filters as usual.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    server: MockServer,
    _dir: tempfile::TempDir,
    source: Arc<PushConnectivitySource>,
    store: Arc<CacheStore>,
    service: OfflineDataService,
}

async fn setup(initial: ConnectionStatus) -> Harness {
    init_tracing();
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    let source = Arc::new(PushConnectivitySource::new(initial));
    let monitor = ConnectivityMonitor::new(source.clone());
    let store = Arc::new(CacheStore::new(dir.path().join("cache")));
    let config = Config {
        base_url: server.uri(),
        ..Config::default()
    };
    let service = OfflineDataService::new(store.clone(), monitor, config)
        .expect("service should build");

    Harness {
        server,
        _dir: dir,
        source,
        store,
        service,
    }
}

fn buildings_payload(nombre: i64) -> serde_json::Value {
    json!([{
        "type": "Feature",
        "properties": { "tipo": "Edificio", "nombre": nombre, "plan": "2021", "id": nombre },
        "geometry": { "type": "Point", "coordinates": [-60.66904, -32.93968] }
    }])
}

fn streets_payload() -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "nombre": "Calle Test", "tipo": "Calle" },
            "geometry": { "type": "LineString", "coordinates": [[-60.669, -32.939], [-60.67, -32.94]] }
        }]
    })
}

fn sample_buildings(nombre: i64) -> Vec<BuildingFeature> {
    serde_json::from_value(buildings_payload(nombre)).expect("fixture should parse")
}

fn sample_streets() -> Vec<StreetFeature> {
    serde_json::from_value(streets_payload()["features"].clone()).expect("fixture should parse")
}

async fn mount(server: &MockServer, route: &str, template: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .expect(expected)
        .mount(server)
        .await;
}

// ===== Cache-first behavior =====

#[tokio::test]
async fn test_fresh_cache_hit_with_prefer_offline_skips_network() {
    let h = setup(ConnectionStatus::online()).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed cache");

    // Any request would be a policy violation
    mount(&h.server, BUILDINGS_PATH, ResponseTemplate::new(200), 0).await;

    let options = LoadOptions {
        prefer_offline: true,
        ..LoadOptions::default()
    };
    let result = h.service.load_buildings(&options).await.expect("load");

    assert!(result.from_cache);
    assert!(!result.is_stale);
    assert_eq!(result.data, sample_buildings(1));
    assert!(result.last_updated.is_some());
}

#[tokio::test]
async fn test_prefer_offline_without_cache_falls_through_to_network() {
    let h = setup(ConnectionStatus::online()).await;
    mount(
        &h.server,
        BUILDINGS_PATH,
        ResponseTemplate::new(200).set_body_json(buildings_payload(2)),
        1,
    )
    .await;

    let options = LoadOptions {
        prefer_offline: true,
        ..LoadOptions::default()
    };
    let result = h.service.load_buildings(&options).await.expect("load");

    assert!(!result.from_cache);
    assert_eq!(result.data, sample_buildings(2));
}

#[tokio::test]
async fn test_offline_serves_stale_copy() {
    let h = setup(ConnectionStatus::offline()).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed cache");

    let options = LoadOptions {
        max_cache_age: Duration::ZERO,
        ..LoadOptions::default()
    };
    let result = h.service.load_buildings(&options).await.expect("load");

    assert!(result.from_cache);
    assert!(result.is_stale);
}

// ===== Network path =====

#[tokio::test]
async fn test_successful_fetch_writes_through() {
    let h = setup(ConnectionStatus::online()).await;
    mount(
        &h.server,
        BUILDINGS_PATH,
        ResponseTemplate::new(200).set_body_json(buildings_payload(3)),
        1,
    )
    .await;

    let before = Utc::now().timestamp_millis();
    let result = h
        .service
        .load_buildings(&LoadOptions::default())
        .await
        .expect("load");
    let after = Utc::now().timestamp_millis();

    assert!(!result.from_cache);
    assert!(!result.is_stale);

    let entry = h
        .store
        .get::<Vec<BuildingFeature>>("buildings")
        .await
        .expect("get")
        .expect("entry must exist after fetch");
    assert_eq!(entry.data, sample_buildings(3));
    assert_eq!(entry.version, "1.0.0");
    assert!(entry.timestamp >= before && entry.timestamp <= after);
}

#[tokio::test]
async fn test_force_refresh_bypasses_fresh_cache() {
    let h = setup(ConnectionStatus::online()).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed cache");
    mount(
        &h.server,
        BUILDINGS_PATH,
        ResponseTemplate::new(200).set_body_json(buildings_payload(9)),
        1,
    )
    .await;

    let options = LoadOptions {
        force_refresh: true,
        ..LoadOptions::default()
    };
    let result = h.service.load_buildings(&options).await.expect("load");

    assert!(!result.from_cache);
    assert_eq!(result.data, sample_buildings(9));

    let entry = h
        .store
        .get::<Vec<BuildingFeature>>("buildings")
        .await
        .expect("get")
        .expect("entry");
    assert_eq!(entry.data, sample_buildings(9));
}

#[tokio::test]
async fn test_stale_entry_served_when_network_fails() {
    let h = setup(ConnectionStatus::online()).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed cache");
    mount(&h.server, BUILDINGS_PATH, ResponseTemplate::new(500), 1).await;

    let options = LoadOptions {
        max_cache_age: Duration::ZERO,
        ..LoadOptions::default()
    };
    let result = h.service.load_buildings(&options).await.expect("load");

    assert!(result.from_cache);
    assert!(result.is_stale);
    assert_eq!(result.data, sample_buildings(1));
}

#[tokio::test]
async fn test_network_failure_without_cache_propagates() {
    let h = setup(ConnectionStatus::online()).await;
    mount(&h.server, BUILDINGS_PATH, ResponseTemplate::new(404), 1).await;

    let err = h
        .service
        .load_buildings(&LoadOptions::default())
        .await
        .expect_err("no cache to fall back to");

    match err {
        DataError::Status { status, .. } => assert_eq!(status.as_u16(), 404),
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_offline_without_cache_is_hard_failure() {
    let h = setup(ConnectionStatus::offline()).await;

    let err = h
        .service
        .load_buildings(&LoadOptions::default())
        .await
        .expect_err("nothing cached while offline");
    assert!(matches!(err, DataError::NoCachedDataOffline { .. }));
}

// ===== Payload validation =====

#[tokio::test]
async fn test_feature_collection_payload_accepted() {
    let h = setup(ConnectionStatus::online()).await;
    mount(
        &h.server,
        STREETS_PATH,
        ResponseTemplate::new(200).set_body_json(streets_payload()),
        1,
    )
    .await;

    let result = h
        .service
        .load_streets(&LoadOptions::default())
        .await
        .expect("load");
    assert_eq!(result.data, sample_streets());
}

#[tokio::test]
async fn test_invalid_format_rejected_and_not_cached() {
    let h = setup(ConnectionStatus::online()).await;
    mount(
        &h.server,
        BUILDINGS_PATH,
        ResponseTemplate::new(200).set_body_json(json!({ "foo": 1 })),
        1,
    )
    .await;

    let err = h
        .service
        .load_buildings(&LoadOptions::default())
        .await
        .expect_err("payload is neither array nor features object");
    assert!(matches!(err, DataError::InvalidFormat { .. }));

    let entry = h
        .store
        .get::<Vec<BuildingFeature>>("buildings")
        .await
        .expect("get");
    assert!(entry.is_none(), "rejected payload must not be cached");
}

// ===== Freshness window =====

#[tokio::test]
async fn test_one_second_cache_age_window() {
    let h = setup(ConnectionStatus::online()).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed cache");
    // Exactly one network attempt: the second load, after the entry aged out
    mount(&h.server, BUILDINGS_PATH, ResponseTemplate::new(500), 1).await;

    let options = LoadOptions {
        max_cache_age: Duration::from_millis(1000),
        ..LoadOptions::default()
    };

    let within_window = h.service.load_buildings(&options).await.expect("load");
    assert!(within_window.from_cache);
    assert!(!within_window.is_stale);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let aged_out = h.service.load_buildings(&options).await.expect("load");
    assert!(aged_out.from_cache);
    assert!(aged_out.is_stale);
}

// ===== Cache management surface =====

#[tokio::test]
async fn test_refresh_cache_fetches_both_and_records_sync() {
    let h = setup(ConnectionStatus::online()).await;
    mount(
        &h.server,
        BUILDINGS_PATH,
        ResponseTemplate::new(200).set_body_json(buildings_payload(4)),
        1,
    )
    .await;
    mount(
        &h.server,
        STREETS_PATH,
        ResponseTemplate::new(200).set_body_json(streets_payload()),
        1,
    )
    .await;

    h.service.refresh_cache().await.expect("refresh");

    let info = h.service.get_cache_info().await.expect("cache info");
    assert_eq!(info.buildings.expect("buildings entry").data, sample_buildings(4));
    assert_eq!(info.streets.expect("streets entry").data, sample_streets());
    assert!(info.total_size > 0);

    let available = h
        .service
        .is_data_available_offline()
        .await
        .expect("availability");
    assert!(available.buildings);
    assert!(available.streets);

    let status = h
        .service
        .sync_status()
        .await
        .expect("sync status read")
        .expect("sync status recorded");
    assert!(status.is_online);
    assert!(status.pending_updates.is_empty());
}

#[tokio::test]
async fn test_clear_cache_empties_both_resources() {
    let h = setup(ConnectionStatus::online()).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed buildings");
    h.store
        .put("streets", &sample_streets(), "1.0.0", None)
        .await
        .expect("seed streets");

    h.service.clear_cache().await.expect("clear");

    let info = h.service.get_cache_info().await.expect("cache info");
    assert!(info.buildings.is_none());
    assert!(info.streets.is_none());
    assert_eq!(info.total_size, 0);

    let available = h
        .service
        .is_data_available_offline()
        .await
        .expect("availability");
    assert!(!available.buildings);
    assert!(!available.streets);
}

// ===== Connectivity interplay =====

#[tokio::test]
async fn test_slow_link_prefers_cache_without_explicit_option() {
    let h = setup(ConnectionStatus::online().with_link("2g", 0.05)).await;
    h.store
        .put("buildings", &sample_buildings(1), "1.0.0", None)
        .await
        .expect("seed cache");
    mount(&h.server, BUILDINGS_PATH, ResponseTemplate::new(200), 0).await;

    let result = h
        .service
        .load_buildings(&LoadOptions::default())
        .await
        .expect("load");
    assert!(result.from_cache);
}

#[tokio::test]
async fn test_write_through_survives_prefer_offline_for_next_call() {
    let h = setup(ConnectionStatus::online()).await;
    mount(
        &h.server,
        BUILDINGS_PATH,
        ResponseTemplate::new(200).set_body_json(buildings_payload(5)),
        1,
    )
    .await;

    // First call fetches and writes through
    h.service
        .load_buildings(&LoadOptions::default())
        .await
        .expect("first load");

    // Device drops offline; the persisted copy still serves
    h.source.push(ConnectionStatus::offline());
    let result = h
        .service
        .load_buildings(&LoadOptions::default())
        .await
        .expect("offline load");
    assert!(result.from_cache);
    assert_eq!(result.data, sample_buildings(5));
}
