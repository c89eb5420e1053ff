mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::*;
use cosa_thermostat::{CoordinatorEntity, EntryConfig, Error, IntegrationManager};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EntryConfig {
    let mut config = EntryConfig::new("a@b.c", "pw");
    config.base_url = Some(server.uri());
    config.settle_delay_ms = 0;
    config
}

async fn mount_endpoints(server: &MockServer, endpoints: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/users/getInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1, "endpoints": endpoints})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn setup_resolves_single_device_and_builds_entities() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_endpoints(&server, json!([{"id": DEVICE, "name": "Evim"}])).await;
    mount_detail(&server, "tok", detail_body()).await;

    let mut manager = IntegrationManager::new();
    let id = manager.setup(config_for(&server)).await.unwrap();
    assert_eq!(manager.len(), 1);

    let coordinator = manager.coordinator(id).unwrap();
    assert_eq!(coordinator.device_id(), DEVICE);

    let entities = manager.entities(id).unwrap();
    let all = entities.all();
    assert_eq!(all.len(), 1 + 5 + 2 + 17 + 2);

    let prefix = format!("cosa_{id}_");
    let ids: HashSet<String> = all.iter().map(|e| e.unique_id().to_string()).collect();
    assert_eq!(ids.len(), all.len());
    assert!(ids.iter().all(|u| u.starts_with(&prefix)));
    assert!(entities.find(&format!("{prefix}climate")).is_some());
    assert!(all.iter().all(|e| e.available()));
}

#[tokio::test]
async fn configured_endpoint_skips_discovery() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_detail(&server, "tok", detail_body()).await;
    Mock::given(method("POST"))
        .and(path("/api/users/getInfo"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.endpoint_id = Some(DEVICE.to_string());
    let mut manager = IntegrationManager::new();
    manager.setup(config).await.unwrap();
}

#[tokio::test]
async fn account_without_devices() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_endpoints(&server, json!([])).await;

    let mut manager = IntegrationManager::new();
    let err = manager.setup(config_for(&server)).await.unwrap_err();
    assert!(matches!(err, Error::NoDevices), "{err:?}");
    assert!(manager.is_empty());
}

#[tokio::test]
async fn account_with_several_devices() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_endpoints(&server, json!([{"id": "end_001"}, {"id": "end_002"}])).await;

    let mut manager = IntegrationManager::new();
    match manager.setup(config_for(&server)).await {
        Err(Error::AmbiguousDevice(ids)) => assert_eq!(ids, vec!["end_001", "end_002"]),
        other => panic!("unexpected {:?}", other.map(|id| id.to_string())),
    }
    assert!(manager.is_empty());
}

#[tokio::test]
async fn bad_credentials_abort_setup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 0, "code": 111})))
        .mount(&server)
        .await;

    let mut manager = IntegrationManager::new();
    let err = manager.setup(config_for(&server)).await.unwrap_err();
    assert!(err.is_authentication());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn failed_first_refresh_aborts_setup() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_endpoints(&server, json!([{"id": DEVICE}])).await;
    Mock::given(method("POST"))
        .and(path("/api/endpoints/getEndpoint"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut manager = IntegrationManager::new();
    assert!(manager.setup(config_for(&server)).await.is_err());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.scan_interval_secs = 0;

    let mut manager = IntegrationManager::new();
    let err = manager.setup(config).await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
}

#[tokio::test]
async fn unload_removes_entry() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_endpoints(&server, json!([{"id": DEVICE}])).await;
    mount_detail(&server, "tok", detail_body()).await;

    let mut manager = IntegrationManager::new();
    let id = manager.setup(config_for(&server)).await.unwrap();
    manager.unload(id).unwrap();
    assert!(manager.is_empty());
    assert!(manager.entities(id).is_none());

    let err = manager.unload(id).unwrap_err();
    assert!(matches!(err, Error::UnknownSetup(_)));
}

#[tokio::test]
async fn refreshes_reach_entities() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    mount_endpoints(&server, json!([{"id": DEVICE}])).await;
    Mock::given(method("POST"))
        .and(path("/api/endpoints/getEndpoint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_detail(&server, "tok", detail_with(json!({"homeTemperature": 23}))).await;
    Mock::given(method("POST"))
        .and(path("/api/endpoints/setTargetTemperatures"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = IntegrationManager::new();
    let id = manager.setup(config_for(&server)).await.unwrap();
    let climate = manager.entities(id).unwrap().climate.clone();

    assert!(climate.set_temperature(23.0).await.unwrap());

    let confirmed = tokio::time::timeout(Duration::from_secs(2), async {
        while climate.has_pending_overrides() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(confirmed.is_ok(), "override was never reconciled");
    assert_eq!(climate.target_temperature(), Some(23.0));
}
