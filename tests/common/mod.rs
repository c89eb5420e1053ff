#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cosa_thermostat::{Coordinator, CosaClient, Credentials};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEVICE: &str = "end_001";

/// Manual mode, home option, setpoints 21/15/18/20.
pub fn detail_body() -> Value {
    detail_with(json!({}))
}

/// `detail_body` with the given endpoint fields overridden.
pub fn detail_with(overrides: Value) -> Value {
    let mut endpoint = json!({
        "id": DEVICE,
        "name": "Evim",
        "temperature": 20.5,
        "humidity": 41,
        "mode": "manual",
        "option": "home",
        "homeTemperature": 21,
        "awayTemperature": 15,
        "sleepTemperature": 18,
        "customTemperature": 20,
        "targetTemperature": 21,
        "combiState": "off",
        "calibration": 0.0,
        "openWindowEnable": false,
        "combiSettings": {"childLock": false, "heatingOn": true},
        "device": {"isConnected": true, "version": "1.4.2"}
    });
    if let (Some(fields), Some(extra)) = (endpoint.as_object_mut(), overrides.as_object()) {
        for (k, v) in extra {
            fields.insert(k.clone(), v.clone());
        }
    }
    json!({"ok": 1, "endpoint": endpoint})
}

pub fn ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": 1}))
}

pub async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1, "authToken": token})))
        .mount(server)
        .await;
}

pub async fn mount_detail(server: &MockServer, token: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/endpoints/getEndpoint"))
        .and(header("authToken", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn client(server: &MockServer) -> CosaClient {
    CosaClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client should build")
}

/// Coordinator with no settle delay, optionally seeded with a token.
pub fn coordinator(server: &MockServer, token: Option<&str>) -> Arc<Coordinator> {
    let mut builder = Coordinator::builder(client(server), Credentials::new("a@b.c", "pw"), DEVICE)
        .settle_delay(Duration::ZERO);
    if let Some(token) = token {
        builder = builder.token(token);
    }
    Arc::new(builder.build())
}

pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
