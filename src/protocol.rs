use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::*;

pub const API_BASE_URL: &str = "https://kiwi-api.nuvia.com.tr";
pub const API_TIMEOUT_SECS: u64 = 30;

pub const USER_AGENT: &str = "Cosa/1 CFNetwork/3860.200.71 Darwin/25.1.0";
pub const HEADER_AUTH_TOKEN: &str = "authToken";
pub const HEADER_PROVIDER: &str = "provider";
pub const PROVIDER: &str = "cosa";

pub const PATH_LOGIN: &str = "/api/users/login";
pub const PATH_GET_INFO: &str = "/api/users/getInfo";
pub const PATH_GET_ENDPOINT: &str = "/api/endpoints/getEndpoint";
pub const PATH_GET_FORECAST: &str = "/api/places/getForecast";
pub const PATH_SET_MODE: &str = "/api/endpoints/setMode";
pub const PATH_SET_TARGET_TEMPERATURES: &str = "/api/endpoints/setTargetTemperatures";
pub const PATH_SET_DEVICE_SETTINGS: &str = "/api/endpoints/setDeviceSettings";
pub const PATH_SET_COMBI_SETTINGS: &str = "/api/endpoints/setCombiSettings";

/// Error code the service uses for rejected credentials, on login and on
/// authenticated calls alike.
pub const ERROR_CODE_BAD_CREDENTIALS: i64 = 111;

pub const OPEN_WINDOW_DURATION_MINUTES: u32 = 30;

const TOKEN_FIELDS: &[&str] = &["authToken", "token", "authtoken", "access_token", "accessToken"];

/// A normalization routine could not find the value it was looking for in
/// any of the shapes the service has been observed to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMissing(pub &'static str);

impl fmt::Display for FieldMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no {} in response", self.0)
    }
}

/// Outcome flags common to every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Envelope {
    /// `None` when the body carries neither `ok` nor `success`.
    pub ok: Option<bool>,
    pub code: Option<i64>,
}

impl Envelope {
    pub fn is_failure(&self) -> bool {
        self.ok == Some(false)
    }

    pub fn is_bad_credentials(&self) -> bool {
        self.is_failure() && self.code == Some(ERROR_CODE_BAD_CREDENTIALS)
    }
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

fn as_code(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

pub fn parse_envelope(body: &Value) -> Envelope {
    let ok = body
        .get("ok")
        .or_else(|| body.get("success"))
        .and_then(truthy);
    let code = body
        .get("code")
        .or_else(|| body.get("errorCode"))
        .or_else(|| body.pointer("/error/code"))
        .and_then(as_code);
    Envelope { ok, code }
}

pub fn extract_token(body: &Value) -> Result<String, FieldMissing> {
    let direct = |obj: &Value| {
        TOKEN_FIELDS
            .iter()
            .find_map(|field| obj.get(*field).and_then(Value::as_str))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };
    if let Some(token) = direct(body) {
        return Ok(token);
    }
    match body.get("data") {
        Some(data @ Value::Object(_)) => direct(data).ok_or(FieldMissing("token")),
        Some(Value::String(token)) if !token.is_empty() => Ok(token.clone()),
        _ => Err(FieldMissing("token")),
    }
}

fn summary_from(value: &Value) -> Option<EndpointSummary> {
    let id = value
        .get("id")
        .or_else(|| value.get("_id"))
        .and_then(Value::as_str)?;
    Some(EndpointSummary {
        id: id.to_string(),
        name: value.get("name").and_then(Value::as_str).map(str::to_string),
    })
}

fn summaries_from(value: &Value) -> Vec<EndpointSummary> {
    match value {
        Value::Array(items) => items.iter().filter_map(summary_from).collect(),
        Value::Object(_) => summary_from(value).into_iter().collect(),
        _ => vec![],
    }
}

pub fn extract_endpoints(body: &Value) -> Result<Vec<EndpointSummary>, FieldMissing> {
    if body.is_array() {
        return Ok(summaries_from(body));
    }
    ["/endpoints", "/endpoint", "/data", "/user/endpoints", "/user/endpoint"]
        .iter()
        .find_map(|path| body.pointer(path))
        .map(summaries_from)
        .ok_or(FieldMissing("endpoint list"))
}

fn looks_like_endpoint(value: &Value) -> bool {
    value.get("mode").is_some() || value.get("id").is_some() || value.get("_id").is_some()
}

pub fn extract_endpoint_body(body: &Value) -> Result<&Value, FieldMissing> {
    for key in ["endpoint", "data"] {
        if let Some(inner) = body.get(key)
            && inner.is_object()
        {
            return Ok(inner);
        }
    }
    if looks_like_endpoint(body) {
        return Ok(body);
    }
    Err(FieldMissing("endpoint"))
}

// The vendor is loose with JSON types: flags arrive as 0/1, numbers as
// strings, ids as numbers. Every field is read leniently and a value of an
// unusable type becomes `None` instead of failing the whole body.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(super::as_number(&Value::deserialize(d)?))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(super::as_flag(&Value::deserialize(d)?))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(super::value_to_string(&Value::deserialize(d)?))
    }

    pub fn nested<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).ok())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NamedTemperaturesWire {
    #[serde(deserialize_with = "lenient::f64")]
    home: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    away: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    sleep: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    custom: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CombiSettingsWire {
    #[serde(deserialize_with = "lenient::flag")]
    child_lock: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    heating_on: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EndpointWire {
    #[serde(alias = "_id", deserialize_with = "lenient::string")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::f64")]
    temperature: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    humidity: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    mode: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    option: Option<String>,
    #[serde(deserialize_with = "lenient::f64")]
    target_temperature: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    home_temperature: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    away_temperature: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    sleep_temperature: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    custom_temperature: Option<f64>,
    #[serde(deserialize_with = "lenient::nested")]
    target_temperatures: Option<NamedTemperaturesWire>,
    #[serde(deserialize_with = "lenient::string")]
    combi_state: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    is_connected: Option<bool>,
    // An object on the detail endpoint, a bare id string in listings.
    device: Option<Value>,
    #[serde(deserialize_with = "lenient::f64")]
    rssi: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    calibration: Option<f64>,
    #[serde(deserialize_with = "lenient::flag")]
    open_window_enable: Option<bool>,
    open_window_state: Option<Value>,
    #[serde(deserialize_with = "lenient::flag")]
    child_lock: Option<bool>,
    #[serde(deserialize_with = "lenient::nested")]
    combi_settings: Option<CombiSettingsWire>,
    #[serde(deserialize_with = "lenient::f64")]
    battery_voltage: Option<f64>,
    power_state: Option<Value>,
    place: Option<Value>,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    truthy(value).or_else(|| match value.as_str()?.trim() {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        _ => None,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn window_open(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "open" | "on" | "true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

pub fn parse_device(body: &Value) -> Result<DeviceSnapshot, String> {
    let endpoint = extract_endpoint_body(body).map_err(|e| e.to_string())?;
    let wire: EndpointWire =
        serde_json::from_value(endpoint.clone()).map_err(|e| format!("endpoint body: {e}"))?;

    let mode = wire.mode.as_deref().and_then(|m| {
        let parsed = Mode::from_wire_str(m);
        if parsed.is_none() {
            debug!(mode = m, "unrecognized mode");
        }
        parsed
    });
    let option = wire.option.as_deref().and_then(|o| {
        let parsed = ManualOption::from_wire_str(o);
        if parsed.is_none() {
            debug!(option = o, "unrecognized option");
        }
        parsed
    });

    let nested = wire.target_temperatures.unwrap_or_default();
    let device = wire.device.as_ref().filter(|d| d.is_object());
    let combi = wire.combi_settings.unwrap_or_default();

    Ok(DeviceSnapshot {
        id: wire.id.unwrap_or_default(),
        name: wire.name,
        temperature: wire.temperature,
        humidity: wire.humidity,
        mode,
        option,
        home_temperature: wire.home_temperature.or(nested.home),
        away_temperature: wire.away_temperature.or(nested.away),
        sleep_temperature: wire.sleep_temperature.or(nested.sleep),
        custom_temperature: wire.custom_temperature.or(nested.custom),
        target_temperature: wire.target_temperature,
        combi_heating: wire.combi_state.as_deref() == Some("on"),
        connected: device
            .and_then(|d| d.get("isConnected"))
            .and_then(as_flag)
            .or(wire.is_connected)
            .unwrap_or(false),
        rssi: wire.rssi.map(|r| r.round() as i64),
        calibration: wire.calibration,
        open_window_enabled: wire.open_window_enable.unwrap_or(false),
        open_window_open: wire.open_window_state.as_ref().is_some_and(window_open),
        child_lock: combi.child_lock.or(wire.child_lock).unwrap_or(false),
        combi_heating_enabled: combi.heating_on.unwrap_or(true),
        battery_voltage: wire.battery_voltage,
        power_state: wire.power_state.as_ref().and_then(value_to_string),
        firmware_version: device
            .and_then(|d| d.get("version"))
            .and_then(value_to_string),
        place: wire.place.as_ref().and_then(|p| {
            p.as_str()
                .map(str::to_string)
                .or_else(|| p.get("id").and_then(Value::as_str).map(str::to_string))
        }),
        forecast: Forecast::default(),
    })
}

/// Forecast data is cosmetic; anything unreadable becomes an empty forecast.
pub fn parse_forecast(body: &Value) -> Forecast {
    let inner = ["/forecast", "/data"]
        .iter()
        .find_map(|path| body.pointer(path))
        .filter(|v| v.get("hourly").is_some())
        .unwrap_or(body);
    serde_json::from_value(inner.clone()).unwrap_or_default()
}

pub fn login_body(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

pub fn endpoint_body(endpoint_id: &str) -> Value {
    json!({ "endpoint": endpoint_id })
}

pub fn forecast_body(place_id: &str) -> Value {
    json!({ "place": place_id })
}

pub fn set_mode_body(endpoint_id: &str, mode: Mode, option: Option<ManualOption>) -> Value {
    let mut body = json!({
        "endpoint": endpoint_id,
        "mode": mode.as_wire_str(),
    });
    if let Some(option) = option {
        body["option"] = json!(option.as_wire_str());
    }
    body
}

pub fn set_target_temperatures_body(endpoint_id: &str, temps: &TargetTemperatures) -> Value {
    json!({
        "endpoint": endpoint_id,
        "targetTemperatures": {
            "home": temps.home,
            "away": temps.away,
            "sleep": temps.sleep,
            "custom": temps.custom,
        }
    })
}

pub fn set_device_settings_body(
    endpoint_id: &str,
    calibration: f64,
    open_window_enabled: Option<bool>,
    open_window_duration: Option<u32>,
) -> Value {
    let mut body = json!({
        "endpoint": endpoint_id,
        "calibration": calibration,
    });
    if let Some(enabled) = open_window_enabled {
        body["openWindowEnable"] = json!(enabled);
    }
    if let Some(duration) = open_window_duration {
        body["openWindowDuration"] = json!(duration);
    }
    body
}

pub fn set_combi_settings_body(endpoint_id: &str, child_lock: bool, heating_on: bool) -> Value {
    json!({
        "endpoint": endpoint_id,
        "combiSettings": {
            "childLock": child_lock,
            "heatingOn": heating_on,
        }
    })
}

/// Copy of `body` safe to write to a log file.
pub fn redact(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let hidden = k == "password" || TOKEN_FIELDS.contains(&k.as_str());
                    let v = if hidden { json!("***") } else { redact(v) };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shapes() {
        let fixtures = [
            json!({"authToken": "a1"}),
            json!({"token": "a1"}),
            json!({"authtoken": "a1"}),
            json!({"access_token": "a1"}),
            json!({"accessToken": "a1"}),
            json!({"success": true, "data": {"authToken": "a1", "endpoints": [{"id": "end_001"}]}}),
            json!({"data": {"token": "a1"}}),
            json!({"data": "a1"}),
        ];
        for body in fixtures {
            assert_eq!(extract_token(&body), Ok("a1".to_string()), "{body}");
        }
    }

    #[test]
    fn token_missing() {
        assert_eq!(extract_token(&json!({"ok": 1})), Err(FieldMissing("token")));
        assert_eq!(extract_token(&json!({"data": {"user": {}}})), Err(FieldMissing("token")));
        assert_eq!(extract_token(&json!({"authToken": ""})), Err(FieldMissing("token")));
    }

    #[test]
    fn endpoint_list_shapes() {
        let item = json!({"id": "66e0", "name": "Evim"});
        let underscored = json!({"_id": "66e0", "name": "Evim"});
        let fixtures = [
            json!([item]),
            json!({"endpoints": [item], "ok": 1}),
            json!({"endpoints": item}),
            json!({"endpoint": [underscored]}),
            json!({"data": [item]}),
            json!({"user": {"endpoints": [item]}}),
            json!({"user": {"endpoint": underscored}}),
        ];
        for body in fixtures {
            let list = extract_endpoints(&body).unwrap();
            assert_eq!(list.len(), 1, "{body}");
            assert_eq!(list[0].id, "66e0");
            assert_eq!(list[0].name.as_deref(), Some("Evim"));
        }
        assert!(extract_endpoints(&json!({"user": {"name": "x"}})).is_err());
    }

    #[test]
    fn envelope_flags() {
        assert_eq!(parse_envelope(&json!({"ok": 1})).ok, Some(true));
        assert_eq!(parse_envelope(&json!({"ok": 0})).ok, Some(false));
        assert_eq!(parse_envelope(&json!({"success": false})).ok, Some(false));
        assert_eq!(parse_envelope(&json!({})).ok, None);

        let bad = parse_envelope(&json!({"ok": 0, "code": 111}));
        assert!(bad.is_bad_credentials());
        let bad = parse_envelope(&json!({"success": 0, "error": {"code": "111"}}));
        assert!(bad.is_bad_credentials());
        let other = parse_envelope(&json!({"ok": 0, "errorCode": 500}));
        assert!(other.is_failure());
        assert!(!other.is_bad_credentials());
    }

    #[test]
    fn device_from_detail_envelope() {
        let body = json!({
            "ok": 1,
            "endpoint": {
                "id": "end_001",
                "name": "Evim",
                "temperature": 20.5,
                "humidity": 40,
                "mode": "manual",
                "option": "home",
                "homeTemperature": 21,
                "awayTemperature": 15,
                "sleepTemperature": 18,
                "customTemperature": 20,
                "targetTemperature": 21,
                "combiState": "on",
                "device": {"isConnected": true, "version": "1.4.2"},
                "rssi": -61,
                "calibration": -0.5,
                "openWindowEnable": true,
                "combiSettings": {"childLock": true},
                "batteryVoltage": 2.9,
                "powerState": "high",
                "place": "place_9"
            }
        });
        let snap = parse_device(&body).unwrap();
        assert_eq!(snap.id, "end_001");
        assert_eq!(snap.mode, Some(Mode::Manual));
        assert_eq!(snap.option, Some(ManualOption::Home));
        assert_eq!(snap.home_temperature, Some(21.0));
        assert_eq!(snap.sleep_temperature, Some(18.0));
        assert!(snap.combi_heating);
        assert!(snap.connected);
        assert_eq!(snap.rssi, Some(-61));
        assert_eq!(snap.firmware_version.as_deref(), Some("1.4.2"));
        assert!(snap.open_window_enabled);
        assert!(snap.child_lock);
        assert!(snap.combi_heating_enabled);
        assert_eq!(snap.place.as_deref(), Some("place_9"));
    }

    #[test]
    fn device_nested_target_temperatures_and_listing_shape() {
        let body = json!({
            "endpoint": {
                "id": "end_001",
                "option": "home",
                "targetTemperatures": {"home": 21, "away": 16},
                "device": "65a14f74774cc50932c98980",
                "isConnected": true
            }
        });
        let snap = parse_device(&body).unwrap();
        assert_eq!(snap.home_temperature, Some(21.0));
        assert_eq!(snap.away_temperature, Some(16.0));
        assert_eq!(snap.sleep_temperature, None);
        assert!(snap.connected);
        assert_eq!(snap.firmware_version, None);
    }

    #[test]
    fn device_unknown_vocabulary_is_tolerated() {
        let body = json!({"data": {"id": "x", "mode": "party", "option": "disco"}});
        let snap = parse_device(&body).unwrap();
        assert_eq!(snap.mode, None);
        assert_eq!(snap.option, None);
        assert_eq!(snap.hvac_mode(), HvacMode::Heat);
    }

    #[test]
    fn device_fields_with_loose_types() {
        let body = json!({"endpoint": {
            "id": 42,
            "mode": "manual",
            "option": "home",
            "homeTemperature": "22.5",
            "temperature": " 20.1 ",
            "openWindowEnable": 1,
            "childLock": "0",
            "batteryVoltage": "2.9",
            "rssi": "-61",
            "calibration": [0.5],
            "targetTemperatures": "n/a",
            "combiSettings": {"childLock": 1, "heatingOn": 0},
            "device": {"isConnected": 1}
        }});
        let snap = parse_device(&body).unwrap();
        assert_eq!(snap.id, "42");
        assert_eq!(snap.home_temperature, Some(22.5));
        assert_eq!(snap.temperature, Some(20.1));
        assert!(snap.open_window_enabled);
        assert!(snap.child_lock);
        assert!(!snap.combi_heating_enabled);
        assert!(snap.connected);
        assert_eq!(snap.battery_voltage, Some(2.9));
        assert_eq!(snap.rssi, Some(-61));
        assert_eq!(snap.calibration, None);
        assert_eq!(snap.active_target(), Some(22.5));
    }

    #[test]
    fn flags_from_numbers_and_strings() {
        for (raw, expected) in [
            (json!(1), Some(true)),
            (json!(0), Some(false)),
            (json!("on"), Some(true)),
            (json!("false"), Some(false)),
            (json!(true), Some(true)),
            (json!({}), None),
        ] {
            assert_eq!(as_flag(&raw), expected, "{raw}");
        }
    }

    #[test]
    fn device_missing_body() {
        assert!(parse_device(&json!({"ok": 1})).is_err());
    }

    #[test]
    fn forecast_shapes() {
        let hourly = json!({"hourly": [{"temperature": 7.5, "humidity": 0.81, "icon": "rain"}]});
        for body in [hourly.clone(), json!({"forecast": hourly}), json!({"data": hourly})] {
            let forecast = parse_forecast(&body);
            let now = forecast.current().unwrap();
            assert_eq!(now.temperature, Some(7.5));
            assert_eq!(now.icon.as_deref(), Some("rain"));
        }
        assert_eq!(parse_forecast(&json!("garbage")), Forecast::default());
    }

    #[test]
    fn set_mode_omits_missing_option() {
        let body = set_mode_body("e1", Mode::Schedule, None);
        assert_eq!(body["mode"], "schedule");
        assert!(body.get("option").is_none());

        let body = set_mode_body("e1", Mode::Manual, Some(ManualOption::Frozen));
        assert_eq!(body["option"], "frozen");
    }

    #[test]
    fn target_temperatures_payload() {
        let temps = TargetTemperatures { home: 23.0, away: 15.0, sleep: 18.0, custom: 20.0 };
        let body = set_target_temperatures_body("e1", &temps);
        assert_eq!(
            body["targetTemperatures"],
            json!({"home": 23.0, "away": 15.0, "sleep": 18.0, "custom": 20.0})
        );
    }

    #[test]
    fn device_settings_optional_fields() {
        let body = set_device_settings_body("e1", 0.5, None, None);
        assert!(body.get("openWindowEnable").is_none());
        let body = set_device_settings_body("e1", 0.5, Some(true), Some(30));
        assert_eq!(body["openWindowEnable"], true);
        assert_eq!(body["openWindowDuration"], 30);
    }

    #[test]
    fn redact_hides_secrets() {
        let body = json!({"email": "a@b.c", "password": "hunter2", "data": {"authToken": "t"}});
        let redacted = redact(&body);
        assert_eq!(redacted["email"], "a@b.c");
        assert_eq!(redacted["password"], "***");
        assert_eq!(redacted["data"]["authToken"], "***");
    }
}
