use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{self, parse_envelope, API_BASE_URL, API_TIMEOUT_SECS, USER_AGENT};
use crate::types::*;
use crate::{Error, Result};

pub struct CosaClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl Default for CosaClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CosaClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            timeout: Duration::from_secs(API_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<CosaClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(CosaClient {
            http,
            base_url: self.base_url,
            logger,
        })
    }
}

/// Stateless wrapper over the COSA cloud endpoints. Every call takes the
/// bearer token explicitly and performs exactly one round trip; retry
/// policy belongs to the caller.
pub struct CosaClient {
    http: reqwest::Client,
    base_url: String,
    logger: Option<Mutex<MessageLogger>>,
}

impl CosaClient {
    pub fn builder() -> CosaClientBuilder {
        CosaClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logs in and returns a bearer token.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<String> {
        let body = protocol::login_body(email, password);
        let response = self.post(protocol::PATH_LOGIN, None, &body).await?;

        let envelope = parse_envelope(&response);
        if envelope.is_bad_credentials() {
            return Err(Error::Authentication("invalid email or password".to_string()));
        }
        if envelope.is_failure() {
            return Err(Error::Protocol(format!("login rejected (code {:?})", envelope.code)));
        }

        let token = protocol::extract_token(&response).map_err(|e| {
            debug!(keys = ?response.as_object().map(|o| o.keys().collect::<Vec<_>>()), "login response without token");
            Error::Protocol(e.to_string())
        })?;
        info!("logged in to COSA cloud");
        Ok(token)
    }

    /// Thermostats registered on the account.
    pub async fn list_endpoints(&self, token: &str) -> Result<Vec<EndpointSummary>> {
        let body = serde_json::json!({});
        let response = self.post(protocol::PATH_GET_INFO, Some(token), &body).await?;
        reject_failed_envelope(&response)?;
        protocol::extract_endpoints(&response).map_err(|e| Error::Protocol(e.to_string()))
    }

    pub async fn fetch_device(&self, token: &str, device_id: &str) -> Result<DeviceSnapshot> {
        let body = protocol::endpoint_body(device_id);
        let response = self.post(protocol::PATH_GET_ENDPOINT, Some(token), &body).await?;

        if let Some(ref logger) = self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_poll(200, &response);
        }

        reject_failed_envelope(&response)?;
        protocol::parse_device(&response).map_err(Error::Protocol)
    }

    /// Best effort: any failure yields an empty forecast.
    pub async fn fetch_forecast(&self, token: &str, place_id: &str) -> Forecast {
        let body = protocol::forecast_body(place_id);
        match self.post(protocol::PATH_GET_FORECAST, Some(token), &body).await {
            Ok(response) => protocol::parse_forecast(&response),
            Err(e) => {
                debug!(place = place_id, error = %e, "forecast unavailable");
                Forecast::default()
            }
        }
    }

    pub async fn send_mode(
        &self,
        token: &str,
        device_id: &str,
        mode: Mode,
        option: Option<ManualOption>,
    ) -> Result<bool> {
        let body = protocol::set_mode_body(device_id, mode, option);
        self.send_command("set_mode", protocol::PATH_SET_MODE, token, device_id, body)
            .await
    }

    pub async fn send_target_temperatures(
        &self,
        token: &str,
        device_id: &str,
        home: f64,
        away: f64,
        sleep: f64,
        custom: f64,
    ) -> Result<bool> {
        let temps = TargetTemperatures { home, away, sleep, custom };
        let body = protocol::set_target_temperatures_body(device_id, &temps);
        self.send_command(
            "set_target_temperatures",
            protocol::PATH_SET_TARGET_TEMPERATURES,
            token,
            device_id,
            body,
        )
        .await
    }

    pub async fn send_device_settings(
        &self,
        token: &str,
        device_id: &str,
        calibration: f64,
        open_window_enabled: Option<bool>,
        open_window_duration: Option<u32>,
    ) -> Result<bool> {
        let body = protocol::set_device_settings_body(
            device_id,
            calibration,
            open_window_enabled,
            open_window_duration,
        );
        self.send_command(
            "set_device_settings",
            protocol::PATH_SET_DEVICE_SETTINGS,
            token,
            device_id,
            body,
        )
        .await
    }

    pub async fn send_combi_settings(
        &self,
        token: &str,
        device_id: &str,
        child_lock: bool,
        heating_on: bool,
    ) -> Result<bool> {
        let body = protocol::set_combi_settings_body(device_id, child_lock, heating_on);
        self.send_command(
            "set_combi_settings",
            protocol::PATH_SET_COMBI_SETTINGS,
            token,
            device_id,
            body,
        )
        .await
    }

    // -- Helpers --

    async fn send_command(
        &self,
        action: &str,
        path: &str,
        token: &str,
        device_id: &str,
        body: Value,
    ) -> Result<bool> {
        if let Some(ref logger) = self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_command(action, device_id, &body);
        }

        let response = self.post(path, Some(token), &body).await?;
        if parse_envelope(&response).is_failure() {
            warn!(action, response = %response, "command rejected");
            return Ok(false);
        }
        info!(action, "command accepted");
        Ok(true)
    }

    /// One POST round trip. `token` selects between the login flavour
    /// (401 means bad credentials) and the authenticated flavour (401 or
    /// the credentials error code means the session expired).
    async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");

        if let Some(ref logger) = self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_request(path, body);
        }

        let mut request = self
            .http
            .post(&url)
            .header(protocol::HEADER_PROVIDER, protocol::PROVIDER)
            .json(body);
        if let Some(token) = token {
            request = request.header(protocol::HEADER_AUTH_TOKEN, token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        trace!(status = status.as_u16(), body = %text, "response");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(match token {
                Some(_) => Error::SessionExpired,
                None => Error::Authentication(preview(&text)),
            });
        }
        if !status.is_success() {
            return Err(Error::Protocol(format!("HTTP {status}: {}", preview(&text))));
        }

        let response: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| Error::Protocol(format!("{e} (body preview: {:?})", preview(&text))))?
        };

        if token.is_some() && parse_envelope(&response).is_bad_credentials() {
            return Err(Error::SessionExpired);
        }
        Ok(response)
    }
}

fn reject_failed_envelope(response: &Value) -> Result<()> {
    let envelope = parse_envelope(response);
    if envelope.is_failure() {
        return Err(Error::Protocol(format!(
            "request failed (code {})",
            envelope.code.map_or_else(|| "none".to_string(), |c| c.to_string())
        )));
    }
    Ok(())
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
