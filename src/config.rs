use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinator::{Credentials, DEFAULT_SCAN_INTERVAL, DEFAULT_SETTLE_DELAY};
use crate::logger::MessageLogMode;
use crate::{Error, Result};

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY.as_millis() as u64
}

/// One configured thermostat account, as the host persists it.
#[derive(Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    pub email: String,
    pub password: String,
    /// Thermostat to bind to. Resolved from the account when absent.
    #[serde(default, alias = "endpointId", alias = "endpoint")]
    pub endpoint_id: Option<String>,
    #[serde(default, alias = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(default = "default_scan_interval_secs", alias = "scanIntervalSecs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_settle_delay_ms", alias = "settleDelayMs")]
    pub settle_delay_ms: u64,
    /// NDJSON traffic log, written in diffed mode.
    #[serde(default, alias = "messageLog")]
    pub message_log: Option<String>,
}

impl fmt::Debug for EntryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryConfig")
            .field("email", &self.email)
            .field("password", &"***")
            .field("endpoint_id", &self.endpoint_id)
            .field("base_url", &self.base_url)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("message_log", &self.message_log)
            .finish()
    }
}

impl EntryConfig {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            endpoint_id: None,
            base_url: None,
            scan_interval_secs: default_scan_interval_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            message_log: None,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: EntryConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(Error::InvalidConfig("email is empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::InvalidConfig("password is empty".to_string()));
        }
        if self.scan_interval_secs == 0 {
            return Err(Error::InvalidConfig("scan_interval_secs must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub(crate) fn message_log_mode(&self) -> Option<(MessageLogMode, &str)> {
        self.message_log
            .as_deref()
            .map(|path| (MessageLogMode::Diffed, path))
    }
}
