//! The thermostat as a climate device: HVAC mode, presets and a single
//! target temperature layered over the vendor's four named setpoints.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::entity::{check_range, unique_id, CoordinatorEntity};
use crate::optimistic::{same, within, Optimistic, TEMPERATURE_TOLERANCE};
use crate::types::*;
use crate::Result;

pub const MIN_TEMP: f64 = 5.0;
pub const MAX_TEMP: f64 = 32.0;
pub const TEMP_STEP: f64 = 0.5;

const DEFAULT_NAME: &str = "COSA Termostat";

/// A setpoint written by `set_temperature`, tied to the named temperature
/// it landed on. Only that field can confirm it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingTarget {
    option: ManualOption,
    value: f64,
}

impl PendingTarget {
    fn confirmed_by(&self, observed: &PendingTarget) -> bool {
        self.option == observed.option
            && within(TEMPERATURE_TOLERANCE)(&self.value, &observed.value)
    }
}

pub struct ClimateEntity {
    coordinator: Arc<Coordinator>,
    unique_id: String,
    name: String,
    target: Optimistic<PendingTarget>,
    hvac_mode: Optimistic<HvacMode>,
    preset: Optimistic<Preset>,
}

impl ClimateEntity {
    pub fn new(coordinator: Arc<Coordinator>, setup_id: &str) -> Self {
        let name = coordinator
            .snapshot()
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        Self {
            coordinator,
            unique_id: unique_id(setup_id, "climate"),
            name,
            target: Optimistic::new(),
            hvac_mode: Optimistic::new(),
            preset: Optimistic::new(),
        }
    }

    pub fn hvac_modes(&self) -> &'static [HvacMode] {
        &[HvacMode::Off, HvacMode::Heat]
    }

    pub fn preset_modes(&self) -> &'static [Preset] {
        &Preset::ALL
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.snapshot().and_then(|s| s.temperature)
    }

    pub fn current_humidity(&self) -> Option<i64> {
        self.snapshot()
            .and_then(|s| s.humidity)
            .filter(|h| *h != 0.0)
            .map(|h| h.round() as i64)
    }

    /// A pending setpoint first, then the setpoint of a pending preset,
    /// then whatever the thermostat is heating towards.
    pub fn target_temperature(&self) -> Option<f64> {
        if let Some(pending) = self.target.get() {
            return Some(pending.value);
        }
        let snapshot = self.snapshot()?;
        self.preset
            .get()
            .map(|preset| preset.manual_option().unwrap_or(ManualOption::Home))
            .and_then(|option| snapshot.named_temperature(option))
            .or_else(|| snapshot.active_target())
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.hvac_mode
            .get()
            .or_else(|| self.snapshot().map(|s| s.hvac_mode()))
            .unwrap_or(HvacMode::Heat)
    }

    pub fn hvac_action(&self) -> HvacAction {
        self.snapshot()
            .map_or(HvacAction::Idle, |s| s.hvac_action())
    }

    pub fn preset_mode(&self) -> Option<Preset> {
        self.preset
            .display(self.snapshot().and_then(|s| s.preset()))
    }

    pub fn icon(&self) -> &'static str {
        let snapshot = self.snapshot();
        if snapshot.as_ref().is_some_and(|s| s.combi_heating) {
            return "mdi:fire";
        }
        if self.hvac_mode.get() == Some(HvacMode::Off)
            || snapshot.as_ref().is_some_and(|s| s.hvac_mode() == HvacMode::Off)
        {
            return "mdi:snowflake";
        }
        self.preset_mode().map_or("mdi:thermostat", |p| p.icon())
    }

    pub fn extra_attributes(&self) -> Map<String, Value> {
        let Some(s) = self.snapshot() else {
            return Map::new();
        };
        let weather = s.forecast.current().cloned().unwrap_or_default();
        let attributes = json!({
            "mode": s.mode.map(|m| m.as_wire_str()),
            "option": s.option.map(|o| o.as_wire_str()),
            "combi_state": if s.combi_heating { "on" } else { "off" },
            "home_temperature": s.home_temperature,
            "away_temperature": s.away_temperature,
            "sleep_temperature": s.sleep_temperature,
            "custom_temperature": s.custom_temperature,
            "firmware_version": s.firmware_version,
            "battery_voltage": s.battery_voltage,
            "power_state": s.power_state,
            "rssi": s.rssi,
            "child_lock": s.child_lock,
            "open_window_state": s.open_window_open,
            "outdoor_temperature": weather.temperature,
            "outdoor_humidity": weather.humidity,
            "weather_icon": weather.icon,
            "preset_icon": self.preset_mode().map_or("mdi:thermostat", |p| p.icon()),
        });
        match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Shows `value` right away, then writes the full setpoint tuple with
    /// `value` substituted for the active named temperature.
    pub async fn set_temperature(&self, value: f64) -> Result<bool> {
        check_range("temperature", value, MIN_TEMP, MAX_TEMP)?;
        let Some(snapshot) = self.snapshot() else {
            return Err(crate::Error::NotReady);
        };

        let option = snapshot.editable_option();
        self.target.set(PendingTarget { option, value });
        let temps = snapshot.target_temperatures().with(option, value);
        info!(entity = %self.unique_id, ?option, value, "set temperature");

        match self.coordinator.set_temperatures(temps).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(entity = %self.unique_id, "temperature write rejected, reverting");
                self.target.clear();
                Ok(false)
            }
            Err(e) => {
                self.target.clear();
                Err(e)
            }
        }
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<bool> {
        self.hvac_mode.set(mode);
        if mode == HvacMode::Off {
            self.preset.clear();
        }
        let (wire_mode, option) = mode.to_wire();
        let result = self.coordinator.set_mode(wire_mode, option).await;
        if !matches!(result, Ok(true)) {
            self.hvac_mode.clear();
            self.preset.clear();
        }
        result
    }

    pub async fn turn_on(&self) -> Result<bool> {
        self.set_hvac_mode(HvacMode::Heat).await
    }

    pub async fn turn_off(&self) -> Result<bool> {
        self.set_hvac_mode(HvacMode::Off).await
    }

    /// While the preset is pending the displayed target comes from the
    /// preset's named temperature.
    pub async fn set_preset_mode(&self, preset: Preset) -> Result<bool> {
        self.target.clear();
        self.preset.set(preset);
        self.hvac_mode.set(HvacMode::Heat);

        let (mode, option) = preset.to_wire();
        let result = self.coordinator.set_mode(mode, option).await;
        if !matches!(result, Ok(true)) {
            self.preset.clear();
            self.hvac_mode.clear();
        }
        result
    }

    pub fn has_pending_overrides(&self) -> bool {
        self.target.is_pending() || self.hvac_mode.is_pending() || self.preset.is_pending()
    }
}

impl CoordinatorEntity for ClimateEntity {
    fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn handle_coordinator_update(&self) {
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        if let Some(PendingTarget { option, .. }) = self.target.get() {
            let observed = snapshot
                .named_temperature(option)
                .map(|value| PendingTarget { option, value });
            self.target
                .reconcile(observed.as_ref(), PendingTarget::confirmed_by);
        }
        self.hvac_mode.reconcile(Some(&snapshot.hvac_mode()), same);
        self.preset.reconcile(snapshot.preset().as_ref(), same);
    }
}
