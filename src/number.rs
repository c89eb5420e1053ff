use std::sync::Arc;

use tracing::info;

use crate::climate::{MAX_TEMP, MIN_TEMP, TEMP_STEP};
use crate::coordinator::Coordinator;
use crate::entity::{check_range, unique_id, CoordinatorEntity};
use crate::optimistic::{within, Optimistic, CALIBRATION_TOLERANCE, TEMPERATURE_TOLERANCE};
use crate::types::{DeviceSnapshot, ManualOption};
use crate::Result;

pub const CALIBRATION_MIN: f64 = -5.0;
pub const CALIBRATION_MAX: f64 = 5.0;
pub const CALIBRATION_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    /// Offset added to the measured room temperature.
    Calibration,
    /// One of the four named setpoints.
    PresetTemperature(ManualOption),
}

impl NumberKind {
    pub const ALL: [NumberKind; 5] = [
        NumberKind::Calibration,
        NumberKind::PresetTemperature(ManualOption::Home),
        NumberKind::PresetTemperature(ManualOption::Away),
        NumberKind::PresetTemperature(ManualOption::Sleep),
        NumberKind::PresetTemperature(ManualOption::Custom),
    ];

    pub fn key(&self) -> &'static str {
        match self {
            NumberKind::Calibration => "calibration",
            NumberKind::PresetTemperature(ManualOption::Home) => "home_temperature",
            NumberKind::PresetTemperature(ManualOption::Away) => "away_temperature",
            NumberKind::PresetTemperature(ManualOption::Sleep) => "sleep_temperature",
            NumberKind::PresetTemperature(_) => "custom_temperature",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumberKind::Calibration => "Temperature calibration",
            NumberKind::PresetTemperature(ManualOption::Home) => "Home temperature",
            NumberKind::PresetTemperature(ManualOption::Away) => "Away temperature",
            NumberKind::PresetTemperature(ManualOption::Sleep) => "Sleep temperature",
            NumberKind::PresetTemperature(_) => "Custom temperature",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            NumberKind::Calibration => "mdi:thermometer-check",
            NumberKind::PresetTemperature(ManualOption::Home) => "mdi:home-thermometer",
            NumberKind::PresetTemperature(ManualOption::Away) => "mdi:home-export-outline",
            NumberKind::PresetTemperature(ManualOption::Sleep) => "mdi:bed",
            NumberKind::PresetTemperature(_) => "mdi:thermometer-lines",
        }
    }

    /// `(min, max, step)`
    pub fn range(&self) -> (f64, f64, f64) {
        match self {
            NumberKind::Calibration => (CALIBRATION_MIN, CALIBRATION_MAX, CALIBRATION_STEP),
            NumberKind::PresetTemperature(_) => (MIN_TEMP, MAX_TEMP, TEMP_STEP),
        }
    }

    fn tolerance(&self) -> f64 {
        match self {
            NumberKind::Calibration => CALIBRATION_TOLERANCE,
            NumberKind::PresetTemperature(_) => TEMPERATURE_TOLERANCE,
        }
    }

    fn read(&self, snapshot: &DeviceSnapshot) -> Option<f64> {
        match self {
            NumberKind::Calibration => Some(snapshot.calibration.unwrap_or(0.0)),
            NumberKind::PresetTemperature(option) => snapshot.named_temperature(*option),
        }
    }
}

pub struct NumberEntity {
    coordinator: Arc<Coordinator>,
    kind: NumberKind,
    unique_id: String,
    pending: Optimistic<f64>,
}

impl NumberEntity {
    pub fn new(coordinator: Arc<Coordinator>, setup_id: &str, kind: NumberKind) -> Self {
        Self {
            coordinator,
            kind,
            unique_id: unique_id(setup_id, kind.key()),
            pending: Optimistic::new(),
        }
    }

    pub fn kind(&self) -> NumberKind {
        self.kind
    }

    pub fn value(&self) -> Option<f64> {
        self.pending
            .display(self.snapshot().and_then(|s| self.kind.read(&s)))
    }

    pub async fn set_value(&self, value: f64) -> Result<bool> {
        let (min, max, _) = self.kind.range();
        check_range(self.kind.key(), value, min, max)?;

        self.pending.set(value);
        info!(entity = %self.unique_id, value, "set number");
        let result = match self.kind {
            NumberKind::Calibration => self.coordinator.set_calibration(value).await,
            NumberKind::PresetTemperature(option) => {
                self.coordinator.set_preset_temperature(option, value).await
            }
        };
        if !matches!(result, Ok(true)) {
            self.pending.clear();
        }
        result
    }
}

impl CoordinatorEntity for NumberEntity {
    fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn handle_coordinator_update(&self) {
        if let Some(snapshot) = self.snapshot() {
            self.pending
                .reconcile(self.kind.read(&snapshot).as_ref(), within(self.kind.tolerance()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_distinct() {
        let mut keys: Vec<_> = NumberKind::ALL.iter().map(|k| k.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), NumberKind::ALL.len());
    }

    #[test]
    fn reads_from_snapshot() {
        let snapshot = DeviceSnapshot {
            sleep_temperature: Some(18.0),
            ..Default::default()
        };
        assert_eq!(NumberKind::Calibration.read(&snapshot), Some(0.0));
        assert_eq!(
            NumberKind::PresetTemperature(ManualOption::Sleep).read(&snapshot),
            Some(18.0)
        );
        assert_eq!(NumberKind::PresetTemperature(ManualOption::Away).read(&snapshot), None);
    }

    #[test]
    fn ranges() {
        assert_eq!(NumberKind::Calibration.range(), (-5.0, 5.0, 0.1));
        assert_eq!(
            NumberKind::PresetTemperature(ManualOption::Home).range(),
            (5.0, 32.0, 0.5)
        );
    }
}
