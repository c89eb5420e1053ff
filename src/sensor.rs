//! Read-only sensors and binary sensors derived from the snapshot.

use std::sync::Arc;

use serde::Serialize;

use crate::coordinator::Coordinator;
use crate::entity::{unique_id, CoordinatorEntity};
use crate::types::{DeviceSnapshot, ManualOption};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    TargetTemperature,
    BatteryVoltage,
    Rssi,
    CombiState,
    Mode,
    ActiveOption,
    OutdoorTemperature,
    OutdoorHumidity,
    Weather,
    PresetTemperature(ManualOption),
    FirmwareVersion,
    Calibration,
}

impl SensorKind {
    pub const ALL: [SensorKind; 17] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::TargetTemperature,
        SensorKind::BatteryVoltage,
        SensorKind::Rssi,
        SensorKind::CombiState,
        SensorKind::Mode,
        SensorKind::ActiveOption,
        SensorKind::OutdoorTemperature,
        SensorKind::OutdoorHumidity,
        SensorKind::Weather,
        SensorKind::PresetTemperature(ManualOption::Home),
        SensorKind::PresetTemperature(ManualOption::Away),
        SensorKind::PresetTemperature(ManualOption::Sleep),
        SensorKind::PresetTemperature(ManualOption::Custom),
        SensorKind::FirmwareVersion,
        SensorKind::Calibration,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::TargetTemperature => "target_temperature",
            SensorKind::BatteryVoltage => "battery_voltage",
            SensorKind::Rssi => "rssi",
            SensorKind::CombiState => "combi_state",
            SensorKind::Mode => "mode",
            SensorKind::ActiveOption => "option",
            SensorKind::OutdoorTemperature => "outdoor_temperature",
            SensorKind::OutdoorHumidity => "outdoor_humidity",
            SensorKind::Weather => "weather",
            SensorKind::PresetTemperature(ManualOption::Home) => "home_temperature_sensor",
            SensorKind::PresetTemperature(ManualOption::Away) => "away_temperature_sensor",
            SensorKind::PresetTemperature(ManualOption::Sleep) => "sleep_temperature_sensor",
            SensorKind::PresetTemperature(_) => "custom_temperature_sensor",
            SensorKind::FirmwareVersion => "firmware_version",
            SensorKind::Calibration => "calibration_sensor",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "Room temperature",
            SensorKind::Humidity => "Humidity",
            SensorKind::TargetTemperature => "Target temperature",
            SensorKind::BatteryVoltage => "Battery voltage",
            SensorKind::Rssi => "Signal strength",
            SensorKind::CombiState => "Combi state",
            SensorKind::Mode => "Mode",
            SensorKind::ActiveOption => "Option",
            SensorKind::OutdoorTemperature => "Outdoor temperature",
            SensorKind::OutdoorHumidity => "Outdoor humidity",
            SensorKind::Weather => "Weather",
            SensorKind::PresetTemperature(ManualOption::Home) => "Home setpoint",
            SensorKind::PresetTemperature(ManualOption::Away) => "Away setpoint",
            SensorKind::PresetTemperature(ManualOption::Sleep) => "Sleep setpoint",
            SensorKind::PresetTemperature(_) => "Custom setpoint",
            SensorKind::FirmwareVersion => "Firmware version",
            SensorKind::Calibration => "Calibration",
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            SensorKind::Temperature
            | SensorKind::TargetTemperature
            | SensorKind::OutdoorTemperature
            | SensorKind::PresetTemperature(_)
            | SensorKind::Calibration => Some("°C"),
            SensorKind::Humidity | SensorKind::OutdoorHumidity => Some("%"),
            SensorKind::BatteryVoltage => Some("V"),
            SensorKind::Rssi => Some("dBm"),
            _ => None,
        }
    }

    pub fn read(&self, s: &DeviceSnapshot) -> Option<SensorValue> {
        use SensorValue::{Number, Text};

        let current = s.forecast.current();
        match self {
            SensorKind::Temperature => s.temperature.map(Number),
            SensorKind::Humidity => s.humidity.map(Number),
            SensorKind::TargetTemperature => s.target_temperature.map(Number),
            SensorKind::BatteryVoltage => s.battery_voltage.map(Number),
            SensorKind::Rssi => s.rssi.map(|r| Number(r as f64)),
            SensorKind::CombiState => Some(Text(if s.combi_heating { "on" } else { "off" }.to_string())),
            SensorKind::Mode => s.mode.map(|m| Text(m.as_wire_str().to_string())),
            SensorKind::ActiveOption => s.option.map(|o| Text(o.as_wire_str().to_string())),
            SensorKind::OutdoorTemperature => current.and_then(|h| h.temperature).map(Number),
            // The forecast reports a fraction.
            SensorKind::OutdoorHumidity => current
                .and_then(|h| h.humidity)
                .map(|h| Number((h * 100.0).round())),
            SensorKind::Weather => current.and_then(|h| h.icon.clone()).map(Text),
            SensorKind::PresetTemperature(option) => s.named_temperature(*option).map(Number),
            SensorKind::FirmwareVersion => s.firmware_version.clone().map(Text),
            SensorKind::Calibration => s.calibration.map(Number),
        }
    }
}

pub struct SensorEntity {
    coordinator: Arc<Coordinator>,
    kind: SensorKind,
    unique_id: String,
}

impl SensorEntity {
    pub fn new(coordinator: Arc<Coordinator>, setup_id: &str, kind: SensorKind) -> Self {
        Self {
            coordinator,
            kind,
            unique_id: unique_id(setup_id, kind.key()),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn value(&self) -> Option<SensorValue> {
        self.snapshot().and_then(|s| self.kind.read(&s))
    }
}

impl CoordinatorEntity for SensorEntity {
    fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySensorKind {
    Connectivity,
    Heating,
}

impl BinarySensorKind {
    pub const ALL: [BinarySensorKind; 2] = [BinarySensorKind::Connectivity, BinarySensorKind::Heating];

    pub fn key(&self) -> &'static str {
        match self {
            BinarySensorKind::Connectivity => "connected",
            BinarySensorKind::Heating => "heating",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BinarySensorKind::Connectivity => "Connection",
            BinarySensorKind::Heating => "Heating",
        }
    }

    pub fn read(&self, s: &DeviceSnapshot) -> bool {
        match self {
            BinarySensorKind::Connectivity => s.connected,
            BinarySensorKind::Heating => s.combi_heating,
        }
    }
}

pub struct BinarySensorEntity {
    coordinator: Arc<Coordinator>,
    kind: BinarySensorKind,
    unique_id: String,
}

impl BinarySensorEntity {
    pub fn new(coordinator: Arc<Coordinator>, setup_id: &str, kind: BinarySensorKind) -> Self {
        Self {
            coordinator,
            kind,
            unique_id: unique_id(setup_id, kind.key()),
        }
    }

    pub fn kind(&self) -> BinarySensorKind {
        self.kind
    }

    pub fn is_on(&self) -> bool {
        self.snapshot().is_some_and(|s| self.kind.read(&s))
    }
}

impl CoordinatorEntity for BinarySensorEntity {
    fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        self.kind.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Forecast, HourlyForecast, Mode};

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            temperature: Some(20.5),
            mode: Some(Mode::Manual),
            option: Some(ManualOption::Away),
            away_temperature: Some(15.0),
            rssi: Some(-61),
            combi_heating: true,
            forecast: Forecast {
                hourly: vec![HourlyForecast {
                    temperature: Some(7.5),
                    humidity: Some(0.814),
                    icon: Some("rain".to_string()),
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn reads_values() {
        let s = snapshot();
        assert_eq!(SensorKind::Temperature.read(&s), Some(SensorValue::Number(20.5)));
        assert_eq!(SensorKind::Rssi.read(&s), Some(SensorValue::Number(-61.0)));
        assert_eq!(SensorKind::Mode.read(&s), Some(SensorValue::Text("manual".into())));
        assert_eq!(SensorKind::CombiState.read(&s), Some(SensorValue::Text("on".into())));
        assert_eq!(
            SensorKind::PresetTemperature(ManualOption::Away).read(&s),
            Some(SensorValue::Number(15.0))
        );
        assert_eq!(SensorKind::Humidity.read(&s), None);
    }

    #[test]
    fn outdoor_humidity_is_percent() {
        let s = snapshot();
        assert_eq!(SensorKind::OutdoorHumidity.read(&s), Some(SensorValue::Number(81.0)));
        assert_eq!(SensorKind::Weather.read(&s), Some(SensorValue::Text("rain".into())));
        assert_eq!(SensorKind::OutdoorHumidity.read(&DeviceSnapshot::default()), None);
    }

    #[test]
    fn binary_sensors() {
        let s = snapshot();
        assert!(BinarySensorKind::Heating.read(&s));
        assert!(!BinarySensorKind::Connectivity.read(&s));
    }

    #[test]
    fn keys_are_distinct() {
        let mut keys: Vec<_> = SensorKind::ALL.iter().map(|k| k.key()).collect();
        keys.extend(BinarySensorKind::ALL.iter().map(|k| k.key()));
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }
}
