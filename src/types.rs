use serde::{Deserialize, Serialize};

/// Top-level operating mode as the cloud API names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Manual,
    Auto,
    Schedule,
}

impl Mode {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Auto => "auto",
            Mode::Schedule => "schedule",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Mode::Manual),
            "auto" => Some(Mode::Auto),
            "schedule" => Some(Mode::Schedule),
            _ => None,
        }
    }
}

/// Sub-mode active while the thermostat is in [`Mode::Manual`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualOption {
    Home,
    Away,
    Sleep,
    Custom,
    /// Frost protection only. Presented as "off".
    Frozen,
}

impl ManualOption {
    pub const NAMED: [ManualOption; 4] = [
        ManualOption::Home,
        ManualOption::Away,
        ManualOption::Sleep,
        ManualOption::Custom,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ManualOption::Home => "home",
            ManualOption::Away => "away",
            ManualOption::Sleep => "sleep",
            ManualOption::Custom => "custom",
            ManualOption::Frozen => "frozen",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "home" => Some(ManualOption::Home),
            "away" => Some(ManualOption::Away),
            "sleep" => Some(ManualOption::Sleep),
            "custom" => Some(ManualOption::Custom),
            "frozen" => Some(ManualOption::Frozen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
}

impl HvacMode {
    /// Wire pair written when the user picks this HVAC mode.
    pub fn to_wire(self) -> (Mode, Option<ManualOption>) {
        match self {
            HvacMode::Off => (Mode::Manual, Some(ManualOption::Frozen)),
            HvacMode::Heat => (Mode::Manual, Some(ManualOption::Home)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    Heating,
    Idle,
}

/// Named operating profile exposed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Home,
    Away,
    Sleep,
    Custom,
    Auto,
    Schedule,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Home,
        Preset::Away,
        Preset::Sleep,
        Preset::Custom,
        Preset::Auto,
        Preset::Schedule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Home => "home",
            Preset::Away => "away",
            Preset::Sleep => "sleep",
            Preset::Custom => "custom",
            Preset::Auto => "auto",
            Preset::Schedule => "schedule",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        Preset::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn to_wire(self) -> (Mode, Option<ManualOption>) {
        match self {
            Preset::Home => (Mode::Manual, Some(ManualOption::Home)),
            Preset::Away => (Mode::Manual, Some(ManualOption::Away)),
            Preset::Sleep => (Mode::Manual, Some(ManualOption::Sleep)),
            Preset::Custom => (Mode::Manual, Some(ManualOption::Custom)),
            Preset::Auto => (Mode::Auto, None),
            Preset::Schedule => (Mode::Schedule, None),
        }
    }

    /// The named temperature this preset heats to, if it has one of its own.
    pub fn manual_option(self) -> Option<ManualOption> {
        match self {
            Preset::Home => Some(ManualOption::Home),
            Preset::Away => Some(ManualOption::Away),
            Preset::Sleep => Some(ManualOption::Sleep),
            Preset::Custom => Some(ManualOption::Custom),
            Preset::Auto | Preset::Schedule => None,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Preset::Home => "mdi:home",
            Preset::Away => "mdi:walk",
            Preset::Sleep => "mdi:bed",
            Preset::Custom => "mdi:tune",
            Preset::Auto => "mdi:thermostat-auto",
            Preset::Schedule => "mdi:calendar-clock",
        }
    }
}

/// `manual+frozen` is the only "off" state; anything else, including values
/// the vocabulary does not know, heats.
pub fn hvac_mode_for(mode: Option<Mode>, option: Option<ManualOption>) -> HvacMode {
    match (mode, option) {
        (Some(Mode::Manual), Some(ManualOption::Frozen)) => HvacMode::Off,
        _ => HvacMode::Heat,
    }
}

pub fn preset_for(mode: Option<Mode>, option: Option<ManualOption>) -> Option<Preset> {
    let from_option = |option: ManualOption| match option {
        ManualOption::Home => Some(Preset::Home),
        ManualOption::Away => Some(Preset::Away),
        ManualOption::Sleep => Some(Preset::Sleep),
        ManualOption::Custom => Some(Preset::Custom),
        ManualOption::Frozen => None,
    };
    match mode {
        Some(Mode::Schedule) => Some(Preset::Schedule),
        Some(Mode::Auto) => Some(Preset::Auto),
        Some(Mode::Manual) => match option {
            Some(option) => from_option(option),
            None => Some(Preset::Home),
        },
        None => option.and_then(from_option),
    }
}

/// The four setpoints the cloud API only accepts as a set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetTemperatures {
    pub home: f64,
    pub away: f64,
    pub sleep: f64,
    pub custom: f64,
}

impl Default for TargetTemperatures {
    fn default() -> Self {
        Self {
            home: 21.0,
            away: 15.0,
            sleep: 19.0,
            custom: 20.0,
        }
    }
}

impl TargetTemperatures {
    pub fn get(&self, option: ManualOption) -> Option<f64> {
        match option {
            ManualOption::Home => Some(self.home),
            ManualOption::Away => Some(self.away),
            ManualOption::Sleep => Some(self.sleep),
            ManualOption::Custom => Some(self.custom),
            ManualOption::Frozen => None,
        }
    }

    /// Copy with one setpoint replaced. `Frozen` has no setpoint of its own
    /// and edits `home`.
    pub fn with(mut self, option: ManualOption, value: f64) -> Self {
        match option {
            ManualOption::Home | ManualOption::Frozen => self.home = value,
            ManualOption::Away => self.away = value,
            ManualOption::Sleep => self.sleep = value,
            ManualOption::Custom => self.custom = value,
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub temperature: Option<f64>,
    /// Fraction in 0..1 as the forecast service reports it.
    pub humidity: Option<f64>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub hourly: Vec<HourlyForecast>,
}

impl Forecast {
    pub fn current(&self) -> Option<&HourlyForecast> {
        self.hourly.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub id: String,
    pub name: Option<String>,
}

/// Last known device state. Replaced wholesale on every successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub name: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub mode: Option<Mode>,
    pub option: Option<ManualOption>,
    pub home_temperature: Option<f64>,
    pub away_temperature: Option<f64>,
    pub sleep_temperature: Option<f64>,
    pub custom_temperature: Option<f64>,
    /// Setpoint the device reports as currently active.
    pub target_temperature: Option<f64>,
    pub combi_heating: bool,
    pub connected: bool,
    pub rssi: Option<i64>,
    pub calibration: Option<f64>,
    pub open_window_enabled: bool,
    pub open_window_open: bool,
    pub child_lock: bool,
    pub combi_heating_enabled: bool,
    pub battery_voltage: Option<f64>,
    pub power_state: Option<String>,
    pub firmware_version: Option<String>,
    pub place: Option<String>,
    pub forecast: Forecast,
}

impl DeviceSnapshot {
    pub fn hvac_mode(&self) -> HvacMode {
        hvac_mode_for(self.mode, self.option)
    }

    pub fn preset(&self) -> Option<Preset> {
        preset_for(self.mode, self.option)
    }

    pub fn hvac_action(&self) -> HvacAction {
        if self.combi_heating {
            HvacAction::Heating
        } else {
            HvacAction::Idle
        }
    }

    pub fn named_temperature(&self, option: ManualOption) -> Option<f64> {
        match option {
            ManualOption::Home => self.home_temperature,
            ManualOption::Away => self.away_temperature,
            ManualOption::Sleep => self.sleep_temperature,
            ManualOption::Custom => self.custom_temperature,
            ManualOption::Frozen => None,
        }
    }

    /// Setpoint the thermostat is heating towards: the active named
    /// temperature in manual mode, `home` under auto/schedule.
    pub fn active_target(&self) -> Option<f64> {
        match (self.mode, self.option) {
            (Some(Mode::Manual), Some(ManualOption::Frozen)) => self.target_temperature,
            (Some(Mode::Manual), Some(option)) => self.named_temperature(option),
            (Some(Mode::Auto | Mode::Schedule), _) => self.home_temperature,
            _ => self.target_temperature,
        }
    }

    /// Named temperature a single-setpoint edit lands on.
    pub fn editable_option(&self) -> ManualOption {
        match (self.mode, self.option) {
            (Some(Mode::Manual), Some(option)) if option != ManualOption::Frozen => option,
            _ => ManualOption::Home,
        }
    }

    /// Current setpoints, with vendor defaults standing in for any the
    /// device did not report.
    pub fn target_temperatures(&self) -> TargetTemperatures {
        let defaults = TargetTemperatures::default();
        TargetTemperatures {
            home: self.home_temperature.unwrap_or(defaults.home),
            away: self.away_temperature.unwrap_or(defaults.away),
            sleep: self.sleep_temperature.unwrap_or(defaults.sleep),
            custom: self.custom_temperature.unwrap_or(defaults.custom),
        }
    }
}
