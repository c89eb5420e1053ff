mod client;
mod climate;
mod config;
mod coordinator;
mod diff;
mod entity;
mod error;
mod logger;
mod manager;
mod number;
mod optimistic;
mod protocol;
mod sensor;
mod switch;
mod types;

pub use client::{CosaClient, CosaClientBuilder};
pub use climate::{ClimateEntity, MAX_TEMP, MIN_TEMP, TEMP_STEP};
pub use config::EntryConfig;
pub use coordinator::{
    Coordinator, CoordinatorBuilder, CoordinatorData, CoordinatorState, Credentials,
    DEFAULT_SCAN_INTERVAL, DEFAULT_SETTLE_DELAY,
};
pub use entity::CoordinatorEntity;
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use manager::{EntitySet, IntegrationManager, SetupId};
pub use number::{NumberEntity, NumberKind, CALIBRATION_MAX, CALIBRATION_MIN, CALIBRATION_STEP};
pub use optimistic::{reconcile, within, Optimistic, CALIBRATION_TOLERANCE, TEMPERATURE_TOLERANCE};
pub use sensor::{BinarySensorEntity, BinarySensorKind, SensorEntity, SensorKind, SensorValue};
pub use switch::{SwitchEntity, SwitchKind};
pub use types::*;
