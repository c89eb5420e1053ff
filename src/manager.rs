//! Loads configured thermostats and keeps their coordinators, entities and
//! background tasks together until they are unloaded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::CosaClient;
use crate::climate::ClimateEntity;
use crate::config::EntryConfig;
use crate::coordinator::Coordinator;
use crate::entity::CoordinatorEntity;
use crate::number::{NumberEntity, NumberKind};
use crate::sensor::{BinarySensorEntity, BinarySensorKind, SensorEntity, SensorKind};
use crate::switch::{SwitchEntity, SwitchKind};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetupId(Uuid);

impl SetupId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SetupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Everything presented for one thermostat.
pub struct EntitySet {
    pub climate: Arc<ClimateEntity>,
    pub numbers: Vec<Arc<NumberEntity>>,
    pub switches: Vec<Arc<SwitchEntity>>,
    pub sensors: Vec<Arc<SensorEntity>>,
    pub binary_sensors: Vec<Arc<BinarySensorEntity>>,
}

impl EntitySet {
    pub fn new(coordinator: &Arc<Coordinator>, setup_id: &str) -> Self {
        Self {
            climate: Arc::new(ClimateEntity::new(Arc::clone(coordinator), setup_id)),
            numbers: NumberKind::ALL
                .into_iter()
                .map(|kind| Arc::new(NumberEntity::new(Arc::clone(coordinator), setup_id, kind)))
                .collect(),
            switches: SwitchKind::ALL
                .into_iter()
                .map(|kind| Arc::new(SwitchEntity::new(Arc::clone(coordinator), setup_id, kind)))
                .collect(),
            sensors: SensorKind::ALL
                .into_iter()
                .map(|kind| Arc::new(SensorEntity::new(Arc::clone(coordinator), setup_id, kind)))
                .collect(),
            binary_sensors: BinarySensorKind::ALL
                .into_iter()
                .map(|kind| Arc::new(BinarySensorEntity::new(Arc::clone(coordinator), setup_id, kind)))
                .collect(),
        }
    }

    pub fn all(&self) -> Vec<Arc<dyn CoordinatorEntity>> {
        let mut all: Vec<Arc<dyn CoordinatorEntity>> = vec![self.climate.clone() as Arc<dyn CoordinatorEntity>];
        all.extend(self.numbers.iter().map(|e| e.clone() as Arc<dyn CoordinatorEntity>));
        all.extend(self.switches.iter().map(|e| e.clone() as Arc<dyn CoordinatorEntity>));
        all.extend(self.sensors.iter().map(|e| e.clone() as Arc<dyn CoordinatorEntity>));
        all.extend(
            self.binary_sensors
                .iter()
                .map(|e| e.clone() as Arc<dyn CoordinatorEntity>),
        );
        all
    }

    pub fn find(&self, unique_id: &str) -> Option<Arc<dyn CoordinatorEntity>> {
        self.all().into_iter().find(|e| e.unique_id() == unique_id)
    }

    pub fn number(&self, kind: NumberKind) -> Option<&Arc<NumberEntity>> {
        self.numbers.iter().find(|e| e.kind() == kind)
    }

    pub fn switch(&self, kind: SwitchKind) -> Option<&Arc<SwitchEntity>> {
        self.switches.iter().find(|e| e.kind() == kind)
    }

    pub fn sensor(&self, kind: SensorKind) -> Option<&Arc<SensorEntity>> {
        self.sensors.iter().find(|e| e.kind() == kind)
    }

    fn dispatch_update(&self) {
        for entity in self.all() {
            entity.handle_coordinator_update();
        }
    }
}

struct LoadedEntry {
    coordinator: Arc<Coordinator>,
    entities: Arc<EntitySet>,
    poller: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl Drop for LoadedEntry {
    fn drop(&mut self) {
        self.poller.abort();
        self.dispatcher.abort();
    }
}

#[derive(Default)]
pub struct IntegrationManager {
    entries: HashMap<SetupId, LoadedEntry>,
}

impl IntegrationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs in, binds to a thermostat and starts polling it. Nothing is
    /// registered unless every step succeeds.
    pub async fn setup(&mut self, config: EntryConfig) -> Result<SetupId> {
        config.validate()?;

        let mut builder = CosaClient::builder();
        if let Some(url) = &config.base_url {
            builder = builder.base_url(url.as_str());
        }
        if let Some((mode, path)) = config.message_log_mode() {
            builder = builder.message_log(mode, path);
        }
        let client = builder.build()?;

        let token = client.authenticate(&config.email, &config.password).await?;
        let device_id = match &config.endpoint_id {
            Some(id) => id.clone(),
            None => resolve_device(&client, &token).await?,
        };

        let coordinator = Arc::new(
            Coordinator::builder(client, config.credentials(), device_id)
                .scan_interval(config.scan_interval())
                .settle_delay(config.settle_delay())
                .token(token)
                .build(),
        );
        coordinator.first_refresh().await?;

        let setup_id = SetupId::new();
        let entities = Arc::new(EntitySet::new(&coordinator, &setup_id.to_string()));
        let poller = coordinator.spawn_polling();
        let dispatcher = spawn_dispatcher(&coordinator, &entities);

        info!(%setup_id, device = coordinator.device_id(), "thermostat set up");
        self.entries.insert(
            setup_id,
            LoadedEntry {
                coordinator,
                entities,
                poller,
                dispatcher,
            },
        );
        Ok(setup_id)
    }

    /// Stops polling and drops the entry.
    pub fn unload(&mut self, id: SetupId) -> Result<()> {
        match self.entries.remove(&id) {
            Some(entry) => {
                info!(setup_id = %id, device = entry.coordinator.device_id(), "thermostat unloaded");
                Ok(())
            }
            None => Err(Error::UnknownSetup(id.to_string())),
        }
    }

    pub fn coordinator(&self, id: SetupId) -> Option<Arc<Coordinator>> {
        self.entries.get(&id).map(|e| Arc::clone(&e.coordinator))
    }

    pub fn entities(&self, id: SetupId) -> Option<Arc<EntitySet>> {
        self.entries.get(&id).map(|e| Arc::clone(&e.entities))
    }

    pub fn setup_ids(&self) -> Vec<SetupId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn resolve_device(client: &CosaClient, token: &str) -> Result<String> {
    let endpoints = client.list_endpoints(token).await?;
    debug!(count = endpoints.len(), "endpoints on account");
    match endpoints.as_slice() {
        [] => Err(Error::NoDevices),
        [only] => Ok(only.id.clone()),
        many => Err(Error::AmbiguousDevice(many.iter().map(|e| e.id.clone()).collect())),
    }
}

fn spawn_dispatcher(coordinator: &Coordinator, entities: &Arc<EntitySet>) -> JoinHandle<()> {
    let mut updates = coordinator.subscribe();
    let entities = Arc::clone(entities);
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            entities.dispatch_update();
        }
    })
}
