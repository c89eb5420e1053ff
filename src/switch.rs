use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::entity::{unique_id, CoordinatorEntity};
use crate::optimistic::{same, Optimistic};
use crate::types::DeviceSnapshot;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    ChildLock,
    OpenWindowDetection,
}

impl SwitchKind {
    pub const ALL: [SwitchKind; 2] = [SwitchKind::ChildLock, SwitchKind::OpenWindowDetection];

    pub fn key(&self) -> &'static str {
        match self {
            SwitchKind::ChildLock => "child_lock",
            SwitchKind::OpenWindowDetection => "open_window_enable",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwitchKind::ChildLock => "Child lock",
            SwitchKind::OpenWindowDetection => "Open window detection",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            SwitchKind::ChildLock => "mdi:lock-outline",
            SwitchKind::OpenWindowDetection => "mdi:window-open-variant",
        }
    }

    fn read(&self, snapshot: &DeviceSnapshot) -> bool {
        match self {
            SwitchKind::ChildLock => snapshot.child_lock,
            SwitchKind::OpenWindowDetection => snapshot.open_window_enabled,
        }
    }
}

pub struct SwitchEntity {
    coordinator: Arc<Coordinator>,
    kind: SwitchKind,
    unique_id: String,
    pending: Optimistic<bool>,
}

impl SwitchEntity {
    pub fn new(coordinator: Arc<Coordinator>, setup_id: &str, kind: SwitchKind) -> Self {
        Self {
            coordinator,
            kind,
            unique_id: unique_id(setup_id, kind.key()),
            pending: Optimistic::new(),
        }
    }

    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    pub fn is_on(&self) -> bool {
        self.pending
            .display(self.snapshot().map(|s| self.kind.read(&s)))
            .unwrap_or(false)
    }

    pub async fn turn_on(&self) -> Result<bool> {
        self.set(true).await
    }

    pub async fn turn_off(&self) -> Result<bool> {
        self.set(false).await
    }

    async fn set(&self, on: bool) -> Result<bool> {
        self.pending.set(on);
        let result = match self.kind {
            SwitchKind::ChildLock => self.coordinator.set_child_lock(on).await,
            SwitchKind::OpenWindowDetection => self.coordinator.set_open_window(on).await,
        };
        if !matches!(result, Ok(true)) {
            self.pending.clear();
        }
        result
    }
}

impl CoordinatorEntity for SwitchEntity {
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
            self.pending.reconcile(Some(&self.kind.read(&snapshot)), same);
        }
    }
}
