use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::types::DeviceSnapshot;

/// Something presented to the host that reads from a coordinator.
pub trait CoordinatorEntity: Send + Sync {
    fn coordinator(&self) -> &Arc<Coordinator>;

    /// `cosa_<setup id>_<key>`.
    fn unique_id(&self) -> &str;

    fn name(&self) -> &str;

    fn available(&self) -> bool {
        let coordinator = self.coordinator();
        coordinator.last_update_success() && coordinator.snapshot().is_some()
    }

    /// Called after every refresh attempt.
    fn handle_coordinator_update(&self) {}

    fn snapshot(&self) -> Option<Arc<DeviceSnapshot>> {
        self.coordinator().snapshot()
    }
}

pub(crate) fn unique_id(setup_id: &str, key: &str) -> String {
    format!("cosa_{setup_id}_{key}")
}

pub(crate) fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> crate::Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(crate::Error::InvalidValue { field, value, min, max })
    }
}
