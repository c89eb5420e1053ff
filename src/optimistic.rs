use std::sync::{Mutex, PoisonError};

/// Allowed drift between a written setpoint and what the device reports back.
pub const TEMPERATURE_TOLERANCE: f64 = 0.25;
pub const CALIBRATION_TOLERANCE: f64 = 0.05;

/// Next override state once `actual` has been observed: cleared when the
/// snapshot agrees with the pending value, kept otherwise. Applying the same
/// snapshot twice yields the same result.
pub fn reconcile<T, F>(pending: Option<T>, actual: Option<&T>, matches: F) -> Option<T>
where
    F: Fn(&T, &T) -> bool,
{
    match (pending, actual) {
        (Some(pending), Some(actual)) if matches(&pending, actual) => None,
        (pending, _) => pending,
    }
}

pub fn within(tolerance: f64) -> impl Fn(&f64, &f64) -> bool {
    move |a, b| (a - b).abs() <= tolerance
}

pub fn same<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// A locally held value shown in place of the snapshot until a refresh
/// confirms it.
#[derive(Debug, Default)]
pub struct Optimistic<T> {
    pending: Mutex<Option<T>>,
}

impl<T: Clone> Optimistic<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    pub fn set(&self, value: T) {
        *self.lock() = Some(value);
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    pub fn reconcile<F>(&self, actual: Option<&T>, matches: F)
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut pending = self.lock();
        *pending = reconcile(pending.take(), actual, matches);
    }

    /// The pending value when there is one, `actual` otherwise.
    pub fn display(&self, actual: Option<T>) -> Option<T> {
        self.get().or(actual)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
