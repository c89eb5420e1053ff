//! Polling coordinator: the single owner of the device snapshot and the
//! bearer token.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::client::CosaClient;
use crate::diff::changed_fields;
use crate::protocol::OPEN_WINDOW_DURATION_MINUTES;
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(15);
/// Grace period the cloud needs before a written setpoint shows up in reads.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Ready,
    Refreshing,
    Reauthenticating,
    /// The first refresh failed; setup must be aborted.
    Failed,
}

/// What observers see after every refresh attempt.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorData {
    pub snapshot: Option<Arc<DeviceSnapshot>>,
    pub last_update_success: bool,
}

type RefreshOutcome = std::result::Result<Arc<DeviceSnapshot>, Arc<Error>>;

struct RefreshSlot {
    completed: u64,
    last: Option<RefreshOutcome>,
}

pub struct CoordinatorBuilder {
    client: CosaClient,
    credentials: Credentials,
    device_id: String,
    scan_interval: Duration,
    settle_delay: Duration,
    token: Option<String>,
}

impl CoordinatorBuilder {
    pub fn new(client: CosaClient, credentials: Credentials, device_id: impl Into<String>) -> Self {
        Self {
            client,
            credentials,
            device_id: device_id.into(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            token: None,
        }
    }

    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Start from a token obtained elsewhere (e.g. during device discovery).
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn build(self) -> Coordinator {
        let (data, _) = watch::channel(CoordinatorData::default());
        Coordinator {
            client: self.client,
            credentials: self.credentials,
            device_id: self.device_id,
            scan_interval: self.scan_interval,
            settle_delay: self.settle_delay,
            token: RwLock::new(self.token),
            state: Mutex::new(CoordinatorState::Uninitialized),
            data,
            refresh_slot: tokio::sync::Mutex::new(RefreshSlot {
                completed: 0,
                last: None,
            }),
            completed_refreshes: AtomicU64::new(0),
        }
    }
}

pub struct Coordinator {
    client: CosaClient,
    credentials: Credentials,
    device_id: String,
    scan_interval: Duration,
    settle_delay: Duration,
    token: RwLock<Option<String>>,
    state: Mutex<CoordinatorState>,
    data: watch::Sender<CoordinatorData>,
    /// Held for the duration of a refresh; at most one is in flight.
    refresh_slot: tokio::sync::Mutex<RefreshSlot>,
    completed_refreshes: AtomicU64,
}

impl Coordinator {
    pub fn builder(
        client: CosaClient,
        credentials: Credentials,
        device_id: impl Into<String>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder::new(client, credentials, device_id)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Option<Arc<DeviceSnapshot>> {
        self.data.borrow().snapshot.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.data.borrow().last_update_success
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorData> {
        self.data.subscribe()
    }

    /// Logs in and replaces the stored token.
    pub async fn authenticate(&self) -> Result<()> {
        let token = self
            .client
            .authenticate(&self.credentials.email, &self.credentials.password)
            .await?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }

    /// The first refresh ever. Failure is terminal for this coordinator.
    pub async fn first_refresh(&self) -> Result<Arc<DeviceSnapshot>> {
        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.set_state(CoordinatorState::Failed);
                Err(e)
            }
        }
    }

    /// Fetches a fresh snapshot. A call made while another refresh is in
    /// flight waits for it and returns its outcome instead of fetching again.
    /// On failure the previous snapshot stays published.
    pub async fn refresh(&self) -> Result<Arc<DeviceSnapshot>> {
        let observed = self.completed_refreshes.load(Ordering::Acquire);
        let mut slot = self.refresh_slot.lock().await;

        if slot.completed != observed
            && let Some(outcome) = &slot.last
        {
            trace!("joined in-flight refresh");
            return outcome.clone().map_err(Error::UpdateFailed);
        }

        let outcome: RefreshOutcome = self.run_refresh().await.map_err(Arc::new);
        self.publish(&outcome);

        slot.completed += 1;
        slot.last = Some(outcome.clone());
        self.completed_refreshes.store(slot.completed, Ordering::Release);

        outcome.map_err(Error::UpdateFailed)
    }

    /// Runs [`Coordinator::refresh`] every scan interval until the returned
    /// task is aborted.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(coordinator.scan_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // the first tick completes immediately
            loop {
                interval.tick().await;
                if let Err(e) = coordinator.refresh().await {
                    debug!(error = %e, "scheduled refresh failed");
                }
            }
        })
    }

    // -- Command methods --

    pub async fn set_mode(&self, mode: Mode, option: Option<ManualOption>) -> Result<bool> {
        let (client, id) = (&self.client, self.device_id.as_str());
        let accepted = self
            .with_reauth(move |token| async move { client.send_mode(&token, id, mode, option).await })
            .await?;
        self.after_write("set_mode", accepted, false).await;
        Ok(accepted)
    }

    /// Writes all four named setpoints in one call.
    pub async fn set_temperatures(&self, temps: TargetTemperatures) -> Result<bool> {
        info!(
            home = temps.home,
            away = temps.away,
            sleep = temps.sleep,
            custom = temps.custom,
            "setting target temperatures"
        );
        let (client, id) = (&self.client, self.device_id.as_str());
        let accepted = self
            .with_reauth(move |token| async move {
                client
                    .send_target_temperatures(&token, id, temps.home, temps.away, temps.sleep, temps.custom)
                    .await
            })
            .await?;
        self.after_write("set_temperatures", accepted, true).await;
        Ok(accepted)
    }

    /// Changes one named setpoint, carrying the other three over from the
    /// current snapshot.
    pub async fn set_preset_temperature(&self, option: ManualOption, value: f64) -> Result<bool> {
        let current = self.snapshot().ok_or(Error::NotReady)?;
        self.set_temperatures(current.target_temperatures().with(option, value))
            .await
    }

    pub async fn set_calibration(&self, value: f64) -> Result<bool> {
        let open_window = self.snapshot().is_some_and(|s| s.open_window_enabled);
        self.write_device_settings("set_calibration", value, open_window)
            .await
    }

    pub async fn set_open_window(&self, enabled: bool) -> Result<bool> {
        let calibration = self.snapshot().and_then(|s| s.calibration).unwrap_or(0.0);
        self.write_device_settings("set_open_window", calibration, enabled)
            .await
    }

    pub async fn set_child_lock(&self, locked: bool) -> Result<bool> {
        let heating_on = self.snapshot().is_none_or(|s| s.combi_heating_enabled);
        let (client, id) = (&self.client, self.device_id.as_str());
        let accepted = self
            .with_reauth(move |token| async move {
                client.send_combi_settings(&token, id, locked, heating_on).await
            })
            .await?;
        self.after_write("set_child_lock", accepted, false).await;
        Ok(accepted)
    }

    // -- Helpers --

    async fn write_device_settings(&self, action: &str, calibration: f64, open_window: bool) -> Result<bool> {
        let (client, id) = (&self.client, self.device_id.as_str());
        let accepted = self
            .with_reauth(move |token| async move {
                client
                    .send_device_settings(
                        &token,
                        id,
                        calibration,
                        Some(open_window),
                        Some(OPEN_WINDOW_DURATION_MINUTES),
                    )
                    .await
            })
            .await?;
        self.after_write(action, accepted, false).await;
        Ok(accepted)
    }

    /// Accepted writes are followed by an out-of-band refresh so observers
    /// see the new state without waiting for the timer.
    async fn after_write(&self, action: &str, accepted: bool, settle: bool) {
        if !accepted {
            return;
        }
        if settle && !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        if let Err(e) = self.refresh().await {
            warn!(action, error = %e, "refresh after write failed");
        }
    }

    async fn run_refresh(&self) -> Result<Arc<DeviceSnapshot>> {
        let previous = self.set_state(CoordinatorState::Refreshing);
        if previous == CoordinatorState::Failed {
            self.set_state(CoordinatorState::Failed);
            return Err(Error::NotReady);
        }

        let (client, id) = (&self.client, self.device_id.as_str());
        let fetched = self
            .with_reauth(move |token| async move { client.fetch_device(&token, id).await })
            .await;

        let mut snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let fallback = if self.snapshot().is_some() {
                    CoordinatorState::Ready
                } else {
                    CoordinatorState::Uninitialized
                };
                self.set_state(fallback);
                return Err(e);
            }
        };

        if let (Some(place), Some(token)) = (snapshot.place.clone(), self.current_token()) {
            snapshot.forecast = self.client.fetch_forecast(&token, &place).await;
        }

        self.set_state(CoordinatorState::Ready);
        Ok(Arc::new(snapshot))
    }

    fn publish(&self, outcome: &RefreshOutcome) {
        match outcome {
            Ok(snapshot) => self.data.send_modify(|data| {
                if let Some(previous) = &data.snapshot {
                    let changed = changed_fields(previous, snapshot);
                    if !changed.is_empty() {
                        trace!(fields = ?changed, "snapshot changed");
                    }
                }
                data.snapshot = Some(Arc::clone(snapshot));
                data.last_update_success = true;
            }),
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                self.data.send_modify(|data| data.last_update_success = false);
            }
        }
    }

    /// Runs `op` with the current token. When the service reports the
    /// session expired, logs in once, swaps the token and retries once; the
    /// retry's result is final.
    async fn with_reauth<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = match self.current_token() {
            Some(token) => token,
            None => {
                self.authenticate().await?;
                self.current_token().ok_or(Error::SessionExpired)?
            }
        };

        match op(token).await {
            Err(e) if e.is_session_expired() => {
                warn!("session expired, logging in again");
                let resume = self.set_state(CoordinatorState::Reauthenticating);
                let relogin = self.authenticate().await;
                self.leave_state(CoordinatorState::Reauthenticating, resume);
                relogin?;
                let token = self.current_token().ok_or(Error::SessionExpired)?;
                op(token).await
            }
            other => other,
        }
    }

    fn current_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Moves to `next` only while still in `current`; a concurrent refresh
    /// may have moved on in the meantime.
    fn leave_state(&self, current: CoordinatorState, next: CoordinatorState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == current && current != next {
            debug!(from = ?current, to = ?next, "coordinator state");
            *state = next;
        }
    }

    fn set_state(&self, state: CoordinatorState) -> CoordinatorState {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!(from = ?*current, to = ?state, "coordinator state");
        }
        std::mem::replace(&mut *current, state)
    }
}
