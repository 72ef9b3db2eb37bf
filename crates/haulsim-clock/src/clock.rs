//! Simulation clock and its automatic sync task.
//!
//! The clock stores two anchors: the simulated time at the last anchor
//! point and the wall-clock time at which that anchor was taken. While the
//! clock runs, simulated time is derived on every read:
//!
//! ```text
//! now = current_anchor + (wall_clock - real_anchor) * speed_factor
//! ```
//!
//! While stopped, `now` is frozen at the value computed when it stopped.
//!
//! # State machine
//!
//! ```text
//! Stopped <--> Running <--> RunningWithSync
//! ```
//!
//! `RunningWithSync` drops to `Running` on its own once the auto-sync task
//! has failed `max_sync_failures` times in a row. `start`, `stop`, and
//! `reset` are the only other transitions.
//!
//! # Auto-sync
//!
//! The sync task is owned by the clock and aborted synchronously by
//! `start`, `stop`, `reset`, and drop. Each of those also bumps an epoch
//! counter; the task only applies a result or counts a failure if the
//! epoch it was spawned under is still current, so a request that was in
//! flight during cancellation can never touch the clock afterwards.
//!
//! Syncs never overlap: one task performs them sequentially and ticks that
//! elapse during a slow request are skipped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClockConfig;
use crate::source::{SystemTimeSource, TimeSource};
use crate::sync::{self, SyncError};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Invalid clock configuration.
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// Auto-sync was requested outside a Tokio runtime.
    #[error("auto-sync requires a running Tokio runtime")]
    NoRuntime,

    /// The HTTP client used for sync could not be built.
    #[error("failed to build sync HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Observable state of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockMode {
    /// Time is frozen.
    Stopped,
    /// Time advances, no auto-sync.
    Running,
    /// Time advances and is periodically reconciled with a time authority.
    RunningWithSync,
}

/// Snapshot of the auto-sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Whether the auto-sync task is active.
    pub enabled: bool,
    /// Endpoint the task syncs against, if any.
    pub endpoint: Option<String>,
    /// Consecutive failed auto-sync attempts.
    pub failed_attempts: u32,
    /// Failures tolerated before auto-sync is disabled.
    pub max_failures: u32,
}

/// Mutable clock state. Only ever touched under [`Shared::state`].
#[derive(Debug)]
struct ClockState {
    current_anchor: DateTime<Utc>,
    real_anchor: DateTime<Utc>,
    running: bool,
    sync_endpoint: Option<String>,
    sync_enabled: bool,
    failed_sync_attempts: u32,
    max_failures: u32,
    /// Bumped on every start/stop/reset so stale sync tasks can tell.
    epoch: u64,
}

/// State shared between the clock handle and its sync task.
#[derive(Debug)]
struct Shared {
    state: Mutex<ClockState>,
    source: Arc<dyn TimeSource>,
    speed_factor: f64,
    http: reqwest::Client,
    sync_timeout_ms: u64,
}

/// What happened when the sync task counted a failure.
enum FailureOutcome {
    Counted(u32),
    CircuitOpened(u32),
    Stale,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulated time for the given state at wall-clock `wall`.
    fn project(&self, state: &ClockState, wall: DateTime<Utc>) -> DateTime<Utc> {
        if !state.running {
            return state.current_anchor;
        }
        let elapsed = wall.signed_duration_since(state.real_anchor);
        let scaled = scale(elapsed, self.speed_factor);
        state
            .current_anchor
            .checked_add_signed(scaled)
            .unwrap_or(state.current_anchor)
    }

    fn now(&self) -> DateTime<Utc> {
        let state = self.lock();
        self.project(&state, self.source.now())
    }

    fn set_time(&self, state: &mut ClockState, time: DateTime<Utc>) {
        state.current_anchor = time;
        state.real_anchor = self.source.now();
    }

    /// Apply a synced time. With `epoch` set, only if it is still current.
    fn apply_synced(&self, time: DateTime<Utc>, epoch: Option<u64>) -> bool {
        let mut state = self.lock();
        if epoch.is_some_and(|e| e != state.epoch) {
            return false;
        }
        self.set_time(&mut state, time);
        state.failed_sync_attempts = 0;
        true
    }

    fn record_failure(&self, epoch: u64) -> FailureOutcome {
        let mut state = self.lock();
        if state.epoch != epoch {
            return FailureOutcome::Stale;
        }
        state.failed_sync_attempts = state.failed_sync_attempts.saturating_add(1);
        if state.failed_sync_attempts >= state.max_failures {
            state.sync_enabled = false;
            FailureOutcome::CircuitOpened(state.failed_sync_attempts)
        } else {
            FailureOutcome::Counted(state.failed_sync_attempts)
        }
    }

    async fn sync(
        &self,
        endpoint: &str,
        epoch: Option<u64>,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let time = sync::fetch_sim_time(&self.http, endpoint, self.sync_timeout_ms).await?;
        Ok(self.apply_synced(time, epoch).then_some(time))
    }
}

/// Multiply a wall-clock duration by the speed factor.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn scale(elapsed: TimeDelta, factor: f64) -> TimeDelta {
    let micros = elapsed.num_microseconds().unwrap_or(i64::MAX) as f64;
    // Float-to-int `as` saturates, so huge products clamp instead of wrapping.
    TimeDelta::microseconds((micros * factor) as i64)
}

/// The simulation clock.
///
/// Created once per process and shared by reference (typically as
/// `Arc<Clock>`). All time values handed out are copies.
#[derive(Debug)]
pub struct Clock {
    shared: Arc<Shared>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl Clock {
    /// Create a stopped clock reading the system wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the speed settings are not
    /// positive, or [`ClockError::HttpClient`] if the sync client cannot be
    /// built.
    pub fn new(config: &ClockConfig) -> Result<Self, ClockError> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Create a stopped clock reading wall-clock time from `source`.
    ///
    /// # Errors
    ///
    /// Same as [`Clock::new`].
    pub fn with_time_source(
        config: &ClockConfig,
        source: Arc<dyn TimeSource>,
    ) -> Result<Self, ClockError> {
        let minutes = config.real_minutes_per_sim_day;
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(ClockError::InvalidConfig {
                reason: format!("real_minutes_per_sim_day must be positive, got {minutes}"),
            });
        }
        if config.max_sync_failures == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "max_sync_failures must be at least 1".to_owned(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.sync_timeout())
            .build()?;

        let wall = source.now();
        let state = ClockState {
            current_anchor: wall,
            real_anchor: wall,
            running: false,
            sync_endpoint: None,
            sync_enabled: false,
            failed_sync_attempts: 0,
            max_failures: config.max_sync_failures,
            epoch: 0,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                source,
                speed_factor: config.speed_factor(),
                http,
                sync_timeout_ms: config.sync_timeout_ms,
            }),
            sync_task: Mutex::new(None),
        })
    }

    /// Current simulated time.
    pub fn now(&self) -> DateTime<Utc> {
        self.shared.now()
    }

    /// Start (or restart) the clock.
    ///
    /// Simulated time resumes from `start_time`, or from the wall clock if
    /// none is given. Any previous sync task is cancelled. With an
    /// endpoint, a new sync task runs every `sync_interval`; without one,
    /// the previous endpoint is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::NoRuntime`] if an endpoint is given outside a
    /// Tokio runtime, or [`ClockError::InvalidConfig`] for a zero interval.
    /// The clock is left untouched on error.
    pub fn start(
        &self,
        start_time: Option<DateTime<Utc>>,
        sync_endpoint: Option<&str>,
        sync_interval: Duration,
    ) -> Result<(), ClockError> {
        let runtime = match sync_endpoint {
            Some(_) if sync_interval.is_zero() => {
                return Err(ClockError::InvalidConfig {
                    reason: "sync interval must be non-zero".to_owned(),
                });
            }
            Some(_) => Some(
                tokio::runtime::Handle::try_current().map_err(|_e| ClockError::NoRuntime)?,
            ),
            None => None,
        };

        self.cancel_sync_task();

        let epoch = {
            let mut state = self.shared.lock();
            let wall = self.shared.source.now();
            state.current_anchor = start_time.unwrap_or(wall);
            state.real_anchor = wall;
            state.running = true;
            state.sync_endpoint = sync_endpoint.map(ToOwned::to_owned);
            state.sync_enabled = sync_endpoint.is_some();
            state.failed_sync_attempts = 0;
            state.epoch = state.epoch.wrapping_add(1);
            state.epoch
        };

        if let (Some(endpoint), Some(runtime)) = (sync_endpoint, runtime) {
            let handle = runtime.spawn(run_sync_loop(
                Arc::clone(&self.shared),
                endpoint.to_owned(),
                sync_interval,
                epoch,
            ));
            *self.task_slot() = Some(handle);
        }

        info!(
            start = %self.now(),
            sync_endpoint = sync_endpoint.unwrap_or("none"),
            sync_interval_ms = u64::try_from(sync_interval.as_millis()).unwrap_or(u64::MAX),
            "Clock started"
        );
        Ok(())
    }

    /// Freeze simulated time and cancel auto-sync.
    pub fn stop(&self) {
        self.cancel_sync_task();
        let mut state = self.shared.lock();
        let frozen = self.shared.project(&state, self.shared.source.now());
        state.current_anchor = frozen;
        state.running = false;
        state.sync_enabled = false;
        state.epoch = state.epoch.wrapping_add(1);
        info!(at = %frozen, "Clock stopped");
    }

    /// Override simulated time. Does not change whether the clock runs.
    pub fn set_time(&self, time: DateTime<Utc>) {
        let mut state = self.shared.lock();
        self.shared.set_time(&mut state, time);
        debug!(time = %time, "Clock time set");
    }

    /// Sync once against `endpoint`.
    ///
    /// On success the clock jumps to the reported time and the failure
    /// counter is cleared. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] describing why the authority could not be
    /// used.
    pub async fn sync(&self, endpoint: &str) -> Result<DateTime<Utc>, SyncError> {
        let synced = self.shared.sync(endpoint, None).await?;
        let time = synced.ok_or_else(|| SyncError::Request {
            endpoint: endpoint.to_owned(),
            reason: "sync result discarded".to_owned(),
        })?;
        info!(endpoint, time = %time, "Clock synced");
        Ok(time)
    }

    /// Return the clock to its initial state: stopped, no sync, reading
    /// the current wall-clock time.
    pub fn reset(&self) {
        self.cancel_sync_task();
        let mut state = self.shared.lock();
        let wall = self.shared.source.now();
        state.current_anchor = wall;
        state.real_anchor = wall;
        state.running = false;
        state.sync_endpoint = None;
        state.sync_enabled = false;
        state.failed_sync_attempts = 0;
        state.epoch = state.epoch.wrapping_add(1);
        info!("Clock reset");
    }

    /// Ratio of simulated time to real time.
    pub fn speed(&self) -> f64 {
        self.shared.speed_factor
    }

    /// Snapshot of the auto-sync bookkeeping.
    pub fn sync_status(&self) -> SyncStatus {
        let state = self.shared.lock();
        SyncStatus {
            enabled: state.sync_enabled,
            endpoint: state.sync_endpoint.clone(),
            failed_attempts: state.failed_sync_attempts,
            max_failures: state.max_failures,
        }
    }

    /// Whether simulated time is advancing.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Current state-machine position.
    pub fn mode(&self) -> ClockMode {
        let state = self.shared.lock();
        match (state.running, state.sync_enabled) {
            (false, _) => ClockMode::Stopped,
            (true, false) => ClockMode::Running,
            (true, true) => ClockMode::RunningWithSync,
        }
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sync_task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_sync_task(&self) {
        if let Some(handle) = self.task_slot().take() {
            handle.abort();
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.cancel_sync_task();
    }
}

/// Body of the auto-sync task.
///
/// The first sync happens one interval after start.
async fn run_sync_loop(shared: Arc<Shared>, endpoint: String, period: Duration, epoch: u64) {
    let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match shared.sync(&endpoint, Some(epoch)).await {
            Ok(Some(time)) => debug!(endpoint = %endpoint, time = %time, "Auto-sync applied"),
            Ok(None) => return,
            Err(e) => match shared.record_failure(epoch) {
                FailureOutcome::Counted(failures) => {
                    warn!(endpoint = %endpoint, failures, error = %e, "Auto-sync failed");
                }
                FailureOutcome::CircuitOpened(failures) => {
                    warn!(
                        endpoint = %endpoint,
                        failures,
                        error = %e,
                        "Auto-sync disabled after repeated failures; clock keeps running"
                    );
                    return;
                }
                FailureOutcome::Stale => return,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::source::ManualTimeSource;

    fn wall_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn sim_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2050, 6, 1, 8, 0, 0).unwrap()
    }

    fn manual_clock() -> (Clock, Arc<ManualTimeSource>) {
        let source = Arc::new(ManualTimeSource::new(wall_start()));
        let wall = Arc::clone(&source) as Arc<dyn TimeSource>;
        let clock = Clock::with_time_source(&ClockConfig::default(), wall).unwrap();
        (clock, source)
    }

    #[test]
    fn new_clock_is_stopped_at_wall_time() {
        let (clock, _source) = manual_clock();
        assert_eq!(clock.mode(), ClockMode::Stopped);
        assert_eq!(clock.now(), wall_start());
    }

    #[test]
    fn running_clock_advances_at_speed_factor() {
        let (clock, source) = manual_clock();
        clock.start(Some(sim_start()), None, Duration::ZERO).unwrap();
        source.advance(TimeDelta::seconds(1));
        assert_eq!(clock.now(), sim_start() + TimeDelta::seconds(720));
        source.advance(TimeDelta::seconds(119));
        assert_eq!(clock.now(), sim_start() + TimeDelta::days(1));
    }

    #[test]
    fn start_then_stop_freezes_at_start_time() {
        let (clock, _source) = manual_clock();
        clock.start(Some(sim_start()), None, Duration::ZERO).unwrap();
        clock.stop();
        assert_eq!(clock.now(), sim_start());
    }

    #[test]
    fn stop_freezes_at_last_computed_value() {
        let (clock, source) = manual_clock();
        clock.start(Some(sim_start()), None, Duration::ZERO).unwrap();
        source.advance(TimeDelta::seconds(10));
        clock.stop();
        source.advance(TimeDelta::seconds(100));
        assert_eq!(clock.now(), sim_start() + TimeDelta::seconds(7200));
        assert!(!clock.is_running());
    }

    #[test]
    fn start_without_time_uses_wall_clock() {
        let (clock, _source) = manual_clock();
        clock.start(None, None, Duration::ZERO).unwrap();
        assert_eq!(clock.now(), wall_start());
        assert_eq!(clock.mode(), ClockMode::Running);
    }

    #[test]
    fn set_time_keeps_running_flag() {
        let (clock, source) = manual_clock();
        clock.set_time(sim_start());
        assert!(!clock.is_running());
        source.advance(TimeDelta::seconds(5));
        assert_eq!(clock.now(), sim_start());

        clock.start(None, None, Duration::ZERO).unwrap();
        clock.set_time(sim_start());
        source.advance(TimeDelta::seconds(1));
        assert_eq!(clock.now(), sim_start() + TimeDelta::seconds(720));
    }

    #[test]
    fn set_time_copies_its_input() {
        let (clock, _source) = manual_clock();
        let mut input = sim_start();
        clock.set_time(input);
        input += TimeDelta::days(3);
        assert_ne!(input, sim_start());
        assert_eq!(clock.now(), sim_start());
    }

    #[test]
    fn speed_matches_configured_minutes() {
        let cfg = ClockConfig {
            real_minutes_per_sim_day: 4.0,
            ..ClockConfig::default()
        };
        let clock = Clock::new(&cfg).unwrap();
        let expected = 86_400_000.0 / (4.0 * 60_000.0);
        assert!((clock.speed() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_returns_to_wall_time_and_clears_sync() {
        let (clock, source) = manual_clock();
        clock.start(Some(sim_start()), None, Duration::ZERO).unwrap();
        source.advance(TimeDelta::seconds(30));
        clock.reset();

        assert_eq!(clock.mode(), ClockMode::Stopped);
        assert_eq!(clock.now(), source.now());
        assert_eq!(
            clock.sync_status(),
            SyncStatus {
                enabled: false,
                endpoint: None,
                failed_attempts: 0,
                max_failures: 3,
            }
        );
    }

    #[test]
    fn sync_endpoint_requires_runtime() {
        let (clock, _source) = manual_clock();
        let result = clock.start(
            Some(sim_start()),
            Some("http://127.0.0.1:9/time"),
            Duration::from_secs(30),
        );
        assert!(matches!(result, Err(ClockError::NoRuntime)));
        assert_eq!(clock.mode(), ClockMode::Stopped);
    }

    #[tokio::test]
    async fn zero_sync_interval_is_rejected() {
        let (clock, _source) = manual_clock();
        let result = clock.start(None, Some("http://127.0.0.1:9/time"), Duration::ZERO);
        assert!(matches!(result, Err(ClockError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn restart_without_endpoint_clears_sync() {
        let (clock, _source) = manual_clock();
        clock
            .start(None, Some("http://127.0.0.1:9/time"), Duration::from_secs(30))
            .unwrap();
        assert_eq!(clock.mode(), ClockMode::RunningWithSync);
        assert_eq!(
            clock.sync_status().endpoint.as_deref(),
            Some("http://127.0.0.1:9/time")
        );

        clock.start(None, None, Duration::ZERO).unwrap();
        assert_eq!(clock.mode(), ClockMode::Running);
        assert_eq!(clock.sync_status().endpoint, None);
        assert!(clock.task_slot().is_none());
    }

    #[tokio::test]
    async fn start_stop_cycles_leave_no_task() {
        let (clock, _source) = manual_clock();
        for _ in 0..20 {
            clock
                .start(None, Some("http://127.0.0.1:9/time"), Duration::from_secs(1))
                .unwrap();
            assert!(clock.task_slot().is_some());
            clock.stop();
            assert!(clock.task_slot().is_none());
            assert!(!clock.sync_status().enabled);
        }
    }

    #[test]
    fn invalid_speed_config_is_rejected() {
        let cfg = ClockConfig {
            real_minutes_per_sim_day: 0.0,
            ..ClockConfig::default()
        };
        assert!(matches!(Clock::new(&cfg), Err(ClockError::InvalidConfig { .. })));
    }

    #[test]
    fn stale_epoch_cannot_apply_or_count() {
        let (clock, _source) = manual_clock();
        clock.start(Some(sim_start()), None, Duration::ZERO).unwrap();
        let stale = clock.shared.lock().epoch.wrapping_sub(1);
        assert!(!clock.shared.apply_synced(wall_start(), Some(stale)));
        assert!(matches!(clock.shared.record_failure(stale), FailureOutcome::Stale));
        assert_eq!(clock.now(), sim_start());
        assert_eq!(clock.sync_status().failed_attempts, 0);
    }
}
