//! Clock configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Milliseconds in one simulated day.
pub const MS_PER_SIM_DAY: f64 = 86_400_000.0;

/// Milliseconds in one real minute.
pub const MS_PER_MINUTE: f64 = 60_000.0;

/// Settings for the simulation clock.
///
/// Mirrors the `clock` section of `haulsim-config.yaml`. Every field has a
/// default, so an empty section is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Real minutes that make up one simulated day (2 gives a 720x clock).
    pub real_minutes_per_sim_day: f64,
    /// Consecutive auto-sync failures tolerated before sync is disabled.
    pub max_sync_failures: u32,
    /// Timeout for a single sync request in milliseconds.
    pub sync_timeout_ms: u64,
    /// Interval between automatic sync attempts in milliseconds.
    pub sync_interval_ms: u64,
    /// Time authority endpoint used when the engine starts the clock.
    pub sync_endpoint: Option<String>,
    /// Simulated time to start from. Defaults to the wall clock.
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            real_minutes_per_sim_day: 2.0,
            max_sync_failures: 3,
            sync_timeout_ms: 5000,
            sync_interval_ms: 30_000,
            sync_endpoint: None,
            start_time: None,
        }
    }
}

impl ClockConfig {
    /// Ratio of simulated time to real time.
    pub fn speed_factor(&self) -> f64 {
        MS_PER_SIM_DAY / (self.real_minutes_per_sim_day * MS_PER_MINUTE)
    }

    /// Interval between automatic sync attempts.
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Timeout applied to each sync request.
    pub const fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }
}
