//! Accelerated simulation clock for the haulsim logistics simulation.
//!
//! The clock maps wall-clock time onto a faster simulated timeline. It can
//! be started, stopped, manually overridden, and periodically reconciled
//! against an external time authority over HTTP.
//!
//! # Modules
//!
//! - [`clock`] -- The [`Clock`] itself: anchors, state machine, auto-sync task.
//! - [`config`] -- [`ClockConfig`] deserialized from the YAML config.
//! - [`source`] -- [`TimeSource`] abstraction over the wall clock.
//! - [`sync`] -- One-shot fetch of simulated time from a time authority.

pub mod clock;
pub mod config;
pub mod source;
pub mod sync;

pub use clock::{Clock, ClockError, ClockMode, SyncStatus};
pub use config::ClockConfig;
pub use source::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use sync::SyncError;
