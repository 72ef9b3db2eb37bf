//! Resilient environment bootstrap for the haulsim logistics simulation.
//!
//! A bootstrap run wipes and rebuilds the database, resets the simulation
//! clock, and then brings the simulated business into a working state: a
//! bank account, a loan, and a small truck fleet. The first half is
//! all-or-nothing; the second half absorbs every failure of the external
//! services through retries and fallbacks.
//!
//! # Modules
//!
//! - [`bootstrap`] -- [`BootstrapOrchestrator`] and its outcome types.
//! - [`collaborators`] -- Traits for the database, bank, and market.
//! - [`config`] -- Configuration loading from `haulsim-config.yaml`.
//! - [`planning`] -- Fleet purchase planning and fallback plans.
//! - [`retry`] -- Exponential backoff for integration calls.
//!
//! [`BootstrapOrchestrator`]: bootstrap::BootstrapOrchestrator

pub mod bootstrap;
pub mod collaborators;
pub mod config;
pub mod planning;
pub mod retry;
