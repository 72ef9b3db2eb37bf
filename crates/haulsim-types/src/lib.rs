//! Shared domain types for the haulsim logistics simulation.
//!
//! This crate holds the plain values that flow between the clock, the
//! bootstrap orchestrator, the persistence layer, and the HTTP clients.
//! Nothing here performs I/O.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for persisted entities
//! - [`fleet`] -- Truck offers, purchase plans, and market orders
//! - [`finance`] -- Bank accounts, loan decisions, and loan attempts
//! - [`seed`] -- Fixed reference rows written on every bootstrap run

pub mod finance;
pub mod fleet;
pub mod ids;
pub mod seed;

pub use finance::{BankAccount, LoanAttempt, LoanDecision};
pub use fleet::{MarketOrder, PlanLine, TruckOffer, TruckPurchasePlan, TruckSpec};
pub use ids::TruckId;
pub use seed::{
    DEFAULT_TRUCK_TYPE, PICKUP_STATUSES, SERVICE_TYPES, SeedRow, core_seed_rows,
};
