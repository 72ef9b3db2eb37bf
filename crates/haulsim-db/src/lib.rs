//! `PostgreSQL` persistence for the haulsim logistics simulation.
//!
//! The bootstrap treats the database as disposable: every run drops the
//! public schema, re-applies the migrations, and seeds the reference
//! tables inside a single transaction before any trucks are written.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, schema reset, and migrations
//! - [`seed_store`] -- Transactional insert of the reference rows
//! - [`fleet_store`] -- Truck count and truck inserts
//! - [`error`] -- Shared error types

pub mod error;
pub mod fleet_store;
pub mod postgres;
pub mod seed_store;

pub use error::DbError;
pub use fleet_store::FleetStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use seed_store::SeedTransaction;
