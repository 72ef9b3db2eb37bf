//! Reference rows written fresh on every bootstrap run.
//!
//! The schema is dropped and recreated before seeding, so these rows are
//! always inserted into empty tables inside a single transaction.

use serde::{Deserialize, Serialize};

/// Pickup request lifecycle states, in workflow order.
pub const PICKUP_STATUSES: [&str; 7] = [
    "Pending Payment",
    "Payment Received",
    "Assigned To Truck",
    "Collected",
    "In Transit",
    "Delivered",
    "Cancelled",
];

/// Service types offered by the business as `(id, name)`.
pub const SERVICE_TYPES: [(i32, &str); 2] = [(1, "Collection"), (2, "Delivery")];

/// Truck type row every run starts with.
pub const DEFAULT_TRUCK_TYPE: &str = "Small Truck";

/// A single reference row inserted during core seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedRow {
    /// A row in the pickup status table.
    PickupStatus {
        /// Status name.
        name: String,
    },
    /// A row in the service type table.
    ServiceType {
        /// Fixed identifier.
        id: i32,
        /// Service name.
        name: String,
    },
    /// A row in the truck type table.
    TruckType {
        /// Truck type name.
        name: String,
    },
}

impl SeedRow {
    /// Name of the table this row belongs to (for logging).
    pub const fn table(&self) -> &'static str {
        match self {
            Self::PickupStatus { .. } => "pickup_status",
            Self::ServiceType { .. } => "service_type",
            Self::TruckType { .. } => "truck_type",
        }
    }
}

/// All core reference rows, in insertion order.
pub fn core_seed_rows() -> Vec<SeedRow> {
    let statuses = PICKUP_STATUSES.iter().map(|name| SeedRow::PickupStatus {
        name: (*name).to_owned(),
    });
    let services = SERVICE_TYPES.iter().map(|(id, name)| SeedRow::ServiceType {
        id: *id,
        name: (*name).to_owned(),
    });
    let truck_type = std::iter::once(SeedRow::TruckType {
        name: DEFAULT_TRUCK_TYPE.to_owned(),
    });
    statuses.chain(services).chain(truck_type).collect()
}
