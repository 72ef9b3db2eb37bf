//! Truck market values and purchase plans.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A truck variant currently offered by the market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruckOffer {
    /// Variant name as listed by the market (e.g. `"small_truck"`).
    pub name: String,
    /// Purchase price of a single truck.
    pub unit_price: Decimal,
    /// Cost of operating one truck for one simulated day.
    pub daily_operating_cost: Decimal,
    /// Maximum load a single truck can carry.
    pub max_load: u32,
    /// Number of trucks of this variant the market can sell.
    pub quantity_available: u32,
}

impl TruckOffer {
    /// Whether this offer is one of the "small" truck variants.
    ///
    /// Matching is case-insensitive on the variant name.
    pub fn is_small(&self) -> bool {
        self.name.to_lowercase().contains("small")
    }
}

/// One line of a [`TruckPurchasePlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLine {
    /// Truck variant name to order from the market.
    pub name: String,
    /// Price of a single truck.
    pub unit_price: Decimal,
    /// Daily operating cost of a single truck.
    pub daily_operating_cost: Decimal,
    /// Maximum load of a single truck.
    pub max_load: u32,
    /// Number of trucks to buy.
    pub quantity_to_buy: u32,
}

impl PlanLine {
    /// The persisted description of one truck bought on this line.
    pub fn truck_spec(&self) -> TruckSpec {
        TruckSpec {
            type_name: self.name.clone(),
            daily_operating_cost: self.daily_operating_cost,
            max_load: self.max_load,
        }
    }
}

/// A fleet purchase plan together with the loan needed to fund it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruckPurchasePlan {
    /// Lines to order, in order.
    pub lines: Vec<PlanLine>,
    /// Amount to request from the bank before purchasing.
    pub loan_amount: Decimal,
}

impl TruckPurchasePlan {
    /// Total number of trucks across all lines.
    pub fn total_trucks(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity_to_buy))
    }
}

/// The persisted shape of a single truck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruckSpec {
    /// Truck type name.
    pub type_name: String,
    /// Daily operating cost.
    pub daily_operating_cost: Decimal,
    /// Maximum load.
    pub max_load: u32,
}

/// Confirmation of an order placed with the market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrder {
    /// Market-assigned order identifier.
    pub order_id: String,
    /// Bank account the market expects payment into.
    pub bank_account: String,
    /// Total amount due for the whole order.
    pub total_price: Decimal,
    /// Number of trucks in the order.
    pub quantity: u32,
}
