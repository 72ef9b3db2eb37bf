//! Fleet purchase planning.
//!
//! The plan always buys three trucks of the first "small" variant the
//! market offers and borrows enough to pay for them plus two weeks of
//! running costs. Without a small offer a fixed fallback plan is used.

use haulsim_types::{PlanLine, TruckOffer, TruckPurchasePlan};
use rust_decimal::Decimal;

/// Trucks bought of the selected variant.
pub const PURCHASE_QUANTITY: u32 = 3;

/// Days of operating cost the loan covers.
pub const OPERATING_DAYS_FUNDED: u32 = 14;

/// Truck type name used by both fallback plans.
pub const FALLBACK_TRUCK_NAME: &str = "Small Truck";

/// Loan requested with the fallback plan.
///
/// Fixed; not derived from the fallback plan's own numbers.
pub const FALLBACK_LOAN_AMOUNT: i64 = 51_000;

/// Loan needed to buy `quantity` trucks of `line` and run them for
/// [`OPERATING_DAYS_FUNDED`] days.
pub fn loan_amount_for(line: &PlanLine) -> Decimal {
    let quantity = Decimal::from(line.quantity_to_buy);
    let days = Decimal::from(OPERATING_DAYS_FUNDED);
    let purchase = line.unit_price.checked_mul(quantity);
    let running = line
        .daily_operating_cost
        .checked_mul(quantity)
        .and_then(|cost| cost.checked_mul(days));
    purchase
        .zip(running)
        .and_then(|(p, r)| p.checked_add(r))
        .unwrap_or(Decimal::MAX)
}

/// Plan used when the market offers no small truck.
pub fn fallback_plan() -> TruckPurchasePlan {
    TruckPurchasePlan {
        lines: vec![PlanLine {
            name: FALLBACK_TRUCK_NAME.to_owned(),
            unit_price: Decimal::new(10_000, 0),
            daily_operating_cost: Decimal::new(500, 0),
            max_load: 2000,
            quantity_to_buy: PURCHASE_QUANTITY,
        }],
        loan_amount: Decimal::new(FALLBACK_LOAN_AMOUNT, 0),
    }
}

/// Last-resort two-truck fleet, bought without a loan.
pub fn minimal_fleet_plan() -> TruckPurchasePlan {
    let line = PlanLine {
        name: FALLBACK_TRUCK_NAME.to_owned(),
        unit_price: Decimal::new(8000, 0),
        daily_operating_cost: Decimal::new(400, 0),
        max_load: 1500,
        quantity_to_buy: 2,
    };
    TruckPurchasePlan {
        lines: vec![line],
        loan_amount: Decimal::ZERO,
    }
}

/// Choose what to buy from the current market offers.
pub fn plan_purchase(offers: &[TruckOffer]) -> TruckPurchasePlan {
    let Some(offer) = offers.iter().find(|offer| offer.is_small()) else {
        return fallback_plan();
    };

    let line = PlanLine {
        name: offer.name.clone(),
        unit_price: offer.unit_price,
        daily_operating_cost: offer.daily_operating_cost,
        max_load: offer.max_load,
        quantity_to_buy: PURCHASE_QUANTITY,
    };
    let loan_amount = loan_amount_for(&line);
    TruckPurchasePlan {
        lines: vec![line],
        loan_amount,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn offer(name: &str, price: i64, cost: i64) -> TruckOffer {
        TruckOffer {
            name: name.to_owned(),
            unit_price: Decimal::new(price, 0),
            daily_operating_cost: Decimal::new(cost, 0),
            max_load: 2500,
            quantity_available: 10,
        }
    }

    #[test]
    fn empty_market_uses_fallback_plan() {
        let plan = plan_purchase(&[]);
        assert_eq!(plan.lines.len(), 1);
        let line = &plan.lines[0];
        assert_eq!(line.name, "Small Truck");
        assert_eq!(line.quantity_to_buy, 3);
        assert_eq!(line.unit_price, Decimal::new(10_000, 0));
        assert_eq!(line.daily_operating_cost, Decimal::new(500, 0));
        assert_eq!(line.max_load, 2000);
        assert_eq!(plan.loan_amount, Decimal::new(51_000, 0));
    }

    #[test]
    fn fallback_loan_is_not_recomputed() {
        let plan = fallback_plan();
        assert_ne!(plan.loan_amount, loan_amount_for(&plan.lines[0]));
    }

    #[test]
    fn small_offer_is_selected() {
        let offers = [offer("large_truck", 40_000, 900), offer("small_truck", 12_000, 600)];
        let plan = plan_purchase(&offers);
        assert_eq!(plan.lines[0].name, "small_truck");
        assert_eq!(plan.lines[0].quantity_to_buy, 3);
        // 12000 * 3 + 600 * 3 * 14
        assert_eq!(plan.loan_amount, Decimal::new(61_200, 0));
    }

    #[test]
    fn no_small_offer_uses_fallback() {
        let plan = plan_purchase(&[offer("medium_truck", 20_000, 700)]);
        assert_eq!(plan, fallback_plan());
    }

    #[test]
    fn minimal_fleet_is_two_small_trucks() {
        let plan = minimal_fleet_plan();
        assert_eq!(plan.total_trucks(), 2);
        assert_eq!(plan.lines[0].unit_price, Decimal::new(8000, 0));
        assert_eq!(plan.lines[0].daily_operating_cost, Decimal::new(400, 0));
        assert_eq!(plan.lines[0].max_load, 1500);
    }
}
