use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};

pub const MONEY_SCALE: u32 = 2;

/// Monetary rounding for the whole crate: round-half-away-from-zero, the
/// behavior the historical pricing data was produced with.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// One volume-discount tier; the highest tier whose `min_quantity` is met
/// wins. Percentages are fractions (0.05 = 5%).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub min_quantity: u32,
    pub discount_pct: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostingConfig {
    pub labor_pct: Decimal,
    pub overhead_pct: Decimal,
    pub profit_margin_pct: Decimal,
    pub discount_tiers: Vec<DiscountTier>,
}

impl Default for CostingConfig {
    fn default() -> Self {
        Self {
            labor_pct: Decimal::new(30, 2),
            overhead_pct: Decimal::new(20, 2),
            profit_margin_pct: Decimal::new(25, 2),
            discount_tiers: vec![
                DiscountTier { min_quantity: 3, discount_pct: Decimal::new(5, 2) },
                DiscountTier { min_quantity: 5, discount_pct: Decimal::new(10, 2) },
                DiscountTier { min_quantity: 10, discount_pct: Decimal::new(15, 2) },
            ],
        }
    }
}

impl CostingConfig {
    pub fn volume_discount(&self, quantity: u32) -> Decimal {
        self.discount_tiers
            .iter()
            .filter(|tier| quantity >= tier.min_quantity)
            .map(|tier| tier.discount_pct)
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub product_id: ProductId,
    pub quantity: u32,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub overhead_cost: Decimal,
    pub production_cost: Decimal,
    pub volume_discount_pct: Decimal,
    pub unit_price: Decimal,
    pub total_cost: Decimal,
}

/// Bill-of-materials cost roll-up with volume-tiered unit pricing.
///
/// Pure over the product passed in: no caching, no side effects. Callers
/// that need a price lock store the result (the quote does, at creation).
#[derive(Clone, Debug, Default)]
pub struct CostingEngine {
    config: CostingConfig,
}

impl CostingEngine {
    pub fn new(config: CostingConfig) -> Self {
        Self { config }
    }

    pub fn compute(&self, product: &Product, quantity: u32) -> CostBreakdown {
        let material_cost: Decimal = product
            .bill_of_materials
            .iter()
            .map(|line| line.quantity * line.unit_cost)
            .sum();

        let labor_cost = material_cost * self.config.labor_pct;
        let overhead_cost = (material_cost + labor_cost) * self.config.overhead_pct;
        let production_cost = material_cost + labor_cost + overhead_cost;
        let price_with_profit = production_cost * (Decimal::ONE + self.config.profit_margin_pct);

        let volume_discount_pct = self.config.volume_discount(quantity);
        let unit_price = round_money(price_with_profit * (Decimal::ONE - volume_discount_pct));
        let total_cost = round_money(unit_price * Decimal::from(quantity));

        CostBreakdown {
            product_id: product.id,
            quantity,
            material_cost,
            labor_cost,
            overhead_cost,
            production_cost,
            volume_discount_pct,
            unit_price,
            total_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::product::{BomLine, MaterialId, Product, ProductId};

    use super::{round_money, CostingConfig, CostingEngine, DiscountTier};

    /// Sensor unit with a single 450.00 membrane line; the worked example
    /// used across the service tests as well.
    fn sensor_unit() -> Product {
        Product {
            id: ProductId(7),
            name: "Turbidity Sensor Array".to_string(),
            base_price: Decimal::ZERO,
            active: true,
            bill_of_materials: vec![BomLine {
                material_id: MaterialId(1),
                material_name: "Filtration membrane".to_string(),
                quantity: Decimal::new(10000, 4),
                unit_cost: Decimal::new(45000, 2),
            }],
        }
    }

    #[test]
    fn cost_rollup_for_single_unit() {
        let engine = CostingEngine::default();
        let breakdown = engine.compute(&sensor_unit(), 1);

        assert_eq!(breakdown.material_cost, Decimal::new(4500000, 4));
        assert_eq!(round_money(breakdown.labor_cost), Decimal::new(13500, 2));
        assert_eq!(round_money(breakdown.overhead_cost), Decimal::new(11700, 2));
        assert_eq!(round_money(breakdown.production_cost), Decimal::new(70200, 2));
        assert_eq!(breakdown.volume_discount_pct, Decimal::ZERO);
        assert_eq!(breakdown.unit_price, Decimal::new(87750, 2));
        assert_eq!(breakdown.total_cost, Decimal::new(87750, 2));
    }

    #[test]
    fn five_units_earn_ten_percent_discount() {
        let engine = CostingEngine::default();
        let breakdown = engine.compute(&sensor_unit(), 5);

        assert_eq!(breakdown.volume_discount_pct, Decimal::new(10, 2));
        assert_eq!(breakdown.unit_price, Decimal::new(78975, 2));
        assert_eq!(breakdown.total_cost, Decimal::new(394875, 2));
    }

    #[test]
    fn discount_tiers_kick_in_exactly_at_boundaries() {
        let engine = CostingEngine::default();
        let product = sensor_unit();

        let unit_price_at = |quantity| engine.compute(&product, quantity).unit_price;

        // No discount below 3 units.
        assert_eq!(unit_price_at(1), Decimal::new(87750, 2));
        assert_eq!(unit_price_at(2), Decimal::new(87750, 2));
        // 5% at 3-4: 877.50 * 0.95 = 833.625, rounds half away from zero.
        assert_eq!(unit_price_at(3), Decimal::new(83363, 2));
        assert_eq!(unit_price_at(4), Decimal::new(83363, 2));
        // 10% at 5-9.
        assert_eq!(unit_price_at(5), Decimal::new(78975, 2));
        assert_eq!(unit_price_at(9), Decimal::new(78975, 2));
        // 15% at 10+: 877.50 * 0.85 = 745.875.
        assert_eq!(unit_price_at(10), Decimal::new(74588, 2));
        assert_eq!(unit_price_at(250), Decimal::new(74588, 2));
    }

    #[test]
    fn unit_price_is_monotonically_non_increasing_in_quantity() {
        let engine = CostingEngine::default();
        let product = sensor_unit();

        let mut previous = engine.compute(&product, 1).unit_price;
        for quantity in 2..=12 {
            let current = engine.compute(&product, quantity).unit_price;
            assert!(current <= previous, "unit price rose at quantity {quantity}");
            previous = current;
        }
    }

    #[test]
    fn total_is_the_rounded_unit_price_times_quantity() {
        let engine = CostingEngine::default();
        let product = sensor_unit();

        for quantity in [1, 2, 3, 4, 5, 9, 10, 17, 100] {
            let breakdown = engine.compute(&product, quantity);
            assert_eq!(
                breakdown.total_cost,
                round_money(breakdown.unit_price * Decimal::from(quantity)),
                "quantity {quantity}"
            );
        }
    }

    #[test]
    fn alternate_schedule_changes_pricing_without_code_changes() {
        let engine = CostingEngine::new(CostingConfig {
            labor_pct: Decimal::ZERO,
            overhead_pct: Decimal::ZERO,
            profit_margin_pct: Decimal::ZERO,
            discount_tiers: vec![DiscountTier {
                min_quantity: 2,
                discount_pct: Decimal::new(50, 2),
            }],
        });
        let breakdown = engine.compute(&sensor_unit(), 2);

        // Raw material cost, halved by the single 50% tier.
        assert_eq!(breakdown.unit_price, Decimal::new(22500, 2));
        assert_eq!(breakdown.total_cost, Decimal::new(45000, 2));
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(round_money(Decimal::new(833625, 3)), Decimal::new(83363, 2));
        assert_eq!(round_money(Decimal::new(-833625, 3)), Decimal::new(-83363, 2));
        assert_eq!(round_money(Decimal::new(745875, 3)), Decimal::new(74588, 2));
    }
}
