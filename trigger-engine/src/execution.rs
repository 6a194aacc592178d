//! Deterministic order execution model
//!
//! Fills happen at the requested price adjusted by:
//! - Multiplicative adverse slippage
//! - Commission on the fill notional
//!
//! With a zero-friction config the fill is exactly the requested price.

use common::{ExecutionConfig, Side};

/// A completed fill
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub side: Side,
    pub quantity: f64,
    /// Final execution price (after slippage)
    pub price: f64,
    pub commission: f64,
    pub price_adjustments: PriceAdjustments,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Breakdown of price adjustments applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceAdjustments {
    pub base_price: f64,
    pub slippage: f64,
}

/// Execution simulator applying the configured friction
#[derive(Debug, Clone, Default)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Check if any friction is applied
    pub fn is_frictionless(&self) -> bool {
        self.config.is_frictionless()
    }

    /// Fill `quantity` at `price` on `side`
    pub fn execute(&self, side: Side, quantity: f64, price: f64) -> Fill {
        let slippage = self.calculate_slippage(price, side);
        let fill_price = price + slippage;
        let commission = quantity * fill_price * self.config.commission_pct;

        Fill {
            side,
            quantity,
            price: fill_price,
            commission,
            price_adjustments: PriceAdjustments {
                base_price: price,
                slippage,
            },
        }
    }

    /// Buys pay up, sells receive less
    fn calculate_slippage(&self, price: f64, side: Side) -> f64 {
        let slippage = price * self.config.slippage_pct;
        match side {
            Side::Buy => slippage,
            Side::Sell => -slippage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frictionless_fill() {
        let sim = ExecutionSimulator::default();
        let fill = sim.execute(Side::Buy, 10.0, 100.0);

        assert!(sim.is_frictionless());
        assert_eq!(fill.price, 100.0);
        assert_eq!(fill.commission, 0.0);
        assert_eq!(fill.notional(), 1000.0);
    }

    #[test]
    fn test_slippage_direction() {
        let sim = ExecutionSimulator::new(ExecutionConfig::default().with_slippage(0.001));

        let buy = sim.execute(Side::Buy, 1.0, 100.0);
        let sell = sim.execute(Side::Sell, 1.0, 100.0);

        assert_relative_eq!(buy.price, 100.1);
        assert_relative_eq!(sell.price, 99.9);
        assert!(buy.price_adjustments.slippage > 0.0);
        assert!(sell.price_adjustments.slippage < 0.0);
    }

    #[test]
    fn test_commission_on_fill_notional() {
        let sim = ExecutionSimulator::new(
            ExecutionConfig::default()
                .with_slippage(0.01)
                .with_commission(0.002),
        );
        let fill = sim.execute(Side::Buy, 10.0, 100.0);

        // 10 * 101 * 0.002
        assert_relative_eq!(fill.commission, 2.02, epsilon = 1e-12);
    }
}
