//! Cost model: slippage and fees.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Fees are symmetric per side, in basis points of the fill notional.

use crate::domain::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Slippage in basis points, applied directionally.
    pub slippage_bps: f64,
    /// Fee in basis points of notional, per side.
    pub fee_bps: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, fee_bps: f64) -> Self {
        Self {
            slippage_bps,
            fee_bps,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    fn slip_fraction(&self) -> f64 {
        self.slippage_bps / 10_000.0
    }

    fn fee_fraction(&self) -> f64 {
        self.fee_bps / 10_000.0
    }

    /// Fill price after slippage.
    pub fn fill_price(&self, raw_price: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => raw_price * (1.0 + self.slip_fraction()),
            OrderSide::Sell => raw_price * (1.0 - self.slip_fraction()),
        }
    }

    /// `fee = notional * fee_bps / 10_000`
    pub fn fee(&self, notional: f64) -> f64 {
        notional * self.fee_fraction()
    }

    /// Cash needed per unit of reference-price notional on a buy.
    pub fn buy_factor(&self) -> f64 {
        (1.0 + self.slip_fraction()) * (1.0 + self.fee_fraction())
    }

    /// Cash received per unit of reference-price notional on a sell.
    pub fn sell_factor(&self) -> f64 {
        (1.0 - self.slip_fraction()) * (1.0 - self.fee_fraction())
    }

    /// Signed cash effect of filling `quantity` at `raw_price`, costs included.
    pub fn cash_delta(&self, raw_price: f64, side: OrderSide, quantity: f64) -> f64 {
        let notional = self.fill_price(raw_price, side) * quantity;
        let fee = self.fee(notional);
        match side {
            OrderSide::Buy => -(notional + fee),
            OrderSide::Sell => notional - fee,
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::frictionless()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_returns_raw_price() {
        let cost = CostModel::frictionless();
        assert_eq!(cost.fill_price(100.0, OrderSide::Buy), 100.0);
        assert_eq!(cost.fill_price(100.0, OrderSide::Sell), 100.0);
        assert_eq!(cost.fee(5_000.0), 0.0);
        assert_eq!(cost.buy_factor(), 1.0);
    }

    #[test]
    fn buy_slippage_increases_price() {
        let cost = CostModel::new(10.0, 0.0); // 10 bps
        // 100 * (1 + 10/10000) = 100.10
        assert!((cost.fill_price(100.0, OrderSide::Buy) - 100.10).abs() < 1e-10);
    }

    #[test]
    fn sell_slippage_decreases_price() {
        let cost = CostModel::new(10.0, 0.0);
        assert!((cost.fill_price(100.0, OrderSide::Sell) - 99.90).abs() < 1e-10);
    }

    #[test]
    fn fee_is_bps_of_notional() {
        let cost = CostModel::new(0.0, 25.0);
        assert!((cost.fee(10_000.0) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn cash_delta_matches_factors() {
        let cost = CostModel::new(5.0, 10.0);
        let buy = cost.cash_delta(50.0, OrderSide::Buy, 10.0);
        let sell = cost.cash_delta(50.0, OrderSide::Sell, 10.0);
        assert!((buy + 500.0 * cost.buy_factor()).abs() < 1e-9);
        assert!((sell - 500.0 * cost.sell_factor()).abs() < 1e-9);
        assert!(sell < 500.0 && -buy > 500.0);
    }
}
