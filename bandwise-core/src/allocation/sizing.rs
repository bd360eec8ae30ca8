//! Notional → quantity resolution and the projected cash budget.

use crate::domain::{LotMode, OrderSide};
use crate::execution::CostModel;

/// Amounts below this are treated as nothing left to allocate.
pub const NOTIONAL_EPSILON: f64 = 1e-6;

/// Tradable quantity for `notional` at `price` under `lot_mode`.
///
/// Always rounds down: integer lots truncate, fractional lots floor to
/// `increment`.
pub fn resolve_quantity(notional: f64, price: f64, lot_mode: LotMode, increment: f64) -> f64 {
    if !(price.is_finite() && price > 0.0) {
        return 0.0;
    }
    lot_mode.resolve(notional / price, increment)
}

/// Cash expected to be available as the plan's trades are applied in order.
///
/// Sells credit their proceeds net of slippage and fees; buys are limited so
/// that notional plus estimated costs never exceeds what is left.
#[derive(Debug, Clone, Copy)]
pub struct CashBudget {
    available: f64,
    cost: CostModel,
}

impl CashBudget {
    pub fn new(cash: f64, cost: CostModel) -> Self {
        Self {
            available: cash.max(0.0),
            cost,
        }
    }

    pub fn available(&self) -> f64 {
        self.available
    }

    /// Largest reference-price notional a buy can have right now.
    pub fn max_buy_notional(&self) -> f64 {
        self.available / self.cost.buy_factor()
    }

    /// Whether buying `quantity` at `price` fits in what is left, costs included.
    pub fn affords(&self, price: f64, quantity: f64) -> bool {
        -self.cost.cash_delta(price, OrderSide::Buy, quantity) <= self.available
    }

    pub fn debit_buy(&mut self, price: f64, quantity: f64) {
        let required = -self.cost.cash_delta(price, OrderSide::Buy, quantity);
        self.available = (self.available - required).max(0.0);
    }

    pub fn credit_sell(&mut self, price: f64, quantity: f64) {
        self.available += self.cost.cash_delta(price, OrderSide::Sell, quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_lot_truncates() {
        // 290 / 100 = 2.9 → 2
        assert_eq!(resolve_quantity(290.0, 100.0, LotMode::Integer, 1e-6), 2.0);
    }

    #[test]
    fn fractional_lot_floors_to_increment() {
        let q = resolve_quantity(1_000.0, 30_000.0, LotMode::Fractional, 1e-6);
        assert!((q - 0.033_333).abs() < 1e-12);
        assert!(q * 30_000.0 <= 1_000.0);
    }

    #[test]
    fn no_quantity_without_price() {
        assert_eq!(resolve_quantity(1_000.0, 0.0, LotMode::Integer, 1e-6), 0.0);
        assert_eq!(resolve_quantity(1_000.0, f64::NAN, LotMode::Fractional, 1e-6), 0.0);
    }

    #[test]
    fn budget_accounts_for_costs() {
        let cost = CostModel::new(0.0, 100.0); // 1% fee
        let mut budget = CashBudget::new(1_010.0, cost);
        assert!((budget.max_buy_notional() - 1_000.0).abs() < 1e-9);
        assert!(budget.affords(100.0, 10.0));
        assert!(!budget.affords(100.0, 10.1));
        budget.debit_buy(100.0, 5.0);
        assert!((budget.available() - 505.0).abs() < 1e-9);
        budget.credit_sell(100.0, 1.0);
        assert!((budget.available() - 604.0).abs() < 1e-9);
    }
}
