use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether a float quantity is a whole number of units.
pub const QTY_EPSILON: f64 = 1e-9;

/// Default smallest tradable increment for fractional-lot classes.
pub const DEFAULT_FRACTIONAL_INCREMENT: f64 = 1e-6;

/// Lot discreteness for an asset class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LotMode {
    /// Whole units only (shares, ETF units).
    Integer,
    /// Arbitrary fractions down to a fixed increment (crypto).
    Fractional,
}

impl LotMode {
    /// Resolve a raw quantity to a tradable one.
    ///
    /// Always truncates toward zero so a resolved buy never costs more than the
    /// notional it was sized from. `increment` only applies to fractional lots.
    pub fn resolve(self, raw_quantity: f64, increment: f64) -> f64 {
        if !raw_quantity.is_finite() || raw_quantity <= 0.0 {
            return 0.0;
        }
        match self {
            LotMode::Integer => (raw_quantity + QTY_EPSILON).trunc(),
            LotMode::Fractional => {
                let increment = if increment > 0.0 {
                    increment
                } else {
                    DEFAULT_FRACTIONAL_INCREMENT
                };
                let units = (raw_quantity / increment + QTY_EPSILON).floor();
                units * increment
            }
        }
    }

    /// Whether `quantity` is representable under this lot mode.
    pub fn is_valid(self, quantity: f64) -> bool {
        if !quantity.is_finite() {
            return false;
        }
        match self {
            LotMode::Integer => (quantity - quantity.round()).abs() < QTY_EPSILON,
            LotMode::Fractional => true,
        }
    }
}
