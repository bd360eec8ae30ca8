//! Orders derived from plan entries.

use super::lot::LotMode;
use super::AssetClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A single order handed to the execution simulator.
///
/// Derived from a BUY/SELL plan entry and never persisted on its own; the
/// execution record is the durable trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Deterministic id: plan id prefix + position in the plan.
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub asset_class: AssetClass,
    pub lot_mode: LotMode,
}

impl Order {
    pub fn order_id(plan_id: &str, index: usize) -> String {
        let prefix: String = plan_id.chars().take(12).collect();
        format!("{prefix}-{index:04}")
    }
}
