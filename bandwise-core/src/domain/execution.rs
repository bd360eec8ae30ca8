use super::order::OrderSide;
use super::AssetClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one processed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Filled,
    Rejected,
}

/// Audit record for one processed order. Append-only; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub order_id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    /// Quantity the order asked for.
    pub requested_quantity: f64,
    /// Quantity actually filled (0 when rejected, clipped for oversized sells).
    pub quantity: f64,
    /// Fill price after slippage (the reference price when rejected).
    pub price: f64,
    /// `quantity × price`, before fees.
    pub notional: f64,
    pub fees: f64,
    pub status: ExecutionStatus,
    pub reason: Option<String>,
}

impl ExecutionRecord {
    pub fn is_filled(&self) -> bool {
        self.status == ExecutionStatus::Filled
    }

    /// Signed cash effect of this record (negative for buys).
    pub fn cash_delta(&self) -> f64 {
        if !self.is_filled() {
            return 0.0;
        }
        match self.side {
            OrderSide::Buy => -(self.notional + self.fees),
            OrderSide::Sell => self.notional - self.fees,
        }
    }
}
