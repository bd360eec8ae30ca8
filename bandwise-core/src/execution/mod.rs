//! Paper execution simulator: applies a plan's orders against portfolio state.
//!
//! The simulator is stateless: it carries only the cost model. It borrows the
//! plan and the starting state and returns a new state plus one
//! [`ExecutionRecord`] per order. Orders are applied strictly in plan order;
//! each sees the cash and holdings left by the ones before it.
//!
//! Rejections (insufficient cash, no position, no price) are records, not
//! errors. Only a stale plan or a state that fails its invariants aborts.

pub mod cost;

pub use cost::CostModel;

use crate::config::StrategyConfig;
use crate::domain::lot::QTY_EPSILON;
use crate::domain::{
    AllocationPlan, ExecutionRecord, ExecutionStatus, NavPoint, Order, OrderSide, PortfolioState,
    Position, PriceBook, StateError,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use thiserror::Error;

/// Why a plan could not be applied at all.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("plan was computed against state version {plan_version}, current state is version {state_version}")]
    StalePlan { plan_version: u64, state_version: u64 },

    #[error("portfolio state is invalid: {0}")]
    InvalidState(#[from] StateError),
}

/// Result of applying one plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub state: PortfolioState,
    pub records: Vec<ExecutionRecord>,
    /// NAV after all orders, as appended to the history.
    pub nav: f64,
}

impl SimulationOutcome {
    pub fn filled(&self) -> usize {
        self.records.iter().filter(|r| r.is_filled()).count()
    }

    pub fn rejected(&self) -> usize {
        self.records.len() - self.filled()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaperSimulator {
    cost: CostModel,
}

impl PaperSimulator {
    pub fn new(cost: CostModel) -> Self {
        Self { cost }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.cost_model())
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    /// Apply every BUY/SELL entry of `plan` to a copy of `state`.
    ///
    /// The NAV after the last order is appended to the history stamped with
    /// `timestamp`. The state version is left alone; persisting bumps it.
    pub fn apply(
        &self,
        plan: &AllocationPlan,
        state: &PortfolioState,
        prices: &PriceBook,
        timestamp: DateTime<Utc>,
    ) -> Result<SimulationOutcome, ExecutionError> {
        if plan.base_version != state.version {
            return Err(ExecutionError::StalePlan {
                plan_version: plan.base_version,
                state_version: state.version,
            });
        }
        state.check_invariants()?;

        let mut next = state.clone();
        let records: Vec<ExecutionRecord> = plan
            .orders()
            .iter()
            .map(|order| self.execute(order, &mut next, prices, timestamp))
            .collect();

        let nav = next.nav(prices);
        next.nav_history.push(NavPoint { timestamp, nav });

        let outcome = SimulationOutcome {
            state: next,
            records,
            nav,
        };
        info!(
            "applied plan {}: {} filled, {} rejected, NAV {:.2}",
            short_id(&plan.plan_id),
            outcome.filled(),
            outcome.rejected(),
            nav
        );
        Ok(outcome)
    }

    /// Execute a single order against `state`, mutating it only on a fill.
    pub fn execute(
        &self,
        order: &Order,
        state: &mut PortfolioState,
        prices: &PriceBook,
        timestamp: DateTime<Utc>,
    ) -> ExecutionRecord {
        let mut record = ExecutionRecord {
            order_id: order.id.clone(),
            timestamp,
            symbol: order.symbol.clone(),
            asset_class: order.asset_class.clone(),
            side: order.side,
            requested_quantity: order.quantity,
            quantity: 0.0,
            price: 0.0,
            notional: 0.0,
            fees: 0.0,
            status: ExecutionStatus::Rejected,
            reason: None,
        };

        let Some(price) = prices.get(&order.symbol) else {
            return reject(record, "no price");
        };
        record.price = price;
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return reject(record, "invalid quantity");
        }
        if !order.lot_mode.is_valid(order.quantity) {
            return reject(record, "fractional quantity for integer-lot symbol");
        }

        match order.side {
            OrderSide::Buy => self.fill_buy(order, price, state, record),
            OrderSide::Sell => self.fill_sell(order, price, state, record),
        }
    }

    fn fill_buy(
        &self,
        order: &Order,
        price: f64,
        state: &mut PortfolioState,
        mut record: ExecutionRecord,
    ) -> ExecutionRecord {
        let fill_price = self.cost.fill_price(price, OrderSide::Buy);
        let notional = fill_price * order.quantity;
        let fees = self.cost.fee(notional);
        let required = notional + fees;
        if required > state.cash {
            return reject(record, "insufficient cash");
        }

        state.cash -= required;
        let position = state
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::new(0.0, None));
        position.quantity += order.quantity;
        if position.asset_class.is_none() {
            position.asset_class = Some(order.asset_class.clone());
        }

        record.quantity = order.quantity;
        record.price = fill_price;
        record.notional = notional;
        record.fees = fees;
        record.status = ExecutionStatus::Filled;
        debug!("BUY {} {} @ {:.4}", order.quantity, order.symbol, fill_price);
        record
    }

    fn fill_sell(
        &self,
        order: &Order,
        price: f64,
        state: &mut PortfolioState,
        mut record: ExecutionRecord,
    ) -> ExecutionRecord {
        let held = state.quantity(&order.symbol);
        if held <= 0.0 {
            return reject(record, "no position");
        }
        let quantity = if order.quantity > held {
            let reason = format!(
                "WARNING: sell quantity {} exceeds held {}; clipped to {}",
                order.quantity, held, held
            );
            warn!("{}: {}", order.symbol, reason);
            record.reason = Some(reason);
            held
        } else {
            order.quantity
        };

        let fill_price = self.cost.fill_price(price, OrderSide::Sell);
        let notional = fill_price * quantity;
        let fees = self.cost.fee(notional);
        state.cash += notional - fees;

        let remaining = held - quantity;
        if remaining <= QTY_EPSILON {
            state.positions.remove(&order.symbol);
        } else if let Some(position) = state.positions.get_mut(&order.symbol) {
            position.quantity = remaining;
        }

        record.quantity = quantity;
        record.price = fill_price;
        record.notional = notional;
        record.fees = fees;
        record.status = ExecutionStatus::Filled;
        debug!("SELL {} {} @ {:.4}", quantity, order.symbol, fill_price);
        record
    }
}

fn reject(mut record: ExecutionRecord, reason: &str) -> ExecutionRecord {
    warn!(
        "order {} {} {} rejected: {}",
        record.order_id, record.side, record.symbol, reason
    );
    record.status = ExecutionStatus::Rejected;
    record.reason = Some(reason.to_string());
    record
}

fn short_id(plan_id: &str) -> &str {
    plan_id.get(..12).unwrap_or(plan_id)
}
