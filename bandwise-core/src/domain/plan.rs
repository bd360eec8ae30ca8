//! Allocation plan: the immutable output of the allocation engine.
//!
//! Consumed by the execution simulator (BUY/SELL entries become orders in
//! plan order) and by reporting (everything, including HOLD and REJECTED
//! entries and the warnings that explain them).

use super::lot::LotMode;
use super::order::{Order, OrderSide};
use super::{AssetClass, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proposed action for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanAction {
    Buy,
    Sell,
    Hold,
    /// Decided at planning time that the trade cannot be made (e.g. no price).
    Rejected,
}

impl PlanAction {
    pub fn side(self) -> Option<OrderSide> {
        match self {
            PlanAction::Buy => Some(OrderSide::Buy),
            PlanAction::Sell => Some(OrderSide::Sell),
            PlanAction::Hold | PlanAction::Rejected => None,
        }
    }
}

/// One proposed or held action within the plan.
///
/// `target_weight`, `current_weight` and `drift` are the class-level figures
/// that drove the decision; `suggested_notional` is the symbol-level amount
/// before lot resolution, `quantity` the resolved trade size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub asset_class: AssetClass,
    pub symbol: Symbol,
    pub target_weight: f64,
    pub current_weight: f64,
    pub drift: f64,
    pub action: PlanAction,
    pub suggested_notional: f64,
    pub price: Option<f64>,
    pub quantity: f64,
    pub lot_mode: LotMode,
    pub reason: Option<String>,
}

impl PlanEntry {
    pub fn is_trade(&self) -> bool {
        self.action.side().is_some() && self.quantity > 0.0
    }

    /// `quantity × price` at the planning price (0 without a price).
    pub fn resolved_notional(&self) -> f64 {
        self.price.map_or(0.0, |p| p * self.quantity)
    }
}

/// Class-level weight comparison for one configured asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDrift {
    pub asset_class: AssetClass,
    pub target_weight: f64,
    pub current_weight: f64,
    pub drift: f64,
    pub band: f64,
    pub out_of_band: bool,
}

/// Category of a recoverable condition recorded in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// NAV is zero or undefined; nothing can be rebalanced.
    EmptyPortfolio,
    /// A selected symbol has no price; its entry is REJECTED.
    MissingPrice,
    /// A held symbol has no price and is left out of NAV.
    UnpricedHolding,
    /// A held symbol cannot be attributed to a configured class.
    UnclassifiedHolding,
    /// Out-of-band class with no signals eligible for the needed direction.
    NoEligibleSignals,
    /// No signal batch was found for a configured class.
    MissingBatch,
    /// A signal batch failed the freshness check.
    StaleBatch,
    /// A single malformed signal record was dropped.
    DroppedSignal,
    /// A symbol or class cap limited an allocation.
    RiskCapClipped,
    /// Projected cash limited a purchase.
    CashLimited,
    /// A trade resolved below one lot or the minimum trade size.
    BelowMinimum,
    /// Signals ran out before the class came back inside its band.
    PartialRebalance,
}

/// A recoverable condition recorded alongside the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWarning {
    pub kind: WarningKind,
    pub asset_class: Option<AssetClass>,
    pub symbol: Option<Symbol>,
    pub message: String,
}

impl PlanWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            asset_class: None,
            symbol: None,
            message: message.into(),
        }
    }

    pub fn for_class(mut self, asset_class: impl Into<AssetClass>) -> Self {
        self.asset_class = Some(asset_class.into());
        self
    }

    pub fn for_symbol(mut self, symbol: impl Into<Symbol>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

/// The allocation engine's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// BLAKE3 hash over the plan body (everything but this field).
    pub plan_id: String,
    pub generated_at: DateTime<Utc>,
    /// Version of the portfolio state the plan was computed against.
    pub base_version: u64,
    pub nav: f64,
    pub cash: f64,
    pub classes: Vec<ClassDrift>,
    pub entries: Vec<PlanEntry>,
    pub warnings: Vec<PlanWarning>,
}

impl AllocationPlan {
    /// Stamp the content hash. Called once by the engine; the plan is
    /// treated as immutable afterwards.
    pub fn sealed(mut self) -> Self {
        self.plan_id = self.content_hash();
        self
    }

    /// Deterministic hash of the plan body.
    pub fn content_hash(&self) -> String {
        let mut body = self.clone();
        body.plan_id = String::new();
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Orders for every BUY/SELL entry, in plan order.
    pub fn orders(&self) -> Vec<Order> {
        self.entries
            .iter()
            .filter(|e| e.is_trade())
            .enumerate()
            .filter_map(|(i, e)| {
                e.action.side().map(|side| Order {
                    id: Order::order_id(&self.plan_id, i),
                    symbol: e.symbol.clone(),
                    side,
                    quantity: e.quantity,
                    asset_class: e.asset_class.clone(),
                    lot_mode: e.lot_mode,
                })
            })
            .collect()
    }

    pub fn trade_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_trade()).count()
    }

    /// True when the plan would not move any money.
    pub fn is_empty(&self) -> bool {
        self.trade_count() == 0
    }

    pub fn class(&self, asset_class: &str) -> Option<&ClassDrift> {
        self.classes.iter().find(|c| c.asset_class == asset_class)
    }

    pub fn entries_for<'a>(&'a self, asset_class: &'a str) -> impl Iterator<Item = &'a PlanEntry> {
        self.entries.iter().filter(move |e| e.asset_class == asset_class)
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &PlanWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}
