//! Portfolio state: cash, holdings and NAV history, persisted between runs.

use super::prices::PriceBook;
use super::{AssetClass, Symbol};
use crate::config::StrategyConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A held quantity of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    /// Class the symbol was bought under; lets holdings be classified on
    /// later runs even when no signal mentions them.
    #[serde(default)]
    pub asset_class: Option<AssetClass>,
}

impl Position {
    pub fn new(quantity: f64, asset_class: Option<AssetClass>) -> Self {
        Self {
            quantity,
            asset_class,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// One NAV observation, appended once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub timestamp: DateTime<Utc>,
    pub nav: f64,
}

/// Paper portfolio state.
///
/// Owned by the execution simulator and mutated only through applied orders.
/// `version` is a sequence number bumped by the state store on every save so
/// a retried or concurrent run can detect that it is working from stale state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    #[serde(default)]
    pub version: u64,
    pub cash: f64,
    #[serde(default)]
    pub positions: BTreeMap<Symbol, Position>,
    #[serde(default)]
    pub nav_history: Vec<NavPoint>,
}

impl PortfolioState {
    /// A fresh, all-cash portfolio.
    pub fn new(cash: f64) -> Self {
        Self {
            version: 0,
            cash,
            positions: BTreeMap::new(),
            nav_history: Vec::new(),
        }
    }

    /// Held quantity of `symbol` (0 when not held).
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.quantity(symbol) > 0.0
    }

    /// NAV = cash + Σ quantity × last price.
    ///
    /// Holdings without a usable price contribute nothing; callers that need
    /// to report them use [`PortfolioState::unpriced_symbols`].
    pub fn nav(&self, prices: &PriceBook) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .filter_map(|(sym, pos)| prices.get(sym).map(|p| pos.market_value(p)))
            .sum();
        self.cash + position_value
    }

    /// Held symbols that have no usable price.
    pub fn unpriced_symbols(&self, prices: &PriceBook) -> Vec<&str> {
        self.positions
            .iter()
            .filter(|(sym, pos)| pos.quantity > 0.0 && prices.get(sym).is_none())
            .map(|(sym, _)| sym.as_str())
            .collect()
    }

    /// Latest recorded NAV, if any.
    pub fn last_nav(&self) -> Option<&NavPoint> {
        self.nav_history.last()
    }

    /// Structural invariants that hold regardless of strategy: finite,
    /// non-negative cash and quantities; finite NAV history.
    pub fn check_invariants(&self) -> Result<(), StateError> {
        if !self.cash.is_finite() {
            return Err(StateError::NonFiniteCash);
        }
        if self.cash < 0.0 {
            return Err(StateError::NegativeCash(self.cash));
        }
        for (symbol, pos) in &self.positions {
            if !pos.quantity.is_finite() {
                return Err(StateError::NonFiniteQuantity {
                    symbol: symbol.clone(),
                });
            }
            if pos.quantity < 0.0 {
                return Err(StateError::NegativeQuantity {
                    symbol: symbol.clone(),
                    quantity: pos.quantity,
                });
            }
        }
        if let Some(index) = self.nav_history.iter().position(|p| !p.nav.is_finite()) {
            return Err(StateError::NonFiniteNav { index });
        }
        Ok(())
    }

    /// Full load-time validation: structural invariants plus integer
    /// quantities for every holding in an integer-lot class.
    pub fn validate(&self, config: &StrategyConfig) -> Result<(), StateError> {
        self.check_invariants()?;
        for (symbol, pos) in &self.positions {
            if config.is_known_class(symbol) {
                return Err(StateError::SymbolNamesClass {
                    symbol: symbol.clone(),
                });
            }
            let class = config
                .instrument_class(symbol)
                .or(pos.asset_class.as_deref());
            let Some(mode) = class.and_then(|c| config.lot_mode(c)) else {
                continue;
            };
            if !mode.is_valid(pos.quantity) {
                return Err(StateError::FractionalIntegerLot {
                    symbol: symbol.clone(),
                    quantity: pos.quantity,
                });
            }
        }
        Ok(())
    }
}

/// Portfolio state failed an invariant check. Fatal: the run stops before
/// anything is mutated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error("cash is not finite")]
    NonFiniteCash,

    #[error("cash is negative: {0}")]
    NegativeCash(f64),

    #[error("quantity for {symbol} is not finite")]
    NonFiniteQuantity { symbol: String },

    #[error("quantity for {symbol} is negative: {quantity}")]
    NegativeQuantity { symbol: String, quantity: f64 },

    #[error("position {symbol} has the same name as an asset class")]
    SymbolNamesClass { symbol: String },

    #[error("integer-lot symbol {symbol} holds fractional quantity {quantity}")]
    FractionalIntegerLot { symbol: String, quantity: f64 },

    #[error("NAV history entry {index} is not finite")]
    NonFiniteNav { index: usize },
}
