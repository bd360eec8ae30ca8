use super::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last known price per symbol, supplied by the pricing collaborator.
///
/// Non-positive and non-finite prices are treated as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceBook {
    prices: BTreeMap<Symbol, f64>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<Symbol>, price: f64) {
        self.prices.insert(symbol.into(), price);
    }

    /// Usable price for `symbol`, if any.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices
            .get(symbol)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &f64)> {
        self.prices.iter()
    }
}

impl FromIterator<(Symbol, f64)> for PriceBook {
    fn from_iter<I: IntoIterator<Item = (Symbol, f64)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}
