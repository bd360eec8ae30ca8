//! Mark-to-market valuation of the current portfolio, per symbol and per class.

use crate::config::StrategyConfig;
use crate::domain::{AssetClass, PlanWarning, PortfolioState, PriceBook, Symbol, WarningKind};
use std::collections::BTreeMap;

/// One held symbol as seen by the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub quantity: f64,
    pub price: Option<f64>,
    /// Resolved configured class; `None` when the holding cannot be attributed.
    pub asset_class: Option<AssetClass>,
}

impl Holding {
    /// Market value (0 when unpriced).
    pub fn value(&self) -> f64 {
        self.price.map_or(0.0, |p| p * self.quantity)
    }
}

/// Snapshot of portfolio value at planning time.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub nav: f64,
    pub cash: f64,
    /// Priced value per configured class (every configured class present).
    pub class_values: BTreeMap<AssetClass, f64>,
    pub holdings: BTreeMap<Symbol, Holding>,
}

impl Valuation {
    /// Value `state` at `prices`.
    ///
    /// A held symbol's class is resolved from `config.instruments`, then
    /// `signal_classes` (this run's signals), then the class stored on the
    /// position; the first candidate naming a configured class wins.
    pub fn compute(
        config: &StrategyConfig,
        state: &PortfolioState,
        prices: &PriceBook,
        signal_classes: &BTreeMap<&str, &str>,
        warnings: &mut Vec<PlanWarning>,
    ) -> Self {
        let mut class_values: BTreeMap<AssetClass, f64> =
            config.classes().map(|c| (c.to_string(), 0.0)).collect();
        let mut holdings = BTreeMap::new();

        for (symbol, position) in &state.positions {
            if position.quantity <= 0.0 {
                continue;
            }
            let price = prices.get(symbol);
            let asset_class = [
                config.instrument_class(symbol),
                signal_classes.get(symbol.as_str()).copied(),
                position.asset_class.as_deref(),
            ]
            .into_iter()
            .flatten()
            .find(|c| config.is_known_class(c))
            .map(str::to_string);

            if price.is_none() {
                warnings.push(
                    PlanWarning::new(
                        WarningKind::UnpricedHolding,
                        format!("{symbol} has no price; excluded from NAV"),
                    )
                    .for_symbol(symbol.as_str()),
                );
            }
            match &asset_class {
                Some(class) => {
                    if let (Some(p), Some(v)) = (price, class_values.get_mut(class)) {
                        *v += p * position.quantity;
                    }
                }
                None => warnings.push(
                    PlanWarning::new(
                        WarningKind::UnclassifiedHolding,
                        format!("{symbol} does not belong to any configured asset class"),
                    )
                    .for_symbol(symbol.as_str()),
                ),
            }

            holdings.insert(
                symbol.clone(),
                Holding {
                    quantity: position.quantity,
                    price,
                    asset_class,
                },
            );
        }

        let nav = state.cash + holdings.values().map(Holding::value).sum::<f64>();
        Self {
            nav,
            cash: state.cash,
            class_values,
            holdings,
        }
    }

    /// True when there is nothing to weigh against (NAV zero, negative or undefined).
    pub fn is_empty(&self) -> bool {
        !(self.nav.is_finite() && self.nav > 0.0)
    }

    /// Current weight of `class` in NAV (0 for an empty portfolio).
    pub fn weight(&self, class: &str) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.class_values.get(class).copied().unwrap_or(0.0) / self.nav
    }

    /// Market value of one symbol (0 when not held or unpriced).
    pub fn symbol_value(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).map_or(0.0, Holding::value)
    }

    /// Holdings attributed to `class`, in symbol order.
    pub fn holdings_in<'a>(
        &'a self,
        class: &'a str,
    ) -> impl Iterator<Item = (&'a Symbol, &'a Holding)> {
        self.holdings
            .iter()
            .filter(move |(_, h)| h.asset_class.as_deref() == Some(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;

    fn config() -> StrategyConfig {
        StrategyConfig::from_toml(
            r#"
default_band = 0.05
[targets]
equities = 0.6
crypto = 0.4
[lot_mode]
equities = "integer"
crypto = "fractional"
[instruments]
BTC = "crypto"
"#,
        )
        .unwrap()
    }

    #[test]
    fn classes_resolve_in_priority_order() {
        let mut state = PortfolioState::new(1_000.0);
        // instruments beats the stored class
        state
            .positions
            .insert("BTC".into(), Position::new(1.0, Some("equities".into())));
        // signal beats the stored class
        state
            .positions
            .insert("SPY".into(), Position::new(10.0, Some("crypto".into())));
        // unknown stored class with no other source
        state
            .positions
            .insert("GLD".into(), Position::new(2.0, Some("metals".into())));
        let prices: PriceBook = [
            ("BTC".to_string(), 100.0),
            ("SPY".to_string(), 10.0),
            ("GLD".to_string(), 50.0),
        ]
        .into_iter()
        .collect();
        let signal_classes = BTreeMap::from([("SPY", "equities")]);
        let mut warnings = Vec::new();

        let v = Valuation::compute(&config(), &state, &prices, &signal_classes, &mut warnings);
        assert_eq!(v.holdings["BTC"].asset_class.as_deref(), Some("crypto"));
        assert_eq!(v.holdings["SPY"].asset_class.as_deref(), Some("equities"));
        assert_eq!(v.holdings["GLD"].asset_class, None);
        // unclassified holdings still count toward NAV
        assert_eq!(v.nav, 1_000.0 + 100.0 + 100.0 + 100.0);
        assert_eq!(v.class_values["crypto"], 100.0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnclassifiedHolding);
    }

    #[test]
    fn unpriced_holding_is_excluded_and_warned() {
        let mut state = PortfolioState::new(500.0);
        state
            .positions
            .insert("BTC".into(), Position::new(1.0, None));
        let mut warnings = Vec::new();
        let v = Valuation::compute(
            &config(),
            &state,
            &PriceBook::new(),
            &BTreeMap::new(),
            &mut warnings,
        );
        assert_eq!(v.nav, 500.0);
        assert_eq!(v.weight("crypto"), 0.0);
        assert_eq!(warnings[0].kind, WarningKind::UnpricedHolding);
    }

    #[test]
    fn empty_portfolio_has_zero_weights() {
        let state = PortfolioState::new(0.0);
        let mut warnings = Vec::new();
        let v = Valuation::compute(
            &config(),
            &state,
            &PriceBook::new(),
            &BTreeMap::new(),
            &mut warnings,
        );
        assert!(v.is_empty());
        assert_eq!(v.weight("equities"), 0.0);
    }
}
