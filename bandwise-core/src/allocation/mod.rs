//! Allocation engine: turns signals and current holdings into a
//! band-based rebalancing plan.
//!
//! One pass per run:
//! 1. value the portfolio and compute each configured class's drift,
//! 2. walk out-of-band classes by descending |drift| (ties by name),
//! 3. spread each correction over ranked signals, respecting symbol and class
//!    caps, projected cash and lot discreteness,
//! 4. emit HOLD entries for in-band holdings and seal the plan.
//!
//! Recoverable conditions become [`PlanWarning`]s on the plan; planning
//! itself never fails.

pub mod ranking;
pub mod sizing;
pub mod valuation;

pub use valuation::{Holding, Valuation};

use crate::config::{RebalanceTarget, StrategyConfig};
use crate::domain::{
    AllocationPlan, AssetClass, ClassDrift, LotMode, PlanAction, PlanEntry, PlanWarning,
    PortfolioState, PriceBook, Signal, SignalError, Symbol, WarningKind,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sizing::{resolve_quantity, CashBudget, NOTIONAL_EPSILON};
use std::collections::{BTreeMap, BTreeSet};

/// Everything one planning pass reads.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub state: &'a PortfolioState,
    pub prices: &'a PriceBook,
    pub signals: &'a [Signal],
    /// Warnings raised while gathering inputs (stale or missing batches,
    /// dropped records); carried into the plan ahead of planning warnings.
    pub input_warnings: &'a [PlanWarning],
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct AllocationEngine<'c> {
    config: &'c StrategyConfig,
}

impl<'c> AllocationEngine<'c> {
    pub fn new(config: &'c StrategyConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, request: &PlanRequest<'_>) -> AllocationPlan {
        let mut warnings: Vec<PlanWarning> = request.input_warnings.to_vec();
        let first_new = warnings.len();

        let by_class = self.group_signals(request.signals, &mut warnings);
        let signal_classes: BTreeMap<&str, &str> = by_class
            .iter()
            .flat_map(|(class, signals)| {
                signals
                    .iter()
                    .map(move |s| (s.symbol.as_str(), class.as_str()))
            })
            .collect();

        let valuation = Valuation::compute(
            self.config,
            request.state,
            request.prices,
            &signal_classes,
            &mut warnings,
        );
        let classes = self.class_drifts(&valuation);

        let mut pass = PlanPass {
            config: self.config,
            prices: request.prices,
            valuation: &valuation,
            budget: CashBudget::new(valuation.cash, self.config.cost_model()),
            class_values: valuation.class_values.clone(),
            symbol_values: valuation
                .holdings
                .iter()
                .map(|(s, h)| (s.clone(), h.value()))
                .collect(),
            entries: Vec::new(),
            warnings,
        };

        if valuation.is_empty() {
            pass.warn(PlanWarning::new(
                WarningKind::EmptyPortfolio,
                format!("NAV is {}; nothing to rebalance", valuation.nav),
            ));
        } else {
            let mut out_of_band: Vec<&ClassDrift> =
                classes.iter().filter(|c| c.out_of_band).collect();
            out_of_band.sort_by(|a, b| {
                b.drift
                    .abs()
                    .total_cmp(&a.drift.abs())
                    .then_with(|| a.asset_class.cmp(&b.asset_class))
            });
            let no_signals: Vec<&Signal> = Vec::new();
            for class in out_of_band {
                let signals = by_class.get(&class.asset_class).unwrap_or(&no_signals);
                pass.rebalance_class(class, signals);
            }
            for class in classes.iter().filter(|c| !c.out_of_band) {
                pass.hold_class(class);
            }
        }

        let PlanPass {
            entries, warnings, ..
        } = pass;
        for w in &warnings[first_new..] {
            warn!("{}", w.message);
        }

        let plan = AllocationPlan {
            plan_id: String::new(),
            generated_at: request.generated_at,
            base_version: request.state.version,
            nav: valuation.nav,
            cash: valuation.cash,
            classes,
            entries,
            warnings,
        }
        .sealed();
        info!(
            "plan {}: NAV {:.2}, {} trades, {} warnings",
            plan.plan_id.get(..12).unwrap_or(&plan.plan_id),
            plan.nav,
            plan.trade_count(),
            plan.warnings.len()
        );
        plan
    }

    /// Current vs. target weight for every configured class, in name order.
    pub fn class_drifts(&self, valuation: &Valuation) -> Vec<ClassDrift> {
        self.config
            .targets
            .iter()
            .map(|(class, &target)| {
                let current = valuation.weight(class);
                let drift = current - target;
                let band = self.config.band(class).unwrap_or(0.0);
                ClassDrift {
                    asset_class: class.clone(),
                    target_weight: target,
                    current_weight: current,
                    drift,
                    band,
                    out_of_band: drift.abs() > band,
                }
            })
            .collect()
    }

    /// Valid signals grouped by configured class.
    ///
    /// `instruments` overrides the class a signal claims. Invalid records,
    /// unknown classes, symbols named like a class and repeated symbols are
    /// dropped with a warning; the first record for a symbol wins.
    fn group_signals<'s>(
        &self,
        signals: &'s [Signal],
        warnings: &mut Vec<PlanWarning>,
    ) -> BTreeMap<AssetClass, Vec<&'s Signal>> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut grouped: BTreeMap<AssetClass, Vec<&Signal>> = BTreeMap::new();
        for signal in signals {
            let class = self
                .config
                .instrument_class(&signal.symbol)
                .unwrap_or(signal.asset_class.as_str());
            let checked = signal.validate().and_then(|()| {
                if !self.config.is_known_class(class) {
                    Err(SignalError::UnknownAssetClass {
                        symbol: signal.symbol.clone(),
                        asset_class: class.to_string(),
                    })
                } else if self.config.is_known_class(&signal.symbol) {
                    Err(SignalError::SymbolNamesClass {
                        symbol: signal.symbol.clone(),
                    })
                } else if !seen.insert(signal.symbol.as_str()) {
                    Err(SignalError::Duplicate {
                        symbol: signal.symbol.clone(),
                        asset_class: class.to_string(),
                    })
                } else {
                    Ok(())
                }
            });
            match checked {
                Ok(()) => grouped.entry(class.to_string()).or_default().push(signal),
                Err(e) => warnings.push(
                    PlanWarning::new(WarningKind::DroppedSignal, format!("signal dropped: {e}"))
                        .for_class(class)
                        .for_symbol(signal.symbol.as_str()),
                ),
            }
        }
        grouped
    }
}

/// Mutable projection of the portfolio while entries are being emitted.
struct PlanPass<'a> {
    config: &'a StrategyConfig,
    prices: &'a PriceBook,
    valuation: &'a Valuation,
    budget: CashBudget,
    class_values: BTreeMap<AssetClass, f64>,
    symbol_values: BTreeMap<Symbol, f64>,
    entries: Vec<PlanEntry>,
    warnings: Vec<PlanWarning>,
}

impl PlanPass<'_> {
    fn warn(&mut self, warning: PlanWarning) {
        self.warnings.push(warning);
    }

    fn nav(&self) -> f64 {
        self.valuation.nav
    }

    fn lot_mode(&self, class: &str) -> LotMode {
        self.config.lot_mode(class).unwrap_or(LotMode::Integer)
    }

    fn entry(&self, class: &ClassDrift, symbol: &str, action: PlanAction) -> PlanEntry {
        PlanEntry {
            asset_class: class.asset_class.clone(),
            symbol: symbol.to_string(),
            target_weight: class.target_weight,
            current_weight: class.current_weight,
            drift: class.drift,
            action,
            suggested_notional: 0.0,
            price: self.prices.get(symbol),
            quantity: 0.0,
            lot_mode: self.lot_mode(&class.asset_class),
            reason: None,
        }
    }

    /// Weight the class is moved to.
    fn goal_weight(&mut self, class: &ClassDrift) -> f64 {
        let mut goal = match self.config.rebalance_to {
            RebalanceTarget::Target => class.target_weight,
            RebalanceTarget::BandEdge if class.drift > 0.0 => class.target_weight + class.band,
            RebalanceTarget::BandEdge => class.target_weight - class.band,
        };
        if let Some(cap) = self.config.class_cap(&class.asset_class) {
            if goal > cap {
                self.warn(
                    PlanWarning::new(
                        WarningKind::RiskCapClipped,
                        format!(
                            "{} goal weight {:.4} clipped to class cap {:.4}",
                            class.asset_class, goal, cap
                        ),
                    )
                    .for_class(class.asset_class.as_str()),
                );
                goal = cap;
            }
        }
        goal
    }

    fn rebalance_class(&mut self, class: &ClassDrift, signals: &[&Signal]) {
        let goal = self.goal_weight(class);
        let need = (class.current_weight - goal) * self.nav();
        debug!(
            "{}: weight {:.4} target {:.4} goal {:.4} ({:+.2})",
            class.asset_class, class.current_weight, class.target_weight, goal, -need
        );

        let attempted = if need < -NOTIONAL_EPSILON {
            self.buy_into(class, signals, -need)
        } else if need > NOTIONAL_EPSILON {
            self.sell_out_of(class, signals, need)
        } else {
            true
        };
        if !attempted {
            self.warn(
                PlanWarning::new(
                    WarningKind::NoEligibleSignals,
                    format!(
                        "{} is out of band (drift {:+.4}) but has no eligible signals",
                        class.asset_class, class.drift
                    ),
                )
                .for_class(class.asset_class.as_str()),
            );
            return;
        }

        if !self.projected_in_band(class) {
            let projected = self.projected_weight(&class.asset_class);
            self.warn(
                PlanWarning::new(
                    WarningKind::PartialRebalance,
                    format!(
                        "{} projected weight {:.4} still outside band {:.4} ± {:.4}",
                        class.asset_class, projected, class.target_weight, class.band
                    ),
                )
                .for_class(class.asset_class.as_str()),
            );
        }
    }

    fn projected_weight(&self, class: &str) -> f64 {
        self.class_values.get(class).copied().unwrap_or(0.0) / self.nav()
    }

    fn projected_in_band(&self, class: &ClassDrift) -> bool {
        let projected = self.projected_weight(&class.asset_class);
        (projected - class.target_weight).abs() <= class.band + 1e-12
    }

    /// A leftover too small to trade once earlier symbols already brought
    /// the class back within band. Skipped without a HOLD entry.
    fn is_residual(
        &self,
        class: &ClassDrift,
        quantity: f64,
        price: f64,
        min_notional: f64,
    ) -> bool {
        let untradable = quantity <= 0.0 || quantity * price < min_notional;
        untradable && self.projected_in_band(class)
    }

    /// Spread `amount` of buying over bullish signals. Returns false when no
    /// signal was eligible.
    fn buy_into(&mut self, class: &ClassDrift, signals: &[&Signal], amount: f64) -> bool {
        let candidates = ranking::buy_candidates(signals);
        if candidates.is_empty() {
            return false;
        }
        let name = class.asset_class.as_str();
        let lot_mode = self.lot_mode(name);
        let increment = self.config.execution.fractional_increment;
        let min_notional = self.config.execution.min_trade_notional;
        let mut remaining = amount;

        for signal in candidates {
            if remaining <= NOTIONAL_EPSILON {
                break;
            }
            let symbol = signal.symbol.as_str();
            let Some(price) = self.prices.get(symbol) else {
                self.reject_unpriced(class, symbol, remaining);
                continue;
            };

            let mut notional = remaining;
            if let Some(cap) = self.config.symbol_cap(symbol) {
                let current = self.symbol_values.get(symbol).copied().unwrap_or(0.0);
                let headroom = (cap * self.nav() - current).max(0.0);
                if headroom < notional {
                    self.warn(
                        PlanWarning::new(
                            WarningKind::RiskCapClipped,
                            format!(
                                "{symbol} limited to {:.2} by position cap {cap:.4}",
                                headroom
                            ),
                        )
                        .for_class(name)
                        .for_symbol(symbol),
                    );
                    notional = headroom;
                }
            }
            if notional <= NOTIONAL_EPSILON {
                continue;
            }

            let max_cash = self.budget.max_buy_notional();
            if max_cash <= NOTIONAL_EPSILON {
                self.warn(
                    PlanWarning::new(
                        WarningKind::CashLimited,
                        format!("no projected cash left for {name} purchases"),
                    )
                    .for_class(name),
                );
                break;
            }
            if max_cash < notional {
                self.warn(
                    PlanWarning::new(
                        WarningKind::CashLimited,
                        format!(
                            "{symbol} purchase limited to {max_cash:.2} of projected cash (wanted {notional:.2})"
                        ),
                    )
                    .for_class(name)
                    .for_symbol(symbol),
                );
                notional = max_cash;
            }

            let mut quantity = resolve_quantity(notional, price, lot_mode, increment);
            if quantity > 0.0 && !self.budget.affords(price, quantity) {
                quantity = step_down(quantity, lot_mode, increment);
            }
            if self.is_residual(class, quantity, price, min_notional) {
                continue;
            }
            let mut entry = self.entry(class, symbol, PlanAction::Buy);
            entry.suggested_notional = notional;
            if !self.accept_size(&mut entry, quantity, price, min_notional) {
                self.entries.push(entry);
                continue;
            }

            let resolved = quantity * price;
            self.budget.debit_buy(price, quantity);
            *self.class_values.entry(class.asset_class.clone()).or_default() += resolved;
            *self.symbol_values.entry(symbol.to_string()).or_default() += resolved;
            debug!("BUY {quantity} {symbol} (~{resolved:.2})");
            self.entries.push(entry);
            remaining -= resolved;
        }
        true
    }

    /// Spread `amount` of selling over held symbols, most bearish first.
    /// Returns false when no signal was eligible.
    fn sell_out_of(&mut self, class: &ClassDrift, signals: &[&Signal], amount: f64) -> bool {
        let valuation = self.valuation;
        let candidates = ranking::sell_candidates(signals, |s| {
            valuation
                .holdings
                .get(s)
                .is_some_and(|h| h.asset_class.as_deref() == Some(class.asset_class.as_str()))
        });
        if candidates.is_empty() {
            return false;
        }
        let name = class.asset_class.as_str();
        let lot_mode = self.lot_mode(name);
        let increment = self.config.execution.fractional_increment;
        let min_notional = self.config.execution.min_trade_notional;
        let mut remaining = amount;

        for signal in candidates {
            if remaining <= NOTIONAL_EPSILON {
                break;
            }
            let symbol = signal.symbol.as_str();
            let Some(price) = self.prices.get(symbol) else {
                self.reject_unpriced(class, symbol, remaining);
                continue;
            };
            let held = valuation.holdings.get(symbol).map_or(0.0, |h| h.quantity);
            let held_value = held * price;

            let notional = remaining.min(held_value);
            let quantity = if notional >= held_value - NOTIONAL_EPSILON {
                held
            } else {
                resolve_quantity(notional, price, lot_mode, increment)
            };
            if self.is_residual(class, quantity, price, min_notional) {
                continue;
            }
            let mut entry = self.entry(class, symbol, PlanAction::Sell);
            entry.suggested_notional = notional;
            if !self.accept_size(&mut entry, quantity, price, min_notional) {
                self.entries.push(entry);
                continue;
            }

            let resolved = quantity * price;
            self.budget.credit_sell(price, quantity);
            *self.class_values.entry(class.asset_class.clone()).or_default() -= resolved;
            *self.symbol_values.entry(symbol.to_string()).or_default() -= resolved;
            debug!("SELL {quantity} {symbol} (~{resolved:.2})");
            self.entries.push(entry);
            remaining -= resolved;
        }
        true
    }

    /// Set the entry's quantity, or turn it into a HOLD when the trade is
    /// below one lot or the minimum trade size.
    fn accept_size(
        &mut self,
        entry: &mut PlanEntry,
        quantity: f64,
        price: f64,
        min_notional: f64,
    ) -> bool {
        let resolved = quantity * price;
        if quantity <= 0.0 || resolved < min_notional {
            let reason = if quantity <= 0.0 {
                format!(
                    "{:.2} is less than one lot at {:.4}",
                    entry.suggested_notional, price
                )
            } else {
                format!("{resolved:.2} is below minimum trade size {min_notional:.2}")
            };
            self.warn(
                PlanWarning::new(WarningKind::BelowMinimum, format!("{}: {reason}", entry.symbol))
                    .for_class(entry.asset_class.as_str())
                    .for_symbol(entry.symbol.as_str()),
            );
            entry.action = PlanAction::Hold;
            entry.quantity = 0.0;
            entry.reason = Some(reason);
            return false;
        }
        entry.quantity = quantity;
        true
    }

    fn reject_unpriced(&mut self, class: &ClassDrift, symbol: &str, notional: f64) {
        let mut entry = self.entry(class, symbol, PlanAction::Rejected);
        entry.suggested_notional = notional;
        entry.reason = Some("no price".to_string());
        self.entries.push(entry);
        self.warn(
            PlanWarning::new(WarningKind::MissingPrice, format!("{symbol} has no price"))
                .for_class(class.asset_class.as_str())
                .for_symbol(symbol),
        );
    }

    fn hold_class(&mut self, class: &ClassDrift) {
        let valuation = self.valuation;
        let held: Vec<&Symbol> = valuation
            .holdings_in(&class.asset_class)
            .map(|(s, _)| s)
            .collect();
        for symbol in held {
            let mut entry = self.entry(class, symbol, PlanAction::Hold);
            entry.reason = Some("within band".to_string());
            self.entries.push(entry);
        }
    }
}

/// One lot less than `quantity` (never negative).
fn step_down(quantity: f64, lot_mode: LotMode, increment: f64) -> f64 {
    let step = match lot_mode {
        LotMode::Integer => 1.0,
        LotMode::Fractional => increment,
    };
    lot_mode.resolve(quantity - step, increment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;
    use chrono::TimeZone;

    const CONFIG: &str = r#"
[targets]
equities = 0.6
crypto = 0.4

[bands]
equities = 0.05
crypto = 0.05

[lot_mode]
equities = "integer"
crypto = "fractional"
"#;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 5, 19, 55, 0).unwrap()
    }

    fn sig(symbol: &str, class: &str, score: f64) -> Signal {
        Signal {
            symbol: symbol.into(),
            asset_class: class.into(),
            score,
            confidence: 1.0,
            rationale: String::new(),
            timestamp: ts(),
        }
    }

    fn plan_for(
        config: &StrategyConfig,
        state: &PortfolioState,
        prices: &PriceBook,
        signals: &[Signal],
    ) -> AllocationPlan {
        AllocationEngine::new(config).plan(&PlanRequest {
            state,
            prices,
            signals,
            input_warnings: &[],
            generated_at: ts(),
        })
    }

    #[test]
    fn all_cash_portfolio_buys_strongest_signal() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let state = PortfolioState::new(10_000.0);
        let prices: PriceBook = [("SPY".to_string(), 100.0), ("BTC".to_string(), 1_000.0)]
            .into_iter()
            .collect();
        let signals = [sig("SPY", "equities", 0.8), sig("BTC", "crypto", 0.5)];
        let plan = plan_for(&config, &state, &prices, &signals);

        // equities (|drift| 0.6) before crypto (0.4)
        assert_eq!(plan.entries[0].symbol, "SPY");
        assert_eq!(plan.entries[0].quantity, 60.0);
        assert_eq!(plan.entries[1].symbol, "BTC");
        assert!((plan.entries[1].quantity - 4.0).abs() < 1e-9);
        assert_eq!(plan.base_version, 0);
        assert!(!plan.plan_id.is_empty());
    }

    #[test]
    fn out_of_band_without_signals_warns() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let state = PortfolioState::new(10_000.0);
        let plan = plan_for(&config, &state, &PriceBook::new(), &[]);
        assert!(plan.is_empty());
        assert_eq!(plan.warnings_of(WarningKind::NoEligibleSignals).count(), 2);
    }

    #[test]
    fn empty_portfolio_plans_nothing() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let state = PortfolioState::new(0.0);
        let plan = plan_for(&config, &state, &PriceBook::new(), &[sig("SPY", "equities", 1.0)]);
        assert!(plan.entries.is_empty());
        assert_eq!(plan.warnings_of(WarningKind::EmptyPortfolio).count(), 1);
        assert!(plan.classes.iter().all(|c| c.current_weight == 0.0));
    }

    #[test]
    fn missing_price_rejects_and_moves_on() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let mut state = PortfolioState::new(6_000.0);
        state
            .positions
            .insert("BTC".into(), Position::new(4.0, Some("crypto".into())));
        let prices: PriceBook = [("QQQ".to_string(), 100.0), ("BTC".to_string(), 1_000.0)]
            .into_iter()
            .collect();
        let signals = [sig("SPY", "equities", 0.9), sig("QQQ", "equities", 0.5)];
        let plan = plan_for(&config, &state, &prices, &signals);

        let spy = &plan.entries[0];
        assert_eq!(spy.action, PlanAction::Rejected);
        assert_eq!(spy.reason.as_deref(), Some("no price"));
        let qqq = &plan.entries[1];
        assert_eq!(qqq.action, PlanAction::Buy);
        assert_eq!(qqq.quantity, 60.0);
        assert_eq!(plan.warnings_of(WarningKind::MissingPrice).count(), 1);
        assert!(plan.orders().iter().all(|o| o.symbol != "SPY"));
    }

    #[test]
    fn symbol_cap_passes_excess_to_next_symbol() {
        let config =
            StrategyConfig::from_toml(&format!("position_max = 0.35\n{CONFIG}")).unwrap();
        let mut state = PortfolioState::new(6_000.0);
        state
            .positions
            .insert("BTC".into(), Position::new(4.0, Some("crypto".into())));
        let prices: PriceBook = [
            ("SPY".to_string(), 100.0),
            ("QQQ".to_string(), 100.0),
            ("BTC".to_string(), 1_000.0),
        ]
        .into_iter()
        .collect();
        let signals = [sig("SPY", "equities", 0.9), sig("QQQ", "equities", 0.5)];
        let plan = plan_for(&config, &state, &prices, &signals);

        let buys: Vec<(&str, f64)> = plan
            .entries
            .iter()
            .filter(|e| e.action == PlanAction::Buy)
            .map(|e| (e.symbol.as_str(), e.quantity))
            .collect();
        assert_eq!(buys, [("SPY", 35.0), ("QQQ", 25.0)]);
        assert!(plan.warnings_of(WarningKind::RiskCapClipped).count() >= 1);
    }

    #[test]
    fn lot_gap_moves_to_next_symbol_and_skips_untradable_leftover() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let state = PortfolioState::new(10_000.0);
        let prices: PriceBook = [
            ("AAA".to_string(), 3_500.0),
            ("BBB".to_string(), 30.0),
            ("CCC".to_string(), 40.0),
        ]
        .into_iter()
        .collect();
        let signals = [
            sig("AAA", "equities", 0.9),
            sig("BBB", "equities", 0.5),
            sig("CCC", "equities", 0.1),
        ];
        let plan = plan_for(&config, &state, &prices, &signals);

        let equities: Vec<(&str, PlanAction, f64)> = plan
            .entries_for("equities")
            .map(|e| (e.symbol.as_str(), e.action, e.quantity))
            .collect();
        // 2_500 after AAA, 83 BBB lots leave 10: less than one CCC lot
        assert_eq!(
            equities,
            [("AAA", PlanAction::Buy, 1.0), ("BBB", PlanAction::Buy, 83.0)]
        );
        assert_eq!(plan.warnings_of(WarningKind::BelowMinimum).count(), 0);
        assert!(plan
            .warnings_of(WarningKind::PartialRebalance)
            .all(|w| w.asset_class.as_deref() != Some("equities")));
    }

    #[test]
    fn band_edge_moves_only_to_the_band() {
        let config =
            StrategyConfig::from_toml(&format!("rebalance_to = \"band_edge\"\n{CONFIG}")).unwrap();
        let mut state = PortfolioState::new(6_000.0);
        state
            .positions
            .insert("BTC".into(), Position::new(4.0, Some("crypto".into())));
        let prices: PriceBook = [("SPY".to_string(), 100.0), ("BTC".to_string(), 1_000.0)]
            .into_iter()
            .collect();
        let plan = plan_for(&config, &state, &prices, &[sig("SPY", "equities", 0.9)]);
        // (0.6 - 0.05) × 10_000 = 5_500
        assert_eq!(plan.entries[0].quantity, 55.0);
    }

    #[test]
    fn sell_limited_to_holding() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let mut state = PortfolioState::new(0.0);
        state
            .positions
            .insert("ETH".into(), Position::new(1.0, Some("crypto".into())));
        state
            .positions
            .insert("SPY".into(), Position::new(90.0, Some("equities".into())));
        let prices: PriceBook = [("SPY".to_string(), 100.0), ("ETH".to_string(), 1_000.0)]
            .into_iter()
            .collect();
        // equities 0.9 → sell down to 0.6 = 3_000
        let plan = plan_for(&config, &state, &prices, &[sig("SPY", "equities", -0.5)]);
        let sell = plan
            .entries
            .iter()
            .find(|e| e.action == PlanAction::Sell)
            .unwrap();
        assert_eq!(sell.symbol, "SPY");
        assert_eq!(sell.quantity, 30.0);
    }

    #[test]
    fn symbol_named_like_a_class_is_dropped() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let state = PortfolioState::new(1_000.0);
        let prices: PriceBook = [("crypto".to_string(), 10.0)].into_iter().collect();
        let plan = plan_for(&config, &state, &prices, &[sig("crypto", "equities", 1.0)]);
        let dropped: Vec<&PlanWarning> = plan.warnings_of(WarningKind::DroppedSignal).collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].symbol.as_deref(), Some("crypto"));
        assert!(plan.entries.iter().all(|e| e.symbol != "crypto"));
    }

    #[test]
    fn unknown_class_signal_is_dropped() {
        let config = StrategyConfig::from_toml(CONFIG).unwrap();
        let state = PortfolioState::new(1_000.0);
        let plan = plan_for(&config, &state, &PriceBook::new(), &[sig("GLD", "metals", 1.0)]);
        assert_eq!(plan.warnings_of(WarningKind::DroppedSignal).count(), 1);
    }
}
