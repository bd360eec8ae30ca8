//! Post-plan validation: projects the portfolio after the plan's trades and
//! checks it against bands and caps before anything is executed.
//!
//! A class left outside its band is only an error when the plan gives no
//! recorded reason for it (missing signals, prices, cash or caps); otherwise
//! it is reported as a warning.

use crate::config::StrategyConfig;
use crate::domain::{
    AllocationPlan, AssetClass, OrderSide, PlanWarning, PortfolioState, PriceBook, Symbol,
    WarningKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Warning kinds that explain why a class could not be brought into band.
const EXPLAINING_KINDS: [WarningKind; 8] = [
    WarningKind::NoEligibleSignals,
    WarningKind::PartialRebalance,
    WarningKind::MissingPrice,
    WarningKind::MissingBatch,
    WarningKind::StaleBatch,
    WarningKind::CashLimited,
    WarningKind::BelowMinimum,
    WarningKind::RiskCapClipped,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Ok,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCheck {
    pub asset_class: AssetClass,
    pub target: f64,
    pub projected: f64,
    pub band: f64,
    pub within_band: bool,
}

/// What a violated cap applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapScope {
    Symbol,
    Class,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapViolation {
    pub scope: CapScope,
    /// Symbol or class name.
    pub name: String,
    pub projected: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub plan_id: String,
    pub status: ValidationStatus,
    pub projected_nav: f64,
    pub classes: Vec<ClassCheck>,
    pub cap_violations: Vec<CapViolation>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }
}

/// Portfolio as it would look if every trade in the plan filled at its
/// planning price, costs included.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub cash: f64,
    pub quantities: BTreeMap<Symbol, f64>,
    pub nav: f64,
    pub class_values: BTreeMap<AssetClass, f64>,
    pub symbol_values: BTreeMap<Symbol, f64>,
}

impl Projection {
    pub fn compute(
        plan: &AllocationPlan,
        state: &PortfolioState,
        prices: &PriceBook,
        config: &StrategyConfig,
    ) -> Self {
        let cost = config.cost_model();
        let mut cash = state.cash;
        let mut quantities: BTreeMap<Symbol, f64> = state
            .positions
            .iter()
            .map(|(s, p)| (s.clone(), p.quantity))
            .collect();

        for entry in plan.entries.iter().filter(|e| e.is_trade()) {
            let (Some(side), Some(price)) = (entry.action.side(), entry.price) else {
                continue;
            };
            let held = quantities.entry(entry.symbol.clone()).or_insert(0.0);
            let quantity = match side {
                OrderSide::Buy => entry.quantity,
                OrderSide::Sell => entry.quantity.min(*held),
            };
            cash += cost.cash_delta(price, side, quantity);
            match side {
                OrderSide::Buy => *held += quantity,
                OrderSide::Sell => *held -= quantity,
            }
        }

        let classify = |symbol: &str| -> Option<AssetClass> {
            let from_plan = plan
                .entries
                .iter()
                .find(|e| e.symbol == symbol)
                .map(|e| e.asset_class.as_str());
            let from_state = state
                .positions
                .get(symbol)
                .and_then(|p| p.asset_class.as_deref());
            [config.instrument_class(symbol), from_plan, from_state]
                .into_iter()
                .flatten()
                .find(|c| config.is_known_class(c))
                .map(str::to_string)
        };

        let mut class_values: BTreeMap<AssetClass, f64> =
            config.classes().map(|c| (c.to_string(), 0.0)).collect();
        let mut symbol_values = BTreeMap::new();
        for (symbol, &quantity) in &quantities {
            let Some(price) = prices.get(symbol) else {
                continue;
            };
            if quantity <= 0.0 {
                continue;
            }
            let value = quantity * price;
            symbol_values.insert(symbol.clone(), value);
            if let Some(class) = classify(symbol) {
                *class_values.entry(class).or_default() += value;
            }
        }

        let nav = cash + symbol_values.values().sum::<f64>();
        Self {
            cash,
            quantities,
            nav,
            class_values,
            symbol_values,
        }
    }

    pub fn weight_of(&self, value: f64) -> f64 {
        if self.nav.is_finite() && self.nav > 0.0 {
            value / self.nav
        } else {
            0.0
        }
    }
}

/// Check the projected post-trade portfolio against bands and caps.
pub fn validate_plan(
    plan: &AllocationPlan,
    state: &PortfolioState,
    prices: &PriceBook,
    config: &StrategyConfig,
) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut notes = Vec::new();

    if plan.base_version != state.version {
        errors.push(format!(
            "plan was computed against state version {}, current state is version {}",
            plan.base_version, state.version
        ));
    }

    let projection = Projection::compute(plan, state, prices, config);
    let empty = plan.warnings_of(WarningKind::EmptyPortfolio).next().is_some();
    if empty {
        warnings.push("portfolio has no value; bands cannot be met".to_string());
    }

    let mut classes = Vec::new();
    for (class, &target) in &config.targets {
        let band = config.band(class).unwrap_or(0.0);
        let value = projection.class_values.get(class).copied().unwrap_or(0.0);
        let projected = projection.weight_of(value);
        let within_band = (projected - target).abs() <= band + WEIGHT_TOLERANCE;
        let summary = format!(
            "{class}: target {} | projected {} | band ±{}",
            pct(target),
            pct(projected),
            pct(band)
        );
        if within_band {
            notes.push(format!("{summary} ok"));
        } else if empty || explained(plan, class) {
            warnings.push(format!("{summary} outside band (see plan warnings)"));
        } else {
            errors.push(format!("{summary} outside band"));
        }
        classes.push(ClassCheck {
            asset_class: class.clone(),
            target,
            projected,
            band,
            within_band,
        });
    }

    let mut cap_violations = Vec::new();
    for (symbol, &value) in &projection.symbol_values {
        if let Some(cap) = config.symbol_cap(symbol) {
            let projected = projection.weight_of(value);
            if projected > cap + WEIGHT_TOLERANCE {
                cap_violations.push(CapViolation {
                    scope: CapScope::Symbol,
                    name: symbol.clone(),
                    projected,
                    cap,
                });
            }
        }
    }
    for (class, &value) in &projection.class_values {
        if let Some(cap) = config.class_cap(class) {
            let projected = projection.weight_of(value);
            if projected > cap + WEIGHT_TOLERANCE {
                cap_violations.push(CapViolation {
                    scope: CapScope::Class,
                    name: class.clone(),
                    projected,
                    cap,
                });
            }
        }
    }
    cap_violations.sort_by(|a, b| b.projected.total_cmp(&a.projected));
    if cap_violations.is_empty() {
        notes.push("no symbol or class above its cap".to_string());
    }
    for v in &cap_violations {
        errors.push(format!(
            "{} above cap: {} > {}",
            v.name,
            pct(v.projected),
            pct(v.cap)
        ));
    }

    notes.push(format!(
        "projected NAV {:.2} (cash {:.2}), {} trades",
        projection.nav,
        projection.cash,
        plan.trade_count()
    ));

    let status = if errors.is_empty() {
        ValidationStatus::Ok
    } else {
        ValidationStatus::Fail
    };
    ValidationReport {
        plan_id: plan.plan_id.clone(),
        status,
        projected_nav: projection.nav,
        classes,
        cap_violations,
        errors,
        warnings,
        notes,
    }
}

fn explained(plan: &AllocationPlan, class: &str) -> bool {
    plan.warnings
        .iter()
        .any(|w| explains(w, class) && EXPLAINING_KINDS.contains(&w.kind))
}

fn explains(warning: &PlanWarning, class: &str) -> bool {
    warning.asset_class.as_deref().map_or(true, |c| c == class)
}

fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}
