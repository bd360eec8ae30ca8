//! End-to-end planning + paper execution scenarios.
//!
//! Covers the reference scenarios (band breach in both directions, cash
//! rejection, oversized sell, integer-lot truncation) plus idempotence and
//! persistence round-trips.

use bandwise_core::domain::{
    AllocationPlan, ExecutionStatus, LotMode, PlanAction, PlanEntry, PortfolioState, Position,
    PriceBook, Signal, WarningKind,
};
use bandwise_core::{
    validate_plan, AllocationEngine, PaperSimulator, PlanRequest, StrategyConfig,
};
use chrono::{DateTime, TimeZone, Utc};

const TWO_CLASS: &str = r#"
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

// ── Helpers ──────────────────────────────────────────────────────────

fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 5, 20, 0, 0).unwrap()
}

fn signal(symbol: &str, class: &str, score: f64, confidence: f64) -> Signal {
    Signal {
        symbol: symbol.into(),
        asset_class: class.into(),
        score,
        confidence,
        rationale: format!("{symbol} test signal"),
        timestamp: Utc.with_ymd_and_hms(2025, 9, 5, 19, 30, 0).unwrap(),
    }
}

fn book(prices: &[(&str, f64)]) -> PriceBook {
    prices.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}

fn plan(
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
        generated_at: run_time(),
    })
}

fn single_entry_plan(state: &PortfolioState, symbol: &str, action: PlanAction, qty: f64) -> AllocationPlan {
    AllocationPlan {
        plan_id: String::new(),
        generated_at: run_time(),
        base_version: state.version,
        nav: 0.0,
        cash: state.cash,
        classes: vec![],
        entries: vec![PlanEntry {
            asset_class: "equities".into(),
            symbol: symbol.into(),
            target_weight: 0.6,
            current_weight: 0.5,
            drift: -0.1,
            action,
            suggested_notional: 0.0,
            price: Some(100.0),
            quantity: qty,
            lot_mode: LotMode::Integer,
            reason: None,
        }],
        warnings: vec![],
    }
    .sealed()
}

fn half_and_half() -> (PortfolioState, PriceBook) {
    let mut state = PortfolioState::new(0.0);
    state
        .positions
        .insert("SPY".into(), Position::new(50.0, Some("equities".into())));
    state
        .positions
        .insert("BTC".into(), Position::new(0.1, Some("crypto".into())));
    let prices = book(&[("SPY", 100.0), ("QQQ", 50.0), ("BTC", 50_000.0)]);
    (state, prices)
}

// ── Scenario 1: both classes out of band ─────────────────────────────

#[test]
fn scenario_1_sells_overweight_and_buys_underweight() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let (state, prices) = half_and_half();
    let signals = [
        signal("SPY", "equities", 0.8, 0.9),
        signal("QQQ", "equities", 0.4, 0.5),
        signal("BTC", "crypto", -0.3, 0.7),
    ];
    let p = plan(&config, &state, &prices, &signals);

    let crypto = p.class("crypto").unwrap();
    let equities = p.class("equities").unwrap();
    assert!(crypto.out_of_band && crypto.drift > 0.0);
    assert!(equities.out_of_band && equities.drift < 0.0);

    let sells: Vec<&PlanEntry> = p.entries.iter().filter(|e| e.action == PlanAction::Sell).collect();
    let buys: Vec<&PlanEntry> = p.entries.iter().filter(|e| e.action == PlanAction::Buy).collect();
    assert!(sells.iter().all(|e| e.asset_class == "crypto"));
    assert!(buys.iter().all(|e| e.asset_class == "equities"));
    assert_eq!(sells.len(), 1);
    assert!(!buys.is_empty());

    let report = validate_plan(&p, &state, &prices, &config);
    assert!(report.classes.iter().all(|c| c.within_band), "{report:?}");

    let outcome = PaperSimulator::from_config(&config)
        .apply(&p, &state, &prices, run_time())
        .unwrap();
    assert!(outcome.records.iter().all(|r| r.status == ExecutionStatus::Filled));
    let nav = outcome.nav;
    let equities_value = outcome.state.quantity("SPY") * 100.0 + outcome.state.quantity("QQQ") * 50.0;
    let crypto_value = outcome.state.quantity("BTC") * 50_000.0;
    assert!((equities_value / nav - 0.6).abs() <= 0.05);
    assert!((crypto_value / nav - 0.4).abs() <= 0.05);
    assert!(outcome.state.cash >= 0.0);
}

#[test]
fn scenario_1_sell_precedes_the_buy_it_funds() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let (state, prices) = half_and_half();
    let signals = [signal("SPY", "equities", 0.8, 0.9), signal("BTC", "crypto", -0.3, 0.7)];
    let p = plan(&config, &state, &prices, &signals);
    let first_trade = p.entries.iter().find(|e| e.is_trade()).unwrap();
    assert_eq!(first_trade.action, PlanAction::Sell);
}

// ── Scenario 2: insufficient cash ────────────────────────────────────

#[test]
fn scenario_2_buy_without_cash_is_rejected() {
    let state = PortfolioState::new(800.0);
    let prices = book(&[("SPY", 100.0)]);
    let p = single_entry_plan(&state, "SPY", PlanAction::Buy, 10.0);

    let outcome = PaperSimulator::default()
        .apply(&p, &state, &prices, run_time())
        .unwrap();
    let record = &outcome.records[0];
    assert_eq!(record.status, ExecutionStatus::Rejected);
    assert_eq!(record.reason.as_deref(), Some("insufficient cash"));
    assert_eq!(outcome.state.cash, 800.0);
    assert!(!outcome.state.positions.contains_key("SPY"));
}

// ── Scenario 3: oversized sell ───────────────────────────────────────

#[test]
fn scenario_3_sell_is_clipped_to_holding() {
    let mut state = PortfolioState::new(0.0);
    state
        .positions
        .insert("SPY".into(), Position::new(3.0, Some("equities".into())));
    let prices = book(&[("SPY", 100.0)]);
    let p = single_entry_plan(&state, "SPY", PlanAction::Sell, 5.0);

    let outcome = PaperSimulator::default()
        .apply(&p, &state, &prices, run_time())
        .unwrap();
    let record = &outcome.records[0];
    assert_eq!(record.status, ExecutionStatus::Filled);
    assert_eq!(record.quantity, 3.0);
    assert!(record.reason.as_deref().unwrap().starts_with("WARNING"));
    assert_eq!(outcome.state.quantity("SPY"), 0.0);
    assert_eq!(outcome.state.cash, 300.0);
}

// ── Scenario 4: integer-lot truncation ───────────────────────────────

#[test]
fn scenario_4_integer_lot_truncates() {
    let config = StrategyConfig::from_toml(
        r#"
[targets]
equities = 1.0
[bands]
equities = 0.05
[lot_mode]
equities = "integer"
"#,
    )
    .unwrap();
    let state = PortfolioState::new(290.0);
    let prices = book(&[("SPY", 100.0)]);
    let p = plan(&config, &state, &prices, &[signal("SPY", "equities", 1.0, 1.0)]);

    let entry = &p.entries[0];
    assert!((entry.suggested_notional / 100.0 - 2.9).abs() < 1e-9);
    assert_eq!(entry.action, PlanAction::Buy);
    assert_eq!(entry.quantity, 2.0);
    assert_eq!(p.orders()[0].quantity, 2.0);
}

// ── Spill across ranked symbols ──────────────────────────────────────

fn trades(p: &AllocationPlan, action: PlanAction) -> Vec<(&str, f64)> {
    p.entries
        .iter()
        .filter(|e| e.action == action)
        .map(|e| (e.symbol.as_str(), e.quantity))
        .collect()
}

#[test]
fn truncated_buy_spills_into_next_ranked_symbol() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let state = PortfolioState::new(10_000.0);
    let prices = book(&[("AAA", 3_500.0), ("BBB", 100.0)]);
    let signals = [
        signal("AAA", "equities", 0.9, 1.0),
        signal("BBB", "equities", 0.5, 1.0),
    ];
    let p = plan(&config, &state, &prices, &signals);

    // 6_000 wanted: one AAA lot (3_500), BBB takes the other 2_500
    assert_eq!(trades(&p, PlanAction::Buy), [("AAA", 1.0), ("BBB", 25.0)]);
    assert!(p
        .warnings_of(WarningKind::PartialRebalance)
        .all(|w| w.asset_class.as_deref() != Some("equities")));

    let outcome = PaperSimulator::from_config(&config)
        .apply(&p, &state, &prices, run_time())
        .unwrap();
    let equities = outcome.state.quantity("AAA") * 3_500.0 + outcome.state.quantity("BBB") * 100.0;
    assert!((equities / outcome.nav - 0.6).abs() <= 0.05);
}

#[test]
fn truncated_sell_spills_into_next_ranked_symbol() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let mut state = PortfolioState::new(0.0);
    state
        .positions
        .insert("AAA".into(), Position::new(10.0, Some("equities".into())));
    state
        .positions
        .insert("BBB".into(), Position::new(20.0, Some("equities".into())));
    state
        .positions
        .insert("BTC".into(), Position::new(0.02, Some("crypto".into())));
    let prices = book(&[("AAA", 700.0), ("BBB", 100.0), ("BTC", 50_000.0)]);
    let signals = [
        signal("AAA", "equities", -0.9, 1.0),
        signal("BBB", "equities", -0.2, 1.0),
    ];
    let p = plan(&config, &state, &prices, &signals);

    // equities at 0.9 sell 3_000: four AAA lots (2_800), BBB the last 200
    assert_eq!(trades(&p, PlanAction::Sell), [("AAA", 4.0), ("BBB", 2.0)]);
    let report = validate_plan(&p, &state, &prices, &config);
    let equities = report.classes.iter().find(|c| c.asset_class == "equities").unwrap();
    assert!(equities.within_band, "{report:?}");
}

// ── In-band and idempotence ──────────────────────────────────────────

#[test]
fn in_band_portfolio_plans_no_trades() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let mut state = PortfolioState::new(0.0);
    state
        .positions
        .insert("SPY".into(), Position::new(62.0, Some("equities".into())));
    state
        .positions
        .insert("BTC".into(), Position::new(0.076, Some("crypto".into())));
    let prices = book(&[("SPY", 100.0), ("BTC", 50_000.0)]);
    let signals = [signal("SPY", "equities", 0.9, 1.0), signal("BTC", "crypto", -0.9, 1.0)];
    let p = plan(&config, &state, &prices, &signals);

    assert!(p.is_empty());
    assert!(p.entries.iter().all(|e| e.action == PlanAction::Hold));
    assert_eq!(p.entries.len(), 2);
}

#[test]
fn replanning_after_execution_is_a_no_op() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let state = PortfolioState::new(10_000.0);
    let prices = book(&[("SPY", 100.0), ("BTC", 1_000.0)]);
    let signals = [signal("SPY", "equities", 0.8, 1.0), signal("BTC", "crypto", 0.6, 1.0)];

    let first = plan(&config, &state, &prices, &signals);
    assert!(!first.is_empty());
    let outcome = PaperSimulator::from_config(&config)
        .apply(&first, &state, &prices, run_time())
        .unwrap();

    let mut next = outcome.state;
    next.version += 1;
    let second = plan(&config, &next, &prices, &signals);
    assert!(second.is_empty(), "{:?}", second.entries);
    assert_eq!(second.base_version, 1);
}

#[test]
fn planning_is_deterministic() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let (state, prices) = half_and_half();
    let signals = [
        signal("QQQ", "equities", 0.5, 0.9),
        signal("SPY", "equities", 0.9, 0.5),
        signal("BTC", "crypto", -0.3, 0.7),
    ];
    let a = plan(&config, &state, &prices, &signals);
    let mut reversed = signals.to_vec();
    reversed.reverse();
    let b = plan(&config, &state, &prices, &reversed);
    assert_eq!(a.plan_id, b.plan_id);
    assert_eq!(a, b);
}

#[test]
fn costs_keep_buys_within_cash() {
    let config = StrategyConfig::from_toml(&format!(
        "{TWO_CLASS}\n[execution]\nslippage_bps = 25.0\nfee_bps = 50.0\n"
    ))
    .unwrap();
    let state = PortfolioState::new(10_000.0);
    let prices = book(&[("SPY", 10.0), ("BTC", 1_000.0)]);
    let signals = [signal("SPY", "equities", 0.8, 1.0), signal("BTC", "crypto", 0.6, 1.0)];
    let p = plan(&config, &state, &prices, &signals);

    let outcome = PaperSimulator::from_config(&config)
        .apply(&p, &state, &prices, run_time())
        .unwrap();
    assert!(outcome.records.iter().all(|r| r.is_filled()), "{:?}", outcome.records);
    assert!(outcome.state.cash >= 0.0);
    assert!(p.warnings_of(WarningKind::CashLimited).count() >= 1);
}

// ── Persistence ──────────────────────────────────────────────────────

#[test]
fn state_round_trips_through_json() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let (state, prices) = half_and_half();
    let p = plan(&config, &state, &prices, &[signal("BTC", "crypto", -0.3, 0.7)]);
    let outcome = PaperSimulator::from_config(&config)
        .apply(&p, &state, &prices, run_time())
        .unwrap();

    let json = serde_json::to_string_pretty(&outcome.state).unwrap();
    let back: PortfolioState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, outcome.state);
    back.validate(&config).unwrap();
}

#[test]
fn plan_round_trips_through_json() {
    let config = StrategyConfig::from_toml(TWO_CLASS).unwrap();
    let (state, prices) = half_and_half();
    let p = plan(&config, &state, &prices, &[signal("SPY", "equities", 0.8, 0.9)]);
    let json = serde_json::to_string_pretty(&p).unwrap();
    let back: AllocationPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
    assert_eq!(back.content_hash(), p.plan_id);
}
