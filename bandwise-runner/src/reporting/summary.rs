//! Human-readable renderings: the per-run markdown summary, the plan table
//! printed by `bandwise plan`, and the portfolio status text.

use bandwise_core::domain::{
    AllocationPlan, ExecutionRecord, PlanAction, PortfolioState, PriceBook,
};
use bandwise_core::{SimulationOutcome, ValidationReport};

/// Markdown summary of one cycle. `outcome` is `None` for a dry run.
pub fn render_run_summary(
    plan: &AllocationPlan,
    validation: &ValidationReport,
    outcome: Option<&SimulationOutcome>,
) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Bandwise Run Summary\n\n");
    md.push_str(&format!(
        "Plan: `{}`\n\n",
        plan.plan_id.get(..16).unwrap_or(&plan.plan_id)
    ));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Generated | {} |\n", plan.generated_at.to_rfc3339()));
    md.push_str(&format!("| Base version | {} |\n", plan.base_version));
    md.push_str(&format!("| NAV (pre-trade) | {:.2} |\n", plan.nav));
    md.push_str(&format!("| Cash (pre-trade) | {:.2} |\n", plan.cash));
    md.push_str(&format!("| Trades planned | {} |\n", plan.trade_count()));
    md.push_str(&format!(
        "| Validation | {} |\n",
        if validation.is_ok() { "OK" } else { "FAIL" }
    ));
    if let Some(outcome) = outcome {
        md.push_str(&format!(
            "| Executed | {} filled, {} rejected |\n",
            outcome.filled(),
            outcome.rejected()
        ));
        md.push_str(&format!("| NAV (post-trade) | {:.2} |\n", outcome.nav));
        md.push_str(&format!("| Cash (post-trade) | {:.2} |\n", outcome.state.cash));
    }
    md.push('\n');

    md.push_str("## Classes\n\n");
    md.push_str("| Class | Target | Current | Drift | Band | Projected | Status |\n");
    md.push_str("|-------|--------|---------|-------|------|-----------|--------|\n");
    for class in &plan.classes {
        let projected = validation
            .classes
            .iter()
            .find(|c| c.asset_class == class.asset_class);
        md.push_str(&format!(
            "| {} | {:.2}% | {:.2}% | {:+.2}% | ±{:.2}% | {} | {} |\n",
            class.asset_class,
            class.target_weight * 100.0,
            class.current_weight * 100.0,
            class.drift * 100.0,
            class.band * 100.0,
            projected.map_or("-".to_string(), |c| format!("{:.2}%", c.projected * 100.0)),
            if class.out_of_band { "rebalance" } else { "in band" },
        ));
    }

    let trades: Vec<_> = plan
        .entries
        .iter()
        .filter(|e| matches!(e.action, PlanAction::Buy | PlanAction::Sell | PlanAction::Rejected))
        .collect();
    if !trades.is_empty() {
        md.push_str("\n## Orders\n\n");
        md.push_str("| Action | Class | Symbol | Quantity | Price | Notional | Reason |\n");
        md.push_str("|--------|-------|--------|----------|-------|----------|--------|\n");
        for e in trades {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {:.2} | {} |\n",
                action_label(e.action),
                e.asset_class,
                e.symbol,
                e.quantity,
                e.price.map_or("-".to_string(), |p| format!("{p:.4}")),
                e.suggested_notional,
                e.reason.as_deref().unwrap_or(""),
            ));
        }
    }

    if let Some(outcome) = outcome {
        let rejected: Vec<&ExecutionRecord> =
            outcome.records.iter().filter(|r| !r.is_filled()).collect();
        if !rejected.is_empty() {
            md.push_str("\n## Rejected Executions\n\n");
            for r in rejected {
                md.push_str(&format!(
                    "- {} {} {}: {}\n",
                    r.side,
                    r.requested_quantity,
                    r.symbol,
                    r.reason.as_deref().unwrap_or("rejected")
                ));
            }
        }
    }

    if !plan.warnings.is_empty() {
        md.push_str("\n## Warnings\n\n");
        for w in &plan.warnings {
            md.push_str(&format!("- `{:?}` {}\n", w.kind, w.message));
        }
    }

    if !validation.errors.is_empty() || !validation.warnings.is_empty() {
        md.push_str("\n## Validation\n\n");
        for e in &validation.errors {
            md.push_str(&format!("- **error** {e}\n"));
        }
        for w in &validation.warnings {
            md.push_str(&format!("- warning {w}\n"));
        }
    }

    md
}

fn action_label(action: PlanAction) -> &'static str {
    match action {
        PlanAction::Buy => "BUY",
        PlanAction::Sell => "SELL",
        PlanAction::Hold => "HOLD",
        PlanAction::Rejected => "REJECTED",
    }
}

/// Plain-text plan table for the terminal.
pub fn render_plan(plan: &AllocationPlan) -> String {
    let mut out = format!(
        "plan {}  base v{}  NAV {:.2}  cash {:.2}\n",
        plan.plan_id.get(..12).unwrap_or(&plan.plan_id),
        plan.base_version,
        plan.nav,
        plan.cash
    );
    for class in &plan.classes {
        out.push_str(&format!(
            "  {:<12} target {:>6.2}%  current {:>6.2}%  drift {:>+7.2}%{}\n",
            class.asset_class,
            class.target_weight * 100.0,
            class.current_weight * 100.0,
            class.drift * 100.0,
            if class.out_of_band { "  OUT OF BAND" } else { "" }
        ));
    }
    if plan.entries.is_empty() {
        out.push_str("  (no entries)\n");
    }
    for e in &plan.entries {
        out.push_str(&format!(
            "  {:<8} {:<10} {:>14} @ {:<12} {}\n",
            action_label(e.action),
            e.symbol,
            e.quantity,
            e.price.map_or("-".to_string(), |p| format!("{p:.4}")),
            e.reason.as_deref().unwrap_or("")
        ));
    }
    for w in &plan.warnings {
        out.push_str(&format!("  warning: {}\n", w.message));
    }
    out
}

/// Cash, positions and the tail of the NAV history.
///
/// With `prices`, positions are marked to market and a current NAV is shown.
pub fn render_status(
    state: &PortfolioState,
    prices: Option<&PriceBook>,
    recent: &[ExecutionRecord],
    history_tail: usize,
) -> String {
    let mut out = format!("state version {}\ncash {:.2}\n", state.version, state.cash);
    if let Some(prices) = prices {
        out.push_str(&format!("NAV {:.2}\n", state.nav(prices)));
    }

    out.push_str(&format!("\npositions ({})\n", state.positions.len()));
    for (symbol, position) in &state.positions {
        let class = position.asset_class.as_deref().unwrap_or("?");
        let marked = prices
            .and_then(|p| p.get(symbol))
            .map(|p| format!("  value {:.2}", position.market_value(p)))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {symbol:<10} {class:<12} {:>14}{marked}\n",
            position.quantity
        ));
    }

    let skip = state.nav_history.len().saturating_sub(history_tail);
    if skip < state.nav_history.len() {
        out.push_str("\nNAV history\n");
        for point in &state.nav_history[skip..] {
            out.push_str(&format!("  {}  {:.2}\n", point.timestamp.to_rfc3339(), point.nav));
        }
    }

    if !recent.is_empty() {
        out.push_str("\nrecent executions\n");
        for r in recent {
            out.push_str(&format!(
                "  {} {:<4} {:<10} {:>14} @ {:.4}  {}{}\n",
                r.timestamp.format("%Y-%m-%d %H:%M"),
                r.side,
                r.symbol,
                r.quantity,
                r.price,
                if r.is_filled() { "FILLED" } else { "REJECTED" },
                r.reason
                    .as_deref()
                    .map(|reason| format!(" ({reason})"))
                    .unwrap_or_default()
            ));
        }
    }
    out
}
