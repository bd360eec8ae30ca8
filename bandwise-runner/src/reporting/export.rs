//! CSV exports of plan entries and execution records.

use anyhow::{Context, Result};
use bandwise_core::domain::{AllocationPlan, ExecutionRecord};

/// Every plan entry, HOLD and REJECTED included.
///
/// Columns: asset_class, symbol, action, target_weight, current_weight,
/// drift, suggested_notional, price, quantity, lot_mode, reason
pub fn export_plan_csv(plan: &AllocationPlan) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "asset_class",
        "symbol",
        "action",
        "target_weight",
        "current_weight",
        "drift",
        "suggested_notional",
        "price",
        "quantity",
        "lot_mode",
        "reason",
    ])?;

    for e in &plan.entries {
        wtr.write_record([
            e.asset_class.as_str(),
            e.symbol.as_str(),
            &format!("{:?}", e.action).to_uppercase(),
            &format!("{:.6}", e.target_weight),
            &format!("{:.6}", e.current_weight),
            &format!("{:.6}", e.drift),
            &format!("{:.2}", e.suggested_notional),
            &e.price.map(|p| format!("{p:.6}")).unwrap_or_default(),
            &format!("{}", e.quantity),
            &format!("{:?}", e.lot_mode).to_lowercase(),
            e.reason.as_deref().unwrap_or(""),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Execution records in the order they were applied.
pub fn export_executions_csv(records: &[ExecutionRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "order_id",
        "timestamp",
        "symbol",
        "asset_class",
        "side",
        "requested_quantity",
        "quantity",
        "price",
        "notional",
        "fees",
        "status",
        "reason",
    ])?;

    for r in records {
        wtr.write_record([
            r.order_id.as_str(),
            &r.timestamp.to_rfc3339(),
            r.symbol.as_str(),
            r.asset_class.as_str(),
            &r.side.to_string(),
            &format!("{}", r.requested_quantity),
            &format!("{}", r.quantity),
            &format!("{:.6}", r.price),
            &format!("{:.2}", r.notional),
            &format!("{:.2}", r.fees),
            if r.is_filled() { "FILLED" } else { "REJECTED" },
            r.reason.as_deref().unwrap_or(""),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandwise_core::domain::{ExecutionStatus, LotMode, OrderSide, PlanAction, PlanEntry};
    use chrono::{TimeZone, Utc};

    fn plan() -> AllocationPlan {
        AllocationPlan {
            plan_id: String::new(),
            generated_at: Utc.with_ymd_and_hms(2025, 9, 5, 20, 0, 0).unwrap(),
            base_version: 0,
            nav: 10_000.0,
            cash: 10_000.0,
            classes: vec![],
            entries: vec![
                PlanEntry {
                    asset_class: "equities".into(),
                    symbol: "SPY".into(),
                    target_weight: 0.6,
                    current_weight: 0.0,
                    drift: -0.6,
                    action: PlanAction::Buy,
                    suggested_notional: 6_000.0,
                    price: Some(500.0),
                    quantity: 12.0,
                    lot_mode: LotMode::Integer,
                    reason: None,
                },
                PlanEntry {
                    asset_class: "crypto".into(),
                    symbol: "BTC".into(),
                    target_weight: 0.4,
                    current_weight: 0.0,
                    drift: -0.4,
                    action: PlanAction::Rejected,
                    suggested_notional: 4_000.0,
                    price: None,
                    quantity: 0.0,
                    lot_mode: LotMode::Fractional,
                    reason: Some("no price".into()),
                },
            ],
            warnings: vec![],
        }
        .sealed()
    }

    #[test]
    fn plan_csv_has_header_and_rows() {
        let csv = export_plan_csv(&plan()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("asset_class,symbol,action"));
        assert!(lines[1].starts_with("equities,SPY,BUY,"));
        assert!(lines[2].contains("REJECTED"));
        assert!(lines[2].ends_with("fractional,no price"));
    }

    #[test]
    fn executions_csv_quotes_reasons_with_commas() {
        let record = ExecutionRecord {
            order_id: "abc-0000".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 9, 5, 20, 0, 0).unwrap(),
            symbol: "SPY".into(),
            asset_class: "equities".into(),
            side: OrderSide::Sell,
            requested_quantity: 5.0,
            quantity: 3.0,
            price: 499.5,
            notional: 1_498.5,
            fees: 0.75,
            status: ExecutionStatus::Filled,
            reason: Some("WARNING: clipped, held 3".into()),
        };
        let csv = export_executions_csv(&[record]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("abc-0000,2025-09-05T20:00:00+00:00,SPY,equities,SELL,5,3,"));
        assert!(row.ends_with("FILLED,\"WARNING: clipped, held 3\""));
    }
}
