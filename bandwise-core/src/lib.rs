//! Bandwise Core: domain types, strategy config, allocation engine, paper execution.
//!
//! This crate contains the pure part of the rebalancing pipeline:
//! - Domain types (signals, portfolio state, plans, orders, execution records)
//! - Strategy configuration with load-time validation
//! - Band-based allocation engine producing a sealed, content-addressed plan
//! - Paper execution simulator with directional slippage and fees
//! - Post-plan validation of projected weights against bands and caps
//!
//! Nothing here touches the filesystem except `StrategyConfig::from_file`.

pub mod allocation;
pub mod config;
pub mod domain;
pub mod execution;
pub mod validation;

pub use allocation::{AllocationEngine, PlanRequest};
pub use config::{ConfigError, StrategyConfig};
pub use execution::{ExecutionError, PaperSimulator, SimulationOutcome};
pub use validation::{validate_plan, ValidationReport, ValidationStatus};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can cross thread boundaries.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::PortfolioState>();
        require_sync::<domain::PortfolioState>();
        require_send::<domain::PriceBook>();
        require_sync::<domain::PriceBook>();
        require_send::<domain::AllocationPlan>();
        require_sync::<domain::AllocationPlan>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::ExecutionRecord>();
        require_sync::<domain::ExecutionRecord>();

        // Config and engines
        require_send::<StrategyConfig>();
        require_sync::<StrategyConfig>();
        require_send::<AllocationEngine<'static>>();
        require_sync::<AllocationEngine<'static>>();
        require_send::<PaperSimulator>();
        require_sync::<PaperSimulator>();
        require_send::<ValidationReport>();
        require_sync::<ValidationReport>();

        // Errors
        require_send::<ConfigError>();
        require_sync::<ConfigError>();
        require_send::<ExecutionError>();
        require_sync::<ExecutionError>();
    }

    /// Planning is a pure function of its request: the engine holds nothing
    /// but a borrowed config, so two engines over one config agree.
    #[test]
    fn engine_is_stateless() {
        let config = StrategyConfig::from_toml(
            r#"
[targets]
cash_like = 1.0
[bands]
cash_like = 0.1
[lot_mode]
cash_like = "integer"
"#,
        )
        .unwrap();
        let state = domain::PortfolioState::new(1_000.0);
        let prices = domain::PriceBook::new();
        let request = PlanRequest {
            state: &state,
            prices: &prices,
            signals: &[],
            input_warnings: &[],
            generated_at: chrono::Utc::now(),
        };
        let a = AllocationEngine::new(&config).plan(&request);
        let b = AllocationEngine::new(&config).plan(&request);
        assert_eq!(a, b);
    }
}
