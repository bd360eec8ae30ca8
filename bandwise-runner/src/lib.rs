//! Bandwise Runner: batch orchestration around `bandwise-core`.
//!
//! This crate provides:
//! - Run configuration (`bandwise.toml`) with path defaults
//! - File-based signal store with the batch-ready freshness contract
//! - Price snapshot loader
//! - Versioned portfolio state store with atomic writes
//! - Append-only JSONL execution log
//! - The single-cycle pipeline (plan, validate, simulate, persist)
//! - Reporting: plan and validation JSON, markdown summary, CSV exports

pub mod config;
pub mod cycle;
pub mod error;
pub mod execution_log;
pub mod prices;
pub mod reporting;
pub mod signal_store;
pub mod state_store;

pub use config::{RunConfig, RunConfigError, DEFAULT_RUN_CONFIG};
pub use cycle::{
    execute_cycle, plan_cycle, run_cycle, write_plan_artifacts, CycleInputs, CycleReport,
    PlannedCycle, RunError,
};
pub use error::StoreError;
pub use execution_log::ExecutionLog;
pub use prices::{load_prices, parse_prices, PriceSnapshot};
pub use reporting::{ArtifactPaths, ArtifactWriter};
pub use signal_store::{
    gather_from_dir, gather_signals, FileSignalStore, GatheredSignals, RawBatch, SignalStore,
    SignalStoreError,
};
pub use state_store::StateStore;
