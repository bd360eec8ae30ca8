//! Single-cycle pipeline.
//!
//! ```text
//! load inputs → plan → validate → write plan.json / validation.json
//!             → simulate → check version → append execution log
//!             → save state → reports
//! ```
//!
//! Every fatal error surfaces before the state save, so a failed cycle
//! leaves the portfolio file as it was. The log is written ahead of the
//! save: a state version never exists without its execution records.

use std::path::Path;

use bandwise_core::domain::{AllocationPlan, PortfolioState};
use bandwise_core::{
    validate_plan, AllocationEngine, ConfigError, ExecutionError, PaperSimulator, PlanRequest,
    SimulationOutcome, StrategyConfig, ValidationReport,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::config::{RunConfig, RunConfigError};
use crate::error::StoreError;
use crate::execution_log::ExecutionLog;
use crate::prices::{load_prices, PriceSnapshot};
use crate::reporting::{ArtifactPaths, ArtifactWriter};
use crate::signal_store::{gather_signals, FileSignalStore, GatheredSignals, SignalStore};
use crate::state_store::StateStore;

/// Errors that abort a cycle.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run config error: {0}")]
    RunConfig(#[from] RunConfigError),
    #[error("strategy config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("artifact error: {0:#}")]
    Artifacts(anyhow::Error),
}

/// Everything a cycle reads, loaded once.
#[derive(Debug, Clone)]
pub struct CycleInputs {
    pub config: StrategyConfig,
    pub state: PortfolioState,
    pub prices: PriceSnapshot,
    pub signals: GatheredSignals,
    pub now: DateTime<Utc>,
}

impl CycleInputs {
    /// Load strategy, state and prices (all fatal on failure) and gather
    /// signals from the configured directory (never fatal).
    pub fn load(run: &RunConfig, now: DateTime<Utc>) -> Result<Self, RunError> {
        let store = FileSignalStore::new(&run.signals_dir);
        Self::load_with(run, &store, now)
    }

    pub fn load_with(
        run: &RunConfig,
        signals: &dyn SignalStore,
        now: DateTime<Utc>,
    ) -> Result<Self, RunError> {
        let config = StrategyConfig::from_file(&run.strategy)?;
        let state = StateStore::new(&run.state).load_validated(&config)?;
        let prices = load_prices(&run.prices)?;
        let signals = gather_signals(signals, config.classes(), now, run.max_signal_age());
        info!(
            "inputs: state v{}, {} prices, {} signals from {} classes",
            state.version,
            prices.prices.len(),
            signals.signals.len(),
            signals.fresh_classes.len()
        );
        Ok(Self {
            config,
            state,
            prices,
            signals,
            now,
        })
    }

    pub fn plan(&self) -> PlannedCycle {
        let request = PlanRequest {
            state: &self.state,
            prices: &self.prices.prices,
            signals: &self.signals.signals,
            input_warnings: &self.signals.warnings,
            generated_at: self.now,
        };
        let plan = AllocationEngine::new(&self.config).plan(&request);
        let validation = validate_plan(&plan, &self.state, &self.prices.prices, &self.config);
        if validation.is_ok() {
            info!("validation OK");
        } else {
            for e in &validation.errors {
                warn!("validation: {e}");
            }
        }
        PlannedCycle { plan, validation }
    }
}

/// A plan and its validation report.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCycle {
    pub plan: AllocationPlan,
    pub validation: ValidationReport,
}

/// Result of a full cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub plan: AllocationPlan,
    pub validation: ValidationReport,
    pub outcome: SimulationOutcome,
    /// State as saved, with its bumped version.
    pub state: PortfolioState,
    pub logged: usize,
    pub artifacts: ArtifactPaths,
}

/// Compute the plan and its validation without touching state or artifacts.
pub fn plan_cycle(run: &RunConfig, now: DateTime<Utc>) -> Result<PlannedCycle, RunError> {
    Ok(CycleInputs::load(run, now)?.plan())
}

/// Write `plan.json` and `validation.json` under `out_dir`.
pub fn write_plan_artifacts(
    out_dir: &Path,
    planned: &PlannedCycle,
) -> Result<ArtifactPaths, RunError> {
    let writer = ArtifactWriter::new(out_dir).map_err(RunError::Artifacts)?;
    Ok(ArtifactPaths {
        plan_json: Some(
            writer
                .write_plan(&planned.plan)
                .map_err(RunError::Artifacts)?,
        ),
        validation_json: Some(
            writer
                .write_validation(&planned.validation)
                .map_err(RunError::Artifacts)?,
        ),
        ..ArtifactPaths::default()
    })
}

/// Plan, execute against the paper portfolio and persist.
pub fn run_cycle(run: &RunConfig, now: DateTime<Utc>) -> Result<CycleReport, RunError> {
    let inputs = CycleInputs::load(run, now)?;
    execute_cycle(run, inputs)
}

/// [`run_cycle`] over already-loaded inputs.
pub fn execute_cycle(run: &RunConfig, inputs: CycleInputs) -> Result<CycleReport, RunError> {
    let planned = inputs.plan();
    let mut artifacts = write_plan_artifacts(&run.out_dir, &planned)?;
    let PlannedCycle { plan, validation } = planned;
    if !validation.is_ok() {
        warn!("plan failed validation; executing anyway, see validation.json");
    }

    let simulator = PaperSimulator::from_config(&inputs.config);
    let outcome = simulator.apply(&plan, &inputs.state, &inputs.prices.prices, inputs.now)?;

    let store = StateStore::new(&run.state);
    store.check_version(inputs.state.version)?;
    let logged = ExecutionLog::new(&run.execution_log).append(&outcome.records)?;
    let state = match store.save(&outcome.state, inputs.state.version) {
        Ok(state) => state,
        Err(e) => {
            if logged > 0 {
                warn!(
                    "{logged} execution records for plan {} logged but state not saved",
                    plan.plan_id
                );
            }
            return Err(e.into());
        }
    };

    let writer = ArtifactWriter::new(&run.out_dir).map_err(RunError::Artifacts)?;
    writer
        .write_reports(&plan, &validation, Some(&outcome), &mut artifacts)
        .map_err(RunError::Artifacts)?;

    info!(
        "cycle complete: {} filled, {} rejected, NAV {:.2}, state v{}",
        outcome.filled(),
        outcome.rejected(),
        outcome.nav,
        state.version
    );
    Ok(CycleReport {
        plan,
        validation,
        outcome,
        state,
        logged,
        artifacts,
    })
}
