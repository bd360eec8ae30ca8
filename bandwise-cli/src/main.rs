//! Bandwise CLI: paper portfolio rebalancing commands.
//!
//! Commands:
//! - `init`: create an empty, versioned portfolio state with starting cash
//! - `plan`: compute and print the plan without executing it, write `plan.json`
//! - `run`: plan, simulate, persist state and append the execution log
//! - `validate`: plan and validate without executing; exits non-zero on FAIL
//! - `status`: cash, positions, NAV history and recent executions

use anyhow::{Context, Result};
use bandwise_runner::reporting::{render_plan, render_status};
use bandwise_runner::{
    load_prices, plan_cycle, run_cycle, write_plan_artifacts, ExecutionLog, RunConfig,
    StateStore, DEFAULT_RUN_CONFIG,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bandwise",
    about = "Bandwise CLI: band-based rebalancing against a paper portfolio"
)]
struct Cli {
    /// Run config (TOML). Missing file means defaults relative to its directory.
    #[arg(long, global = true, default_value = DEFAULT_RUN_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty portfolio state holding only cash.
    Init {
        /// Starting cash.
        #[arg(long)]
        cash: f64,

        /// Replace an existing state file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Compute the plan without executing it.
    Plan,
    /// Plan, execute against the paper portfolio and persist the result.
    Run,
    /// Compute the plan and its validation report; exit 1 on FAIL.
    Validate,
    /// Show cash, positions and NAV history.
    Status {
        /// Number of NAV history points and executions to show.
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let run = RunConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Init { cash, force } => run_init(&run, cash, force),
        Commands::Plan => run_plan(&run),
        Commands::Run => run_full_cycle(&run),
        Commands::Validate => run_validate(&run),
        Commands::Status { tail } => run_status(&run, tail),
    }
}

fn run_init(run: &RunConfig, cash: f64, force: bool) -> Result<()> {
    let state = StateStore::new(&run.state).init(cash, force)?;
    println!(
        "Initialised {} (version {}, cash {:.2})",
        run.state.display(),
        state.version,
        state.cash
    );
    Ok(())
}

fn run_plan(run: &RunConfig) -> Result<()> {
    let planned = plan_cycle(run, Utc::now())?;
    let paths = write_plan_artifacts(&run.out_dir, &planned)?;
    print!("{}", render_plan(&planned.plan));
    if let Some(path) = paths.plan_json {
        println!("Plan written to {}", path.display());
    }
    Ok(())
}

fn run_full_cycle(run: &RunConfig) -> Result<()> {
    let report = run_cycle(run, Utc::now())?;
    print!("{}", render_plan(&report.plan));
    println!(
        "Executed {} orders: {} filled, {} rejected",
        report.outcome.records.len(),
        report.outcome.filled(),
        report.outcome.rejected()
    );
    println!(
        "NAV {:.2}, cash {:.2}, state version {}",
        report.outcome.nav, report.state.cash, report.state.version
    );
    if let Some(path) = &report.artifacts.summary_markdown {
        println!("Summary: {}", path.display());
    }
    Ok(())
}

fn run_validate(run: &RunConfig) -> Result<()> {
    let planned = plan_cycle(run, Utc::now())?;
    let paths = write_plan_artifacts(&run.out_dir, &planned)?;
    let report = &planned.validation;

    println!(
        "Validation {}",
        if report.is_ok() { "OK" } else { "FAIL" }
    );
    for note in &report.notes {
        println!("  note: {note}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for error in &report.errors {
        println!("  error: {error}");
    }
    if let Some(path) = paths.validation_json {
        println!("Report written to {}", path.display());
    }

    if !report.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(run: &RunConfig, tail: usize) -> Result<()> {
    let state = StateStore::new(&run.state).load()?;
    let prices = if run.prices.exists() {
        Some(load_prices(&run.prices)?)
    } else {
        info!("no price snapshot at {}; NAV not marked", run.prices.display());
        None
    };
    let recent = ExecutionLog::new(&run.execution_log).tail(tail)?;
    print!(
        "{}",
        render_status(&state, prices.as_ref().map(|p| &p.prices), &recent, tail)
    );
    Ok(())
}
