//! Reporting: per-run artifacts written to the output directory.
//!
//! - `plan.json`: the sealed allocation plan
//! - `validation.json`: the post-plan validation report
//! - `summary.md`: markdown run summary
//! - `plan.csv` / `executions.csv`: flat exports for spreadsheets
//!
//! Artifacts are derived data. The state file and the execution log are the
//! records of truth; a failed artifact write never rolls them back.

pub mod export;
pub mod summary;

pub use export::{export_executions_csv, export_plan_csv};
pub use summary::{render_plan, render_run_summary, render_status};

use anyhow::{Context, Result};
use bandwise_core::domain::AllocationPlan;
use bandwise_core::{SimulationOutcome, ValidationReport};
use std::path::{Path, PathBuf};

/// Paths of the artifacts written for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPaths {
    pub plan_json: Option<PathBuf>,
    pub validation_json: Option<PathBuf>,
    pub summary_markdown: Option<PathBuf>,
    pub plan_csv: Option<PathBuf>,
    pub executions_csv: Option<PathBuf>,
}

/// Writes artifacts into one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!(
                "Failed to create artifact output directory {}",
                output_dir.display()
            )
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write_plan(&self, plan: &AllocationPlan) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(plan).context("Failed to serialize plan")?;
        self.write("plan.json", &json)
    }

    pub fn write_validation(&self, report: &ValidationReport) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(report)
            .context("Failed to serialize validation report")?;
        self.write("validation.json", &json)
    }

    /// Summary and CSV exports for a cycle. Without an outcome (dry run)
    /// there is no executions CSV.
    pub fn write_reports(
        &self,
        plan: &AllocationPlan,
        validation: &ValidationReport,
        outcome: Option<&SimulationOutcome>,
        paths: &mut ArtifactPaths,
    ) -> Result<()> {
        let summary = render_run_summary(plan, validation, outcome);
        paths.summary_markdown = Some(self.write("summary.md", &summary)?);
        paths.plan_csv = Some(self.write("plan.csv", &export_plan_csv(plan)?)?);
        if let Some(outcome) = outcome {
            let csv = export_executions_csv(&outcome.records)?;
            paths.executions_csv = Some(self.write("executions.csv", &csv)?);
        }
        Ok(())
    }

    fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
