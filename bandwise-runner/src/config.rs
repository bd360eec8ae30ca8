//! Run configuration: where a cycle reads its inputs and writes its outputs.
//!
//! Read from `bandwise.toml` when present; every field has a default so a
//! bare working directory laid out the conventional way needs no file at all.
//! Relative paths are resolved against the directory holding the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default file name looked up by the CLI.
pub const DEFAULT_RUN_CONFIG: &str = "bandwise.toml";

/// Upper bound on `max_signal_age_hours` (one year).
pub const MAX_SIGNAL_AGE_HOURS: f64 = 24.0 * 366.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Strategy config (TOML, or JSON by extension).
    pub strategy: PathBuf,
    /// Directory holding `signals_<asset_class>.json` batches.
    pub signals_dir: PathBuf,
    /// Price snapshot JSON.
    pub prices: PathBuf,
    /// Portfolio state JSON.
    pub state: PathBuf,
    /// Append-only JSONL execution log.
    pub execution_log: PathBuf,
    /// Directory for plan, validation report, summary and CSV exports.
    pub out_dir: PathBuf,
    /// Batches generated longer ago than this are ignored.
    pub max_signal_age_hours: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: PathBuf::from("config/strategy.toml"),
            signals_dir: PathBuf::from("signals"),
            prices: PathBuf::from("data/prices.json"),
            state: PathBuf::from("state/portfolio.json"),
            execution_log: PathBuf::from("state/executions.jsonl"),
            out_dir: PathBuf::from("out"),
            max_signal_age_hours: 24.0,
        }
    }
}

impl RunConfig {
    /// Load `path`, resolving relative paths against its directory.
    pub fn from_file(path: &Path) -> Result<Self, RunConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolved_against(base))
    }

    pub fn from_toml(content: &str) -> Result<Self, RunConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| RunConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults rooted at
    /// the path's directory.
    pub fn load_or_default(path: &Path) -> Result<Self, RunConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            Ok(Self::default().resolved_against(base))
        }
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        let hours = self.max_signal_age_hours;
        if !hours.is_finite() || hours <= 0.0 || hours > MAX_SIGNAL_AGE_HOURS {
            return Err(RunConfigError::InvalidMaxAge(self.max_signal_age_hours));
        }
        Ok(())
    }

    /// Every relative path joined onto `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        for path in [
            &mut self.strategy,
            &mut self.signals_dir,
            &mut self.prices,
            &mut self.state,
            &mut self.execution_log,
            &mut self.out_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    /// Freshness window, clamped to [`MAX_SIGNAL_AGE_HOURS`] for configs
    /// built without going through [`RunConfig::validate`].
    pub fn max_signal_age(&self) -> chrono::Duration {
        let hours = self.max_signal_age_hours.clamp(0.0, MAX_SIGNAL_AGE_HOURS);
        let hours = if hours.is_nan() { 0.0 } else { hours };
        chrono::Duration::try_seconds((hours * 3600.0).round() as i64)
            .unwrap_or_else(chrono::Duration::zero)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunConfigError {
    #[error("read run config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("malformed run config: {0}")]
    Parse(String),

    #[error(
        "max_signal_age_hours must be within (0, {max}], got {0}",
        max = MAX_SIGNAL_AGE_HOURS
    )]
    InvalidMaxAge(f64),
}
