//! Strategy configuration: target weights, bands, risk caps, lot modes and
//! execution rules.
//!
//! Loaded once per run from TOML (or JSON, by file extension) and immutable
//! afterwards. [`StrategyConfig::validate`] runs on every load; a config that
//! fails it aborts the run before any plan is produced.

use crate::domain::lot::{LotMode, DEFAULT_FRACTIONAL_INCREMENT};
use crate::domain::{AssetClass, Symbol};
use crate::execution::CostModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Allowed deviation of Σ targets from 1.0.
pub const TARGET_SUM_TOLERANCE: f64 = 1e-6;

/// How far a correction moves an out-of-band class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceTarget {
    /// All the way back to the target weight.
    #[default]
    Target,
    /// Only to the nearest band edge (least turnover).
    BandEdge,
}

/// Execution rules shared by planning (cost-aware sizing) and simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionRules {
    #[serde(default)]
    pub slippage_bps: f64,
    #[serde(default)]
    pub fee_bps: f64,
    /// Trades whose resolved notional falls below this are not placed.
    #[serde(default)]
    pub min_trade_notional: f64,
    /// Smallest tradable unit for fractional-lot classes.
    #[serde(default = "default_fractional_increment")]
    pub fractional_increment: f64,
}

fn default_fractional_increment() -> f64 {
    DEFAULT_FRACTIONAL_INCREMENT
}

impl Default for ExecutionRules {
    fn default() -> Self {
        Self {
            slippage_bps: 0.0,
            fee_bps: 0.0,
            min_trade_notional: 0.0,
            fractional_increment: DEFAULT_FRACTIONAL_INCREMENT,
        }
    }
}

impl ExecutionRules {
    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.slippage_bps, self.fee_bps)
    }
}

/// Complete strategy configuration.
///
/// `risk_caps` keys naming a configured class cap the class weight; any other
/// key caps that symbol. `position_max` is the per-symbol cap for symbols
/// without an explicit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub targets: BTreeMap<AssetClass, f64>,
    #[serde(default)]
    pub bands: BTreeMap<AssetClass, f64>,
    #[serde(default)]
    pub default_band: Option<f64>,
    #[serde(default)]
    pub risk_caps: BTreeMap<String, f64>,
    #[serde(default)]
    pub position_max: Option<f64>,
    #[serde(default)]
    pub lot_mode: BTreeMap<AssetClass, LotMode>,
    #[serde(default)]
    pub execution: ExecutionRules,
    #[serde(default)]
    pub rebalance_to: RebalanceTarget,
    /// Explicit symbol → class assignments; take precedence over the class a
    /// signal or stored position claims.
    #[serde(default)]
    pub instruments: BTreeMap<Symbol, AssetClass>,
}

impl StrategyConfig {
    /// Load and validate a config file. `.json` files are parsed as JSON,
    /// everything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for (class, &weight) in &self.targets {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::InvalidTarget {
                    class: class.clone(),
                    weight,
                });
            }
        }
        let sum: f64 = self.targets.values().sum();
        if (sum - 1.0).abs() > TARGET_SUM_TOLERANCE {
            return Err(ConfigError::TargetSum {
                sum,
                tolerance: TARGET_SUM_TOLERANCE,
            });
        }

        for class in self.bands.keys().chain(self.lot_mode.keys()) {
            if !self.is_known_class(class) {
                return Err(ConfigError::UnknownClass {
                    section: if self.bands.contains_key(class) {
                        "bands"
                    } else {
                        "lot_mode"
                    },
                    class: class.clone(),
                });
            }
        }
        for (symbol, class) in &self.instruments {
            if self.is_known_class(symbol) {
                return Err(ConfigError::SymbolNamesClass {
                    symbol: symbol.clone(),
                });
            }
            if !self.is_known_class(class) {
                return Err(ConfigError::UnknownClass {
                    section: "instruments",
                    class: format!("{class} (for {symbol})"),
                });
            }
        }

        if let Some(band) = self.default_band {
            check_band("default_band", band)?;
        }
        for class in self.targets.keys() {
            let band = self
                .bands
                .get(class)
                .copied()
                .or(self.default_band)
                .ok_or_else(|| ConfigError::MissingBand {
                    class: class.clone(),
                })?;
            check_band(class, band)?;
            if !self.lot_mode.contains_key(class) {
                return Err(ConfigError::MissingLotMode {
                    class: class.clone(),
                });
            }
        }

        let caps = self
            .risk_caps
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .chain(self.position_max.map(|v| ("position_max", v)));
        for (key, cap) in caps {
            if !cap.is_finite() || cap <= 0.0 || cap > 1.0 {
                return Err(ConfigError::InvalidCap {
                    key: key.to_string(),
                    cap,
                });
            }
        }

        let exec = &self.execution;
        for (field, bps) in [("slippage_bps", exec.slippage_bps), ("fee_bps", exec.fee_bps)] {
            if !bps.is_finite() || !(0.0..10_000.0).contains(&bps) {
                return Err(ConfigError::InvalidExecution { field, value: bps });
            }
        }
        if !exec.min_trade_notional.is_finite() || exec.min_trade_notional < 0.0 {
            return Err(ConfigError::InvalidExecution {
                field: "min_trade_notional",
                value: exec.min_trade_notional,
            });
        }
        if !exec.fractional_increment.is_finite() || exec.fractional_increment <= 0.0 {
            return Err(ConfigError::InvalidExecution {
                field: "fractional_increment",
                value: exec.fractional_increment,
            });
        }
        Ok(())
    }

    pub fn is_known_class(&self, class: &str) -> bool {
        self.targets.contains_key(class)
    }

    /// Configured classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(|c| c.as_str())
    }

    pub fn target(&self, class: &str) -> Option<f64> {
        self.targets.get(class).copied()
    }

    /// Band for a configured class (explicit, else `default_band`).
    pub fn band(&self, class: &str) -> Option<f64> {
        self.bands.get(class).copied().or(self.default_band)
    }

    pub fn lot_mode(&self, class: &str) -> Option<LotMode> {
        self.lot_mode.get(class).copied()
    }

    /// Max weight of a whole class, when capped.
    pub fn class_cap(&self, class: &str) -> Option<f64> {
        if self.is_known_class(class) {
            self.risk_caps.get(class).copied()
        } else {
            None
        }
    }

    /// Max weight of a single symbol: explicit cap, else `position_max`.
    ///
    /// Symbols sharing a class name are rejected at load (config, state and
    /// signals), so a `risk_caps` key here is never a class cap.
    pub fn symbol_cap(&self, symbol: &str) -> Option<f64> {
        self.risk_caps.get(symbol).copied().or(self.position_max)
    }

    /// Class explicitly assigned to `symbol` in `instruments`.
    pub fn instrument_class(&self, symbol: &str) -> Option<&str> {
        self.instruments.get(symbol).map(|c| c.as_str())
    }

    pub fn cost_model(&self) -> CostModel {
        self.execution.cost_model()
    }
}

fn check_band(label: &str, band: f64) -> Result<(), ConfigError> {
    if !band.is_finite() || band < 0.0 {
        return Err(ConfigError::InvalidBand {
            class: label.to_string(),
            band,
        });
    }
    Ok(())
}

/// Strategy config is unusable. Fatal: the run stops before planning.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("malformed config: {0}")]
    Parse(String),

    #[error("no target weights configured")]
    NoTargets,

    #[error("target weight for '{class}' must be within [0, 1], got {weight}")]
    InvalidTarget { class: String, weight: f64 },

    #[error("target weights sum to {sum}, expected 1.0 (±{tolerance})")]
    TargetSum { sum: f64, tolerance: f64 },

    #[error("[{section}] references unknown asset class '{class}'")]
    UnknownClass { section: &'static str, class: String },

    #[error("instrument '{symbol}' has the same name as an asset class")]
    SymbolNamesClass { symbol: String },

    #[error("no band configured for '{class}' and no default_band")]
    MissingBand { class: String },

    #[error("band for '{class}' must be a non-negative number, got {band}")]
    InvalidBand { class: String, band: f64 },

    #[error("no lot_mode configured for '{class}'")]
    MissingLotMode { class: String },

    #[error("risk cap '{key}' must be within (0, 1], got {cap}")]
    InvalidCap { key: String, cap: f64 },

    #[error("execution.{field} is out of range: {value}")]
    InvalidExecution { field: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
position_max = 0.3

[targets]
equities = 0.6
crypto = 0.4

[bands]
equities = 0.05
crypto = 0.05

[risk_caps]
BTC = 0.25
crypto = 0.45

[lot_mode]
equities = "integer"
crypto = "fractional"

[execution]
slippage_bps = 5.0
fee_bps = 2.5

[instruments]
BTC = "crypto"
"#;

    #[test]
    fn parses_sample_toml() {
        let config = StrategyConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.target("equities"), Some(0.6));
        assert_eq!(config.band("crypto"), Some(0.05));
        assert_eq!(config.lot_mode("equities"), Some(LotMode::Integer));
        assert_eq!(config.class_cap("crypto"), Some(0.45));
        assert_eq!(config.class_cap("equities"), None);
        assert_eq!(config.symbol_cap("BTC"), Some(0.25));
        assert_eq!(config.symbol_cap("ETH"), Some(0.3));
        assert_eq!(config.instrument_class("BTC"), Some("crypto"));
        assert_eq!(config.execution.fractional_increment, DEFAULT_FRACTIONAL_INCREMENT);
        assert_eq!(config.rebalance_to, RebalanceTarget::Target);
    }

    #[test]
    fn json_and_toml_agree() {
        let from_toml = StrategyConfig::from_toml(SAMPLE).unwrap();
        let json = serde_json::to_string(&from_toml).unwrap();
        let from_json = StrategyConfig::from_json(&json).unwrap();
        assert_eq!(from_toml, from_json);
    }

    #[test]
    fn targets_must_sum_to_one() {
        let doc = SAMPLE.replace("crypto = 0.4\n", "crypto = 0.3\n");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::TargetSum { .. })
        ));
    }

    #[test]
    fn tiny_rounding_in_targets_is_tolerated() {
        let doc = SAMPLE.replace("crypto = 0.4\n", "crypto = 0.4000001\n");
        assert!(StrategyConfig::from_toml(&doc).is_ok());
    }

    #[test]
    fn unknown_class_in_bands_is_rejected() {
        let doc = SAMPLE.replace("crypto = 0.05\n", "crypto = 0.05\nreits = 0.05\n");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::UnknownClass { section: "bands", .. })
        ));
    }

    #[test]
    fn default_band_covers_missing_bands() {
        let doc = SAMPLE
            .replace("[bands]\nequities = 0.05\ncrypto = 0.05\n", "")
            .replace("position_max = 0.3", "position_max = 0.3\ndefault_band = 0.02");
        let config = StrategyConfig::from_toml(&doc).unwrap();
        assert_eq!(config.band("equities"), Some(0.02));
    }

    #[test]
    fn missing_band_without_default_is_rejected() {
        let doc = SAMPLE.replace("crypto = 0.05\n", "");
        assert_eq!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::MissingBand {
                class: "crypto".into()
            })
        );
    }

    #[test]
    fn missing_lot_mode_is_rejected() {
        let doc = SAMPLE.replace("crypto = \"fractional\"\n", "");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::MissingLotMode { .. })
        ));
    }

    #[test]
    fn instrument_named_like_a_class_is_rejected() {
        let doc = SAMPLE.replace("BTC = \"crypto\"", "BTC = \"crypto\"\nequities = \"crypto\"");
        assert_eq!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::SymbolNamesClass {
                symbol: "equities".into()
            })
        );
    }

    #[test]
    fn negative_band_is_rejected() {
        let doc = SAMPLE.replace("equities = 0.05", "equities = -0.05");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::InvalidBand { .. })
        ));
    }

    #[test]
    fn cap_above_one_is_rejected() {
        let doc = SAMPLE.replace("BTC = 0.25", "BTC = 1.5");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::InvalidCap { .. })
        ));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let doc = format!("{SAMPLE}\n[extra]\nfoo = 1\n");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn execution_bps_out_of_range_is_rejected() {
        let doc = SAMPLE.replace("fee_bps = 2.5", "fee_bps = -1.0");
        assert!(matches!(
            StrategyConfig::from_toml(&doc),
            Err(ConfigError::InvalidExecution { field: "fee_bps", .. })
        ));
    }
}
