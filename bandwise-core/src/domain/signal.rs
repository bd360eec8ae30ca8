//! Signals: the opaque output of the per-asset-class scoring agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single investment signal for one symbol.
///
/// `score` carries strength and direction (positive = bullish), `confidence`
/// how much the producing agent trusts it. How either is computed is the
/// agent's business; the allocation engine only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub asset_class: String,
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Ranking key: `score × confidence`.
    pub fn strength(&self) -> f64 {
        self.score * self.confidence
    }

    /// Check the record-level contract: non-empty symbol, finite score,
    /// confidence in `[0, 1]`.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.symbol.trim().is_empty() {
            return Err(SignalError::EmptySymbol);
        }
        if !self.score.is_finite() {
            return Err(SignalError::NonFiniteScore {
                symbol: self.symbol.clone(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SignalError::ConfidenceOutOfRange {
                symbol: self.symbol.clone(),
                confidence: self.confidence,
            });
        }
        Ok(())
    }
}

/// One agent's output for one asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBatch {
    pub asset_class: String,
    pub generated_at: DateTime<Utc>,
    pub signals: Vec<Signal>,
}

/// Why an individual signal record was dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignalError {
    #[error("signal has an empty symbol")]
    EmptySymbol,

    #[error("signal for {symbol} has a non-finite score")]
    NonFiniteScore { symbol: String },

    #[error("signal for {symbol} has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { symbol: String, confidence: f64 },

    #[error("signal for {symbol} names unknown asset class '{asset_class}'")]
    UnknownAssetClass { symbol: String, asset_class: String },

    #[error("signal symbol {symbol} is also the name of an asset class")]
    SymbolNamesClass { symbol: String },

    #[error("duplicate signal for {symbol} in batch '{asset_class}'")]
    Duplicate { symbol: String, asset_class: String },

    #[error("malformed signal record: {0}")]
    Malformed(String),
}
