//! Signal store: read-only access to the batches written by the per-class
//! scoring agents.
//!
//! A batch is used only when it is present, readable and fresh: generated
//! within `max_age` of the run and not meaningfully in the future. Anything
//! else becomes a [`PlanWarning`] and the class is skipped for this run;
//! none of it is fatal. Individual bad records are dropped the same way.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bandwise_core::domain::{PlanWarning, Signal, SignalBatch, SignalError, WarningKind};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Tolerated clock skew for batches stamped slightly ahead of the run.
pub const MAX_FUTURE_SKEW_MINUTES: i64 = 5;

/// A batch as read from the store, with the records that did not survive
/// parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub batch: SignalBatch,
    pub dropped: Vec<SignalError>,
}

#[derive(Debug, Error)]
pub enum SignalStoreError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a signal batch: {reason}")]
    Malformed { path: String, reason: String },
}

/// Where batches come from.
pub trait SignalStore {
    /// The latest batch for `asset_class`, or `None` when there is none.
    fn batch(&self, asset_class: &str) -> Result<Option<RawBatch>, SignalStoreError>;
}

/// Batches stored as `<dir>/signals_<asset_class>.json`.
#[derive(Debug, Clone)]
pub struct FileSignalStore {
    dir: PathBuf,
}

impl FileSignalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn batch_path(&self, asset_class: &str) -> PathBuf {
        self.dir.join(format!("signals_{asset_class}.json"))
    }
}

impl SignalStore for FileSignalStore {
    fn batch(&self, asset_class: &str) -> Result<Option<RawBatch>, SignalStoreError> {
        let path = self.batch_path(asset_class);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SignalStoreError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        parse_batch(&content, asset_class)
            .map(Some)
            .map_err(|reason| SignalStoreError::Malformed {
                path: path.display().to_string(),
                reason,
            })
    }
}

#[derive(Deserialize)]
struct RawSignal {
    #[serde(alias = "instrument_id")]
    symbol: String,
    #[serde(default)]
    asset_class: Option<String>,
    score: f64,
    confidence: f64,
    #[serde(default)]
    rationale: String,
    timestamp: DateTime<Utc>,
}

/// Parse a batch document: an envelope object or a bare array of records.
pub fn parse_batch(content: &str, asset_class: &str) -> Result<RawBatch, String> {
    let doc: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let (class, stamped, records) = match doc {
        Value::Array(records) => (asset_class.to_string(), None, records),
        Value::Object(mut map) => {
            let records = match map.remove("signals") {
                Some(Value::Array(records)) => records,
                _ => return Err("missing \"signals\" array".to_string()),
            };
            let class = match map.remove("asset_class") {
                Some(Value::String(c)) => c,
                _ => asset_class.to_string(),
            };
            let stamped = match map.remove("generated_at") {
                Some(v) => Some(
                    serde_json::from_value::<DateTime<Utc>>(v)
                        .map_err(|e| format!("generated_at: {e}"))?,
                ),
                None => None,
            };
            (class, stamped, records)
        }
        _ => return Err("expected an object or an array".to_string()),
    };

    let mut seen = BTreeSet::new();
    let mut signals = Vec::new();
    let mut dropped = Vec::new();
    for record in records {
        match to_signal(record, &class) {
            Ok(signal) if !seen.insert(signal.symbol.clone()) => {
                dropped.push(SignalError::Duplicate {
                    symbol: signal.symbol,
                    asset_class: class.clone(),
                });
            }
            Ok(signal) => signals.push(signal),
            Err(e) => dropped.push(e),
        }
    }

    let generated_at = stamped
        .or_else(|| signals.iter().map(|s| s.timestamp).max())
        .ok_or_else(|| "no generated_at and no valid records".to_string())?;
    Ok(RawBatch {
        batch: SignalBatch {
            asset_class: class,
            generated_at,
            signals,
        },
        dropped,
    })
}

fn to_signal(record: Value, batch_class: &str) -> Result<Signal, SignalError> {
    let raw: RawSignal =
        serde_json::from_value(record).map_err(|e| SignalError::Malformed(e.to_string()))?;
    let signal = Signal {
        symbol: raw.symbol.trim().to_string(),
        asset_class: raw.asset_class.unwrap_or_else(|| batch_class.to_string()),
        score: raw.score,
        confidence: raw.confidence,
        rationale: raw.rationale,
        timestamp: raw.timestamp,
    };
    signal.validate()?;
    Ok(signal)
}

/// Signals gathered for one run, with the warnings raised along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatheredSignals {
    pub signals: Vec<Signal>,
    pub warnings: Vec<PlanWarning>,
    /// Classes whose batch was used.
    pub fresh_classes: Vec<String>,
}

/// Read one batch per class from `store` and apply the freshness contract.
pub fn gather_signals<'c>(
    store: &dyn SignalStore,
    classes: impl IntoIterator<Item = &'c str>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> GatheredSignals {
    let mut out = GatheredSignals::default();
    for class in classes {
        let RawBatch { batch, dropped } = match store.batch(class) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                out.warn(
                    PlanWarning::new(
                        WarningKind::MissingBatch,
                        format!("no signal batch for {class}; class skipped"),
                    )
                    .for_class(class),
                );
                continue;
            }
            Err(e) => {
                out.warn(
                    PlanWarning::new(
                        WarningKind::MissingBatch,
                        format!("unreadable signal batch for {class}: {e}; class skipped"),
                    )
                    .for_class(class),
                );
                continue;
            }
        };

        if let Some(reason) = staleness(batch.generated_at, now, max_age) {
            out.warn(
                PlanWarning::new(
                    WarningKind::StaleBatch,
                    format!("signal batch for {class} {reason}; class skipped"),
                )
                .for_class(class),
            );
            continue;
        }

        for e in &dropped {
            let symbol = match e {
                SignalError::EmptySymbol | SignalError::Malformed(_) => None,
                SignalError::NonFiniteScore { symbol }
                | SignalError::ConfidenceOutOfRange { symbol, .. }
                | SignalError::UnknownAssetClass { symbol, .. }
                | SignalError::SymbolNamesClass { symbol }
                | SignalError::Duplicate { symbol, .. } => Some(symbol.clone()),
            };
            let mut warning =
                PlanWarning::new(WarningKind::DroppedSignal, format!("{class}: {e}")).for_class(class);
            warning.symbol = symbol;
            out.warn(warning);
        }
        info!("{class}: {} signals", batch.signals.len());
        out.fresh_classes.push(class.to_string());
        out.signals.extend(batch.signals);
    }
    out
}

impl GatheredSignals {
    fn warn(&mut self, warning: PlanWarning) {
        warn!("{}", warning.message);
        self.warnings.push(warning);
    }
}

fn staleness(at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> Option<String> {
    if at > now + Duration::minutes(MAX_FUTURE_SKEW_MINUTES) {
        return Some(format!("is stamped in the future ({at})"));
    }
    let age = now - at;
    if age > max_age {
        return Some(format!(
            "is {:.1}h old (limit {:.1}h)",
            age.num_seconds() as f64 / 3600.0,
            max_age.num_seconds() as f64 / 3600.0
        ));
    }
    None
}

/// Convenience for a directory-backed store.
pub fn gather_from_dir<'c>(
    dir: &Path,
    classes: impl IntoIterator<Item = &'c str>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> GatheredSignals {
    gather_signals(&FileSignalStore::new(dir), classes, now, max_age)
}
