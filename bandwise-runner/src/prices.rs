//! Price snapshot loader.
//!
//! Accepts either `{"as_of": "...", "prices": {"SPY": 512.3}}` or a bare
//! `{"SPY": 512.3}` map. Null, non-finite and non-positive prices are dropped
//! with a warning; the symbols behind them are then treated as unpriced.

use std::collections::BTreeMap;
use std::path::Path;

use bandwise_core::domain::PriceBook;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Deserialize;

use crate::error::StoreError;

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Envelope {
        #[serde(default)]
        as_of: Option<DateTime<Utc>>,
        prices: BTreeMap<String, Option<f64>>,
    },
    Bare(BTreeMap<String, Option<f64>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub as_of: Option<DateTime<Utc>>,
    pub prices: PriceBook,
    /// Symbols present in the file without a usable price.
    pub ignored: Vec<String>,
}

pub fn load_prices(path: &Path) -> Result<PriceSnapshot, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    let snapshot = parse_prices(&content).map_err(|e| StoreError::json(path, e))?;
    info!(
        "loaded {} prices from {}",
        snapshot.prices.len(),
        path.display()
    );
    Ok(snapshot)
}

pub fn parse_prices(content: &str) -> Result<PriceSnapshot, serde_json::Error> {
    let (as_of, raw) = match serde_json::from_str::<SnapshotFile>(content)? {
        SnapshotFile::Envelope { as_of, prices } => (as_of, prices),
        SnapshotFile::Bare(prices) => (None, prices),
    };

    let mut prices = PriceBook::new();
    let mut ignored = Vec::new();
    for (symbol, price) in raw {
        match price {
            Some(p) if p.is_finite() && p > 0.0 => prices.insert(symbol, p),
            other => {
                warn!("ignoring price for {symbol}: {other:?}");
                ignored.push(symbol);
            }
        }
    }
    Ok(PriceSnapshot {
        as_of,
        prices,
        ignored,
    })
}
