//! Versioned portfolio state store.
//!
//! One JSON file, one writer. Every successful save bumps `version`; a save
//! whose expected version no longer matches the file on disk is refused, so
//! a retried or overlapping run cannot silently overwrite newer state.
//! Writes go to a sibling temp file and are renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bandwise_core::domain::PortfolioState;
use bandwise_core::StrategyConfig;
use log::info;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create a fresh all-cash portfolio at version 0.
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub fn init(&self, cash: f64, force: bool) -> Result<PortfolioState, StoreError> {
        if self.exists() && !force {
            return Err(StoreError::AlreadyExists(self.path.clone()));
        }
        let state = PortfolioState::new(cash);
        state.check_invariants()?;
        self.write(&state)?;
        info!("initialised {} with cash {:.2}", self.path.display(), cash);
        Ok(state)
    }

    /// Read and structurally check the stored state.
    pub fn load(&self) -> Result<PortfolioState, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let state: PortfolioState =
            serde_json::from_str(&content).map_err(|e| StoreError::json(&self.path, e))?;
        state.check_invariants()?;
        Ok(state)
    }

    /// [`StateStore::load`] plus lot-mode checks against the strategy.
    pub fn load_validated(&self, config: &StrategyConfig) -> Result<PortfolioState, StoreError> {
        let state = self.load()?;
        state.validate(config)?;
        Ok(state)
    }

    /// Fail with [`StoreError::StaleVersion`] when the file on disk has moved
    /// past `expected_version`. A missing file passes.
    pub fn check_version(&self, expected_version: u64) -> Result<(), StoreError> {
        if !self.exists() {
            return Ok(());
        }
        let current = self.load()?;
        if current.version != expected_version {
            return Err(StoreError::StaleVersion {
                expected: expected_version,
                found: current.version,
            });
        }
        Ok(())
    }

    /// Persist `state` as the successor of `expected_version`.
    ///
    /// Returns the state as written, with `version = expected_version + 1`.
    pub fn save(
        &self,
        state: &PortfolioState,
        expected_version: u64,
    ) -> Result<PortfolioState, StoreError> {
        self.check_version(expected_version)?;
        state.check_invariants()?;
        let mut next = state.clone();
        next.version = expected_version + 1;
        self.write(&next)?;
        info!(
            "saved {} at version {}",
            self.path.display(),
            next.version
        );
        Ok(next)
    }

    fn write(&self, state: &PortfolioState) -> Result<(), StoreError> {
        let json =
            serde_json::to_string_pretty(state).map_err(|e| StoreError::json(&self.path, e))?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Write `bytes` to a temp file beside `path`, then rename over it.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    file.write_all(bytes).map_err(|e| StoreError::io(&tmp, e))?;
    file.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}
