//! Execution log: JSONL append-only audit trail.
//!
//! One [`ExecutionRecord`] per line. Lines are only ever appended; a
//! truncated or malformed line is skipped on read rather than failing the
//! whole log.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use bandwise_core::domain::ExecutionRecord;
use log::warn;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct ExecutionLog {
    path: PathBuf,
}

impl ExecutionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records` in order. Returns the number of lines written.
    pub fn append(&self, records: &[ExecutionRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut buf = String::new();
        for record in records {
            let json =
                serde_json::to_string(record).map_err(|e| StoreError::json(&self.path, e))?;
            buf.push_str(&json);
            buf.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(buf.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(records.len())
    }

    /// Read every well-formed record, oldest first.
    pub fn read_all(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let reader = io::BufReader::new(file);
        let mut records = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExecutionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{}:{}: skipping malformed record: {e}", self.path.display(), n + 1),
            }
        }
        Ok(records)
    }

    /// The last `n` records.
    pub fn tail(&self, n: usize) -> Result<Vec<ExecutionRecord>, StoreError> {
        let mut records = self.read_all()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }
}
